use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use owo_colors::{OwoColorize, Style};
use spinners_rs::{Spinner, Spinners};
use tabled::{Table, Tabled};

use crate::services::{
    files::export_csv,
    market_data::{
        coingecko::{format_oracle_date, CoinGeckoClient},
        polygonscan::{fetch_dimo_transfers, Transfer},
    },
    shared::{constants::DEFAULT_TAX_YEAR, env::get_env_variable, util::format_currency},
    valuation::{value_transfers, ValuationEvent},
};

#[derive(Parser, Debug)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Value a wallet's DIMO airdrop transfers and export the cost basis as CSV
    Calculate {
        #[arg(short, long)]
        wallet: String,
        #[arg(short, long, default_value_t = DEFAULT_TAX_YEAR)]
        year: i32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the transfers that would be valued, without querying prices
    Transfers {
        #[arg(short, long)]
        wallet: String,
        #[arg(short, long, default_value_t = DEFAULT_TAX_YEAR)]
        year: i32,
    },
}

pub async fn cli() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        Command::Calculate {
            wallet,
            year,
            output,
        } => {
            calculate(&wallet, year, output).await?;
        }
        Command::Transfers { wallet, year } => {
            list_transfers(&wallet, year).await?;
        }
    }
    Ok(())
}

fn require_env_key(variable: &str) -> anyhow::Result<String> {
    match get_env_variable(variable) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("Please set {} in your environment variables", variable),
    }
}

fn require_wallet_address(wallet: &str) -> anyhow::Result<()> {
    if wallet.trim().is_empty() {
        bail!("Please provide a wallet address");
    }
    Ok(())
}

async fn fetch_with_spinner(
    wallet: &str,
    api_key: &str,
    year: i32,
) -> anyhow::Result<Vec<Transfer>> {
    let mut sp = Spinner::new(Spinners::Point, "Fetching DIMO transfers from PolygonScan");
    sp.start();
    let transfers = fetch_dimo_transfers(wallet, api_key, year).await?;
    sp.stop();
    println!();
    Ok(transfers)
}

async fn calculate(wallet: &str, year: i32, output: Option<PathBuf>) -> anyhow::Result<()> {
    require_wallet_address(wallet)?;
    let polygonscan_key = require_env_key("POLYGONSCAN_API_KEY")?;
    let coingecko_key = require_env_key("COINGECKO_API_KEY")?;

    let transfers = fetch_with_spinner(wallet, &polygonscan_key, year).await?;

    if transfers.is_empty() {
        println!("No DIMO transfers found for {} in {}.", wallet, year);
        return Ok(());
    }

    println!(
        "Found {} transfers. Pricing takes a few seconds per transfer because of CoinGecko rate limits.",
        transfers.len()
    );

    let mut oracle = CoinGeckoClient::new(&coingecko_key);
    let report = value_transfers(&transfers, &mut oracle, |event| match event {
        ValuationEvent::Priced { index, total, row } => {
            println!(
                "Processed transfer {} of {}: {} DIMO on {} valued at {}",
                index, total, row.amount, row.date, row.cost_basis
            );
        }
        ValuationEvent::Skipped { index, total, date } => {
            println!(
                "No price found for transfer {} of {} ({}), excluding it from the total",
                index, total, date
            );
        }
    })
    .await;

    println!();
    println!("{}", Table::new(&report.rows));

    if !report.skipped.is_empty() {
        println!();
        println!("Transfers excluded for lack of price data:");
        println!("{}", Table::new(&report.skipped));
    }

    let total_style = Style::new().black().on_white().bold();
    println!("====");
    println!(
        "Total value of airdropped DIMO in {}: {}",
        year,
        format_currency(report.total_usd).style(total_style)
    );

    let output = output.unwrap_or_else(|| PathBuf::from(format!("dimo_cost_basis_{}.csv", year)));
    export_csv(&report, &output)?;
    println!("Itemized report written to {}", output.display());

    Ok(())
}

#[derive(Debug, Tabled)]
struct StringifiedTransfer {
    date: String,
    amount: String,
}

impl StringifiedTransfer {
    fn from_transfer(transfer: &Transfer) -> Self {
        Self {
            date: format_oracle_date(transfer.local_date()),
            amount: format!("{:.4}", transfer.amount()),
        }
    }
}

async fn list_transfers(wallet: &str, year: i32) -> anyhow::Result<()> {
    require_wallet_address(wallet)?;
    let polygonscan_key = require_env_key("POLYGONSCAN_API_KEY")?;

    let transfers = fetch_with_spinner(wallet, &polygonscan_key, year).await?;

    if transfers.is_empty() {
        println!("No DIMO transfers found for {} in {}.", wallet, year);
        return Ok(());
    }

    let stringified_transfers: Vec<StringifiedTransfer> = transfers
        .iter()
        .map(StringifiedTransfer::from_transfer)
        .collect();

    println!("{}", Table::new(&stringified_transfers));
    println!("{} transfers in {}", transfers.len(), year);

    Ok(())
}
