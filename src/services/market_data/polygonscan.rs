use anyhow::bail;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::services::shared::constants::{DIMO_TOKEN_ADDRESS, POLYGONSCAN_API_URL};

#[derive(Deserialize, Debug)]
struct TokenTransferResponseItem {
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    value: String,
    #[serde(rename = "tokenDecimal")]
    token_decimal: String,
}

#[derive(Deserialize, Debug)]
struct TokenTransferResponse {
    result: Vec<TokenTransferResponseItem>,
}

/// One DIMO token transfer, as reported by PolygonScan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub timestamp: i64,
    pub raw_amount: u128,
    pub token_decimals: u32,
}

impl Transfer {
    /// Human-readable token amount, adjusted for the token's decimals.
    pub fn amount(&self) -> f64 {
        self.raw_amount as f64 / 10f64.powi(self.token_decimals as i32)
    }

    pub fn local_date(&self) -> NaiveDate {
        DateTime::from_timestamp(self.timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&Local)
            .date_naive()
    }
}

pub fn parse_transfer_list(body: &str, year: i32) -> anyhow::Result<Vec<Transfer>> {
    let response = serde_json::from_str::<TokenTransferResponse>(body)?;

    let mut transfers = vec![];
    for item in response.result {
        let timestamp = item.time_stamp.parse::<i64>()?;
        if DateTime::from_timestamp(timestamp, 0).is_none() {
            bail!("Transfer timestamp {} is out of range", timestamp);
        }
        let transfer = Transfer {
            timestamp,
            raw_amount: item.value.parse::<u128>()?,
            token_decimals: item.token_decimal.parse::<u32>()?,
        };
        if transfer.local_date().year() == year {
            transfers.push(transfer);
        }
    }

    Ok(transfers)
}

fn transfers_from_response(
    status: StatusCode,
    body: &str,
    year: i32,
) -> anyhow::Result<Vec<Transfer>> {
    if !status.is_success() {
        bail!(
            "Failed to fetch transfers. Status code: {}\nRaw Response: {}",
            status,
            body
        );
    }
    parse_transfer_list(body, year)
}

/// Fetches all DIMO transfers for a wallet, filtered to the target year.
/// Ascending order comes from the upstream sort parameter.
pub async fn fetch_dimo_transfers(
    wallet_address: &str,
    api_key: &str,
    year: i32,
) -> anyhow::Result<Vec<Transfer>> {
    let client = Client::new();

    let response = client
        .get(POLYGONSCAN_API_URL)
        .query(&[
            ("module", "account"),
            ("action", "tokentx"),
            ("contractaddress", DIMO_TOKEN_ADDRESS),
            ("address", wallet_address),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("sort", "asc"),
            ("apikey", api_key),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    debug!("PolygonScan returned {} with {} bytes", status, body.len());

    transfers_from_response(status, &body, year)
}
