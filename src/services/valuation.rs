use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use super::{
    market_data::{coingecko::format_oracle_date, polygonscan::Transfer},
    shared::util::format_currency,
};

/// Seam between the aggregation loop and the price source, so the loop can be
/// driven by a deterministic oracle in tests.
#[async_trait]
pub trait PriceOracle {
    async fn usd_price_on(&mut self, date: NaiveDate) -> Option<f64>;
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ValuationRow {
    #[serde(rename = "Transaction Date")]
    #[tabled(rename = "Transaction Date")]
    pub date: String,
    #[serde(rename = "DIMO Tokens")]
    #[tabled(rename = "DIMO Tokens")]
    pub amount: f64,
    #[serde(rename = "Cost Basis Value")]
    #[tabled(rename = "Cost Basis Value")]
    pub cost_basis: String,
    #[serde(skip)]
    #[tabled(skip)]
    pub usd_value: f64,
}

/// A transfer excluded from the total because no price was available for its
/// date. Surfaced on the report rather than dropped silently.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SkippedTransfer {
    #[tabled(rename = "Transaction Date")]
    pub date: String,
    #[tabled(rename = "DIMO Tokens")]
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub rows: Vec<ValuationRow>,
    pub total_usd: f64,
    pub skipped: Vec<SkippedTransfer>,
}

pub enum ValuationEvent<'a> {
    Priced {
        index: usize,
        total: usize,
        row: &'a ValuationRow,
    },
    Skipped {
        index: usize,
        total: usize,
        date: &'a str,
    },
}

/// Values each transfer at its date's historical USD price, strictly in input
/// order. Successful lookups are cached per date for the run; failed lookups
/// are not, so every transfer gets one attempt.
pub async fn value_transfers(
    transfers: &[Transfer],
    oracle: &mut impl PriceOracle,
    mut on_event: impl FnMut(ValuationEvent<'_>),
) -> Report {
    let total = transfers.len();
    let mut rows: Vec<ValuationRow> = Vec::with_capacity(total);
    let mut skipped = vec![];
    let mut total_usd = 0.0;
    let mut price_cache: HashMap<NaiveDate, f64> = HashMap::new();

    for (index, transfer) in transfers.iter().enumerate() {
        let date = transfer.local_date();
        let date_label = format_oracle_date(date);
        let amount = transfer.amount();

        let price = match price_cache.get(&date) {
            Some(price) => Some(*price),
            None => {
                let fetched = oracle.usd_price_on(date).await;
                if let Some(price) = fetched {
                    price_cache.insert(date, price);
                }
                fetched
            }
        };

        match price {
            Some(price) => {
                let usd_value = amount * price;
                total_usd += usd_value;
                let row = ValuationRow {
                    date: date_label,
                    amount,
                    cost_basis: format_currency(usd_value),
                    usd_value,
                };
                on_event(ValuationEvent::Priced {
                    index: index + 1,
                    total,
                    row: &row,
                });
                rows.push(row);
            }
            None => {
                warn!(
                    "No price for {}, excluding transfer of {} DIMO from the total",
                    date_label, amount
                );
                on_event(ValuationEvent::Skipped {
                    index: index + 1,
                    total,
                    date: &date_label,
                });
                skipped.push(SkippedTransfer {
                    date: date_label,
                    amount,
                });
            }
        }
    }

    Report {
        rows,
        total_usd,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::collections::VecDeque;

    struct FixedOracle {
        price: Option<f64>,
        calls: usize,
    }

    #[async_trait]
    impl PriceOracle for FixedOracle {
        async fn usd_price_on(&mut self, _date: NaiveDate) -> Option<f64> {
            self.calls += 1;
            self.price
        }
    }

    struct ScriptedOracle {
        prices: VecDeque<Option<f64>>,
    }

    #[async_trait]
    impl PriceOracle for ScriptedOracle {
        async fn usd_price_on(&mut self, _date: NaiveDate) -> Option<f64> {
            self.prices.pop_front().flatten()
        }
    }

    const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

    fn transfer(month: u32, day: u32, raw_amount: u128) -> Transfer {
        Transfer {
            timestamp: Local
                .with_ymd_and_hms(2023, month, day, 12, 0, 0)
                .unwrap()
                .timestamp(),
            raw_amount,
            token_decimals: 18,
        }
    }

    fn airdrop_batch() -> Vec<Transfer> {
        vec![
            transfer(1, 2, WEI_PER_TOKEN),
            transfer(2, 6, 2 * WEI_PER_TOKEN),
            transfer(3, 13, WEI_PER_TOKEN / 2),
        ]
    }

    #[tokio::test]
    async fn batch_priced_at_ten_dollars() {
        let mut oracle = FixedOracle {
            price: Some(10.0),
            calls: 0,
        };

        let report = value_transfers(&airdrop_batch(), &mut oracle, |_| {}).await;

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].amount, 1.0);
        assert_eq!(report.rows[0].cost_basis, "$10.00");
        assert_eq!(report.rows[1].amount, 2.0);
        assert_eq!(report.rows[1].cost_basis, "$20.00");
        assert_eq!(report.rows[2].amount, 0.5);
        assert_eq!(report.rows[2].cost_basis, "$5.00");
        assert!((report.total_usd - 35.0).abs() < 1e-9);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn total_equals_sum_of_row_values() {
        let mut oracle = FixedOracle {
            price: Some(0.2345),
            calls: 0,
        };

        let report = value_transfers(&airdrop_batch(), &mut oracle, |_| {}).await;

        let sum: f64 = report.rows.iter().map(|row| row.usd_value).sum();
        assert!((report.total_usd - sum).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unpriced_transfer_is_excluded_from_rows_and_total() {
        let mut oracle = ScriptedOracle {
            prices: VecDeque::from(vec![Some(10.0), None, Some(10.0)]),
        };

        let report = value_transfers(&airdrop_batch(), &mut oracle, |_| {}).await;

        assert_eq!(report.rows.len(), 2);
        assert!((report.total_usd - 15.0).abs() < 1e-9);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].date, "06-02-2023");
        assert_eq!(report.skipped[0].amount, 2.0);
    }

    #[tokio::test]
    async fn duplicate_dates_query_the_oracle_once() {
        let transfers = vec![
            transfer(5, 1, WEI_PER_TOKEN),
            transfer(5, 1, 2 * WEI_PER_TOKEN),
            transfer(5, 8, WEI_PER_TOKEN),
        ];
        let mut oracle = FixedOracle {
            price: Some(1.0),
            calls: 0,
        };

        let report = value_transfers(&transfers, &mut oracle, |_| {}).await;

        assert_eq!(oracle.calls, 2);
        assert_eq!(report.rows.len(), 3);
    }

    #[tokio::test]
    async fn rows_carry_oracle_formatted_dates_in_input_order() {
        let mut oracle = FixedOracle {
            price: Some(1.0),
            calls: 0,
        };

        let report = value_transfers(&airdrop_batch(), &mut oracle, |_| {}).await;

        let dates: Vec<&str> = report.rows.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(dates, vec!["02-01-2023", "06-02-2023", "13-03-2023"]);
    }

    #[tokio::test]
    async fn deterministic_oracle_yields_byte_identical_exports() {
        let transfers = airdrop_batch();
        let mut first_csv = None;

        for _ in 0..2 {
            let mut oracle = FixedOracle {
                price: Some(0.2345),
                calls: 0,
            };
            let report = value_transfers(&transfers, &mut oracle, |_| {}).await;
            let csv = crate::services::files::report_to_csv(&report).unwrap();
            match &first_csv {
                None => first_csv = Some(csv),
                Some(previous) => assert_eq!(&csv, previous),
            }
        }
    }

    #[tokio::test]
    async fn one_progress_event_is_emitted_per_transfer() {
        let mut oracle = ScriptedOracle {
            prices: VecDeque::from(vec![Some(10.0), None, Some(10.0)]),
        };
        let mut priced = 0;
        let mut skipped = 0;

        value_transfers(&airdrop_batch(), &mut oracle, |event| match event {
            ValuationEvent::Priced { index, total, .. } => {
                priced += 1;
                assert!(index <= total);
            }
            ValuationEvent::Skipped { index, total, .. } => {
                skipped += 1;
                assert_eq!(index, 2);
                assert_eq!(total, 3);
            }
        })
        .await;

        assert_eq!(priced, 2);
        assert_eq!(skipped, 1);
    }
}
