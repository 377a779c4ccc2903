use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use super::rate_limit::FixedIntervalLimiter;
use crate::services::{
    shared::constants::{COINGECKO_API_URL, COINGECKO_COIN_ID, PRICE_LOOKUP_INTERVAL_MS},
    valuation::PriceOracle,
};

#[derive(Deserialize, Debug)]
struct CoinHistoryResponse {
    market_data: Option<CoinHistoryMarketData>,
}

#[derive(Deserialize, Debug)]
struct CoinHistoryMarketData {
    current_price: Option<CoinHistoryCurrentPrice>,
}

#[derive(Deserialize, Debug)]
struct CoinHistoryCurrentPrice {
    usd: Option<f64>,
}

/// The history endpoint expects dd-mm-yyyy; any other format silently
/// returns no price data.
pub fn format_oracle_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

fn extract_usd_price(body: &str) -> Option<f64> {
    serde_json::from_str::<CoinHistoryResponse>(body)
        .ok()?
        .market_data?
        .current_price?
        .usd
}

fn price_from_response(status: StatusCode, body: &str, date_param: &str) -> Option<f64> {
    if !status.is_success() {
        warn!(
            "Failed to fetch historical price for date {}. Status code: {}",
            date_param, status
        );
        return None;
    }
    extract_usd_price(body)
}

pub struct CoinGeckoClient {
    client: Client,
    api_key: String,
    limiter: FixedIntervalLimiter,
}

impl CoinGeckoClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            limiter: FixedIntervalLimiter::new(Duration::from_millis(PRICE_LOOKUP_INTERVAL_MS)),
        }
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoClient {
    async fn usd_price_on(&mut self, date: NaiveDate) -> Option<f64> {
        self.limiter.wait().await;

        let date_param = format_oracle_date(date);
        let response = self
            .client
            .get(format!(
                "{}/coins/{}/history",
                COINGECKO_API_URL, COINGECKO_COIN_ID
            ))
            .header("x-cg-demo-api-key", &self.api_key)
            .query(&[("date", date_param.as_str()), ("localization", "false")])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!("Price request for {} failed: {}", date_param, err);
                return None;
            }
        };

        let status = response.status();
        let body = response.text().await.ok()?;
        price_from_response(status, &body, &date_param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_date_is_day_month_year() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();
        assert_eq!(format_oracle_date(date), "05-03-2023");
    }

    #[test]
    fn usd_price_is_extracted_from_the_nested_path() {
        let body = r#"{
            "id": "dimo",
            "market_data": {
                "current_price": { "usd": 0.2345, "eur": 0.2167 }
            }
        }"#;
        assert_eq!(extract_usd_price(body), Some(0.2345));
    }

    #[test]
    fn non_success_status_yields_none() {
        let body = r#"{"market_data":{"current_price":{"usd":0.2345}}}"#;
        assert_eq!(
            price_from_response(StatusCode::TOO_MANY_REQUESTS, body, "05-03-2023"),
            None
        );
        assert_eq!(
            price_from_response(StatusCode::INTERNAL_SERVER_ERROR, body, "05-03-2023"),
            None
        );
    }

    #[test]
    fn success_status_extracts_the_price() {
        let body = r#"{"market_data":{"current_price":{"usd":0.2345}}}"#;
        assert_eq!(
            price_from_response(StatusCode::OK, body, "05-03-2023"),
            Some(0.2345)
        );
    }

    #[test]
    fn missing_price_data_yields_none() {
        assert_eq!(extract_usd_price(r#"{"id":"dimo"}"#), None);
        assert_eq!(extract_usd_price(r#"{"market_data":{}}"#), None);
        assert_eq!(
            extract_usd_price(r#"{"market_data":{"current_price":{"eur":0.2}}}"#),
            None
        );
        assert_eq!(extract_usd_price("not json"), None);
    }
}
