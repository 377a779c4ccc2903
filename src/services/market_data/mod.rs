pub mod coingecko;
pub mod polygonscan;
pub mod rate_limit;
