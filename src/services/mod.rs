pub mod files;
pub mod market_data;
pub mod shared;
pub mod valuation;
