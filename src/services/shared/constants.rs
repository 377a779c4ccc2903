// DIMO token contract on Polygon
pub const DIMO_TOKEN_ADDRESS: &str = "0xe261d618a959afffd53168cd07d12e37b26761db";
pub const COINGECKO_COIN_ID: &str = "dimo";

pub const POLYGONSCAN_API_URL: &str = "https://api.polygonscan.com/api";
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

pub const DEFAULT_TAX_YEAR: i32 = 2023;

// CoinGecko demo keys are rate limited, so space out history lookups
pub const PRICE_LOOKUP_INTERVAL_MS: u64 = 4000;
