use dotenvy::{dotenv, from_filename, var};

pub fn check_for_env_variables() {
    match get_env_variable("POLYGONSCAN_API_KEY") {
        Some(_) => println!("PolygonScan API key set ✅"),
        None => println!(
            "POLYGONSCAN_API_KEY not set, token transfers can't be fetched without it ⚠️"
        ),
    };
    match get_env_variable("COINGECKO_API_KEY") {
        Some(_) => println!("CoinGecko API key set ✅"),
        None => println!(
            "COINGECKO_API_KEY not set, historical prices can't be fetched without it ⚠️"
        ),
    };
}

pub fn get_env_variable(variable_to_get: &str) -> Option<String> {
    let environment = var("RUST_ENV").unwrap_or_else(|_| "development".into());

    match environment.as_str() {
        "development" => from_filename(".env.dev").ok(),
        "production" => from_filename(".env.prod").ok(),
        _ => dotenv().ok(),
    };
    var(variable_to_get).ok()
}
