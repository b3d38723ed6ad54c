use std::{net::SocketAddr, time::Duration};

/// Upstream catalog endpoint used when `API_URL` is unset.
const DEFAULT_CATALOG_URL: &str = "https://api.hypixel.net/v2/resources/skyblock/items";

/// Upstream price API base used when `PRICE_API_URL` is unset.
const DEFAULT_PRICE_API_URL: &str = "https://sky.coflnet.com";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub redis_url: String,
    pub catalog_url: String,
    pub price_api_url: String,
    pub catalog_category: String,
    pub reference_data_dir: String,
    pub cors_allow: Vec<String>,
    pub catalog_interval: Duration,
    pub price_interval: Duration,
    pub catalog_staleness: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid LISTEN_ADDR");
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let catalog_url = std::env::var("API_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.into());
        let price_api_url =
            std::env::var("PRICE_API_URL").unwrap_or_else(|_| DEFAULT_PRICE_API_URL.into());
        let catalog_category =
            std::env::var("CATALOG_CATEGORY").unwrap_or_else(|_| "REFORGE_STONE".into());
        let reference_data_dir =
            std::env::var("REFERENCE_DATA_DIR").unwrap_or_else(|_| "reference-data".into());
        let cors_allow = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            listen_addr,
            redis_url,
            catalog_url,
            price_api_url,
            catalog_category,
            reference_data_dir,
            cors_allow,
            catalog_interval: duration_secs_var("CATALOG_INTERVAL_SECS", 60 * 60),
            price_interval: duration_secs_var("PRICE_INTERVAL_SECS", 15 * 60),
            catalog_staleness: duration_secs_var("CATALOG_STALENESS_SECS", 6 * 60 * 60),
        }
    }
}

fn duration_secs_var(name: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
