use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use stoneyard_core::{CacheStore, ReferenceOverlay, ScheduleConfig, SyncConfig, SyncService};
use stoneyard_market_data::{BackoffPolicy, CatalogClient, PriceClient, RequestPacer};

use crate::config::Config;

pub struct AppState {
    pub sync_service: Arc<SyncService>,
}

pub fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = CacheStore::connect(&config.redis_url).await?;
    tracing::info!("Connected to Redis at {}", config.redis_url);

    // Entities are still cached without reforge effects when the
    // reference data is missing.
    let overlay = ReferenceOverlay::new();
    if let Err(e) = overlay.load_from_dir(&config.reference_data_dir) {
        tracing::warn!(
            "Could not load reference data from {}: {}",
            config.reference_data_dir,
            e
        );
    }

    // One pacer for every price-API call in the process.
    let pacer = Arc::new(RequestPacer::default());
    let prices = PriceClient::new(&config.price_api_url, pacer, BackoffPolicy::default());
    let catalog = CatalogClient::new(&config.catalog_url, &config.catalog_category);

    let sync_service = Arc::new(SyncService::new(
        store,
        Arc::new(catalog),
        Arc::new(prices),
        Arc::new(overlay),
        SyncConfig {
            catalog_staleness: config.catalog_staleness,
        },
    ));

    Ok(Arc::new(AppState { sync_service }))
}

pub fn schedule_config(config: &Config) -> ScheduleConfig {
    ScheduleConfig {
        catalog_interval: config.catalog_interval,
        price_interval: config.price_interval,
    }
}
