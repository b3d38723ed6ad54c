//! Split-schedule background refresh.
//!
//! Two independent timer loops: an hourly catalog tick whose fetch is
//! gated on staleness, and a fast price-only tick. The catalog cycle
//! also runs once at startup so a cold cache populates immediately.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::store::DataClass;
use crate::sync::SyncService;

/// Default catalog tick interval. Most ticks skip the fetch; the
/// staleness gate decides.
pub const DEFAULT_CATALOG_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default price-only tick interval.
pub const DEFAULT_PRICE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Tick intervals for the two refresh loops.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleConfig {
    pub catalog_interval: Duration,
    pub price_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            catalog_interval: DEFAULT_CATALOG_INTERVAL,
            price_interval: DEFAULT_PRICE_INTERVAL,
        }
    }
}

/// Spawn both refresh loops. The returned handles run for the life of
/// the process; dropping them detaches the tasks.
pub fn start(service: Arc<SyncService>, config: ScheduleConfig) -> (JoinHandle<()>, JoinHandle<()>) {
    info!(
        "Starting refresh scheduler (catalog every {:?}, prices every {:?})",
        config.catalog_interval, config.price_interval
    );

    let catalog_service = Arc::clone(&service);
    let catalog_task = tokio::spawn(async move {
        // Initial cycle before the first tick so a cold cache fills
        // without waiting an interval.
        run_catalog_cycle(&catalog_service).await;

        let mut ticker = interval(config.catalog_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_catalog_cycle(&catalog_service).await;
        }
    });

    let price_task = tokio::spawn(async move {
        let mut ticker = interval(config.price_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_price_cycle(&service).await;
        }
    });

    (catalog_task, price_task)
}

async fn run_catalog_cycle(service: &SyncService) {
    if let Err(e) = service.refresh_catalog(false).await {
        error!("Catalog refresh failed ({}): {}", DataClass::Catalog.label(), e);
    }
}

async fn run_price_cycle(service: &SyncService) {
    if let Err(e) = service.refresh_prices_only().await {
        error!("Price refresh failed ({}): {}", DataClass::Price.label(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let config = ScheduleConfig::default();
        assert_eq!(config.catalog_interval, Duration::from_secs(3600));
        assert_eq!(config.price_interval, Duration::from_secs(900));
        assert!(config.price_interval < config.catalog_interval);
    }
}
