use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use stoneyard_core::{DataClass, Item, Reforge};

use crate::{config::Config, error::ApiResult, main_lib::AppState};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    time: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReforgeStonesResponse {
    success: bool,
    count: usize,
    /// `null` until the first catalog refresh has completed.
    last_updated: Option<DateTime<Utc>>,
    reforge_stones: Vec<Item>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReforgesResponse {
    success: bool,
    count: usize,
    last_updated: DateTime<Utc>,
    reforges: Vec<Reforge>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Stoneyard backend is running",
        time: Utc::now(),
    })
}

/// All cached stones plus the catalog freshness time. Reads only; never
/// triggers a fetch, serves stale data as-is.
async fn list_reforge_stones(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ReforgeStonesResponse>> {
    let stones = state.sync_service.list_items().await?;
    let last_updated = state.sync_service.last_updated(DataClass::Catalog).await?;

    Ok(Json(ReforgeStonesResponse {
        success: true,
        count: stones.len(),
        last_updated: last_updated.and_then(DateTime::from_timestamp_millis),
        reforge_stones: stones,
    }))
}

/// The merged reforge list, sorted by name.
async fn list_reforges(State(state): State<Arc<AppState>>) -> ApiResult<Json<ReforgesResponse>> {
    let reforges = state.sync_service.list_reforges().await?;
    let last_updated = state.sync_service.last_updated(DataClass::Catalog).await?;

    Ok(Json(ReforgesResponse {
        success: true,
        count: reforges.len(),
        last_updated: marker_time(last_updated),
        reforges,
    }))
}

fn marker_time(epoch_ms: Option<i64>) -> DateTime<Utc> {
    epoch_ms
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// CORS for the read API: GET only, Content-Type allowed for preflight,
/// origins from config (`*` or a comma-separated allow-list).
fn cors_layer(cors_allow: &[String]) -> CorsLayer {
    let layer = if cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = cors_allow
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/reforge-stones", get(list_reforge_stones))
        .route("/api/reforges", get(list_reforges))
        .with_state(state)
        .layer(cors_layer(&config.cors_allow))
        .layer(TraceLayer::new_for_http())
}
