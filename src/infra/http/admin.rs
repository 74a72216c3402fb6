use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use tracing::info;

use crate::application::repos::HealthRepo;
use crate::cache::{CacheKey, ReadThroughCache};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

const TARGET: &str = "trove::http::admin";

#[derive(Clone)]
pub struct AdminState {
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<Arc<ReadThroughCache>>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub enabled: bool,
    pub entries: usize,
    pub version: Option<i64>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(admin_health))
        .route("/cache", get(cache_status))
        .route("/cache/clear", post(clear_cache))
        .route("/cache/entries/{key}", delete(invalidate_entry))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn cache_status(State(state): State<AdminState>) -> Json<CacheStatus> {
    let status = match state.cache.as_ref() {
        Some(cache) => CacheStatus {
            enabled: cache.config().enabled,
            entries: cache.len(),
            version: cache.versions().current().await,
        },
        None => CacheStatus {
            enabled: false,
            entries: 0,
            version: None,
        },
    };
    Json(status)
}

async fn clear_cache(State(state): State<AdminState>) -> Response {
    if let Some(cache) = state.cache.as_ref() {
        let purged = cache.len();
        cache.clear();
        info!(target: TARGET, purged, "cache cleared");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn invalidate_entry(State(state): State<AdminState>, Path(key): Path<String>) -> Response {
    if let Some(cache) = state.cache.as_ref() {
        cache.invalidate(&CacheKey::raw(key.as_str()));
        info!(target: TARGET, key = %key, "cache entry invalidated");
    }
    StatusCode::NO_CONTENT.into_response()
}
