use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::get,
};

use crate::application::{
    catalog::CatalogService,
    economy::EconomyService,
    metadata::MetadataService,
    repos::MaterialList,
};
use crate::domain::entities::{
    CostRow, ItemDetailRow, ItemRow, ItemSourceRow, MaterialRow, RepairEconomyRow, VersionRecord,
};

use super::{
    error::ApiError,
    middleware::{log_responses, set_request_context},
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<CatalogService>,
    pub economy: Arc<EconomyService>,
    pub metadata: Arc<MetadataService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/items", get(list_items))
        .route("/api/items/{id}", get(item_detail))
        .route("/api/items/{id}/crafting", get(item_crafting))
        .route("/api/items/{id}/recycling", get(item_recycling))
        .route("/api/items/{id}/repair-costs", get(item_repair_costs))
        .route("/api/meta/version", get(data_version))
        .route("/items/{id}/sources", get(item_sources))
        .route("/repair-economy", get(repair_economy))
        .route("/adjustments_gpt/repair-economy", get(repair_economy))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn list_items(State(state): State<HttpState>) -> Result<Json<Vec<ItemRow>>, ApiError> {
    state
        .catalog
        .list_items()
        .await
        .map(Json)
        .map_err(|err| ApiError::from_repo(SOURCE, err))
}

async fn item_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ItemDetailRow>, ApiError> {
    state
        .catalog
        .item(&id)
        .await
        .map_err(|err| ApiError::from_repo(SOURCE, err))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(SOURCE, "item not found"))
}

async fn item_sources(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ItemSourceRow>>, ApiError> {
    state
        .catalog
        .item_sources(&id)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_repo(SOURCE, err))
}

async fn item_crafting(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MaterialRow>>, ApiError> {
    item_materials(&state, &id, MaterialList::Crafting).await
}

async fn item_recycling(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MaterialRow>>, ApiError> {
    item_materials(&state, &id, MaterialList::Recycling).await
}

async fn item_materials(
    state: &HttpState,
    id: &str,
    list: MaterialList,
) -> Result<Json<Vec<MaterialRow>>, ApiError> {
    state
        .catalog
        .item_materials(id, list)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_repo(SOURCE, err))
}

async fn item_repair_costs(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CostRow>>, ApiError> {
    state
        .catalog
        .repair_costs(&id)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_repo(SOURCE, err))
}

async fn repair_economy(
    State(state): State<HttpState>,
) -> Result<Json<Vec<RepairEconomyRow>>, ApiError> {
    state
        .economy
        .repair_economy()
        .await
        .map(Json)
        .map_err(|err| ApiError::from_repo(SOURCE, err))
}

async fn data_version(State(state): State<HttpState>) -> Result<Json<VersionRecord>, ApiError> {
    state
        .metadata
        .data_version()
        .await
        .map_err(|err| ApiError::from_repo(SOURCE, err))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(SOURCE, "data version unavailable"))
}
