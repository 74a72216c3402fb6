//! Repository implementations over the upstream database views.
//!
//! Every repository read is a single [`ViewQuery`] handed to a [`RowStore`];
//! rows come back as JSON objects and are decoded into domain records here.

mod postgres;
mod query;
mod rest;

pub use postgres::{PgRowStore, map_sqlx_error};
pub use query::{Direction, RowStore, ViewQuery};
pub use rest::RestRowStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::application::repos::{
    EconomyRepo, HealthRepo, ItemsRepo, MaterialList, MetadataRepo, RepoError,
};
use crate::config::DatabaseSettings;
use crate::domain::entities::{
    CostRow, GLOBAL_VERSION_ID, ItemDetailRow, ItemRow, ItemSourceRow, MaterialRow,
    RepairEconomyRow, VersionRecord,
};
use crate::infra::error::InfraError;

pub const ITEMS_VIEW: &str = "items_view";
pub const ITEM_DETAILS_VIEW: &str = "item_details_view";
pub const ITEM_SOURCES_VIEW: &str = "item_sources_view";
pub const CRAFTING_VIEW: &str = "crafting_materials_view";
pub const RECYCLING_VIEW: &str = "recycling_outputs_view";
pub const REPAIR_COSTS_VIEW: &str = "repair_costs_view";
pub const REPAIR_ECONOMY_VIEW: &str = "repair_economy_view";
pub const METADATA_TABLE: &str = "metadata";

const ITEM_COLUMNS: &[&str] = &["id", "name", "icon", "rarity", "item_type"];

/// Build the row store named by `database.url`: `http(s)://` selects the REST
/// gateway, `postgres://` a direct pool.
pub async fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn RowStore>, InfraError> {
    let url = settings
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let scheme = url.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
        Some("http" | "https") => {
            let api_key = settings.api_key.as_deref().ok_or_else(|| {
                InfraError::configuration("database api key is required for the REST gateway")
            })?;
            let store = RestRowStore::new(url, api_key, settings.request_timeout)?;
            info!(target: "trove::infra::db", backend = store.backend(), "row store ready");
            Ok(Arc::new(store))
        }
        Some("postgres" | "postgresql") => {
            let pool = PgRowStore::connect(
                url,
                settings.max_connections.get(),
                settings.request_timeout,
            )
            .await
            .map_err(|err| InfraError::backend("postgres", err.to_string()))?;
            let store = PgRowStore::new(pool);
            info!(target: "trove::infra::db", backend = store.backend(), "row store ready");
            Ok(Arc::new(store))
        }
        _ => Err(InfraError::configuration(format!(
            "unsupported database url scheme in `{url}` (expected https:// or postgres://)"
        ))),
    }
}

/// Repositories backed by a row store.
#[derive(Clone)]
pub struct ViewRepositories {
    store: Arc<dyn RowStore>,
}

impl ViewRepositories {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    async fn rows<T: DeserializeOwned>(&self, query: ViewQuery) -> Result<Vec<T>, RepoError> {
        let view = query.view().to_string();
        self.store
            .select(&query)
            .await?
            .into_iter()
            .map(|row| decode_row(&view, row))
            .collect()
    }

    async fn first<T: DeserializeOwned>(&self, query: ViewQuery) -> Result<Option<T>, RepoError> {
        Ok(self.rows(query.limit(1)).await?.into_iter().next())
    }
}

fn decode_row<T: DeserializeOwned>(view: &str, row: Value) -> Result<T, RepoError> {
    serde_json::from_value(row)
        .map_err(|err| RepoError::data_access(format!("malformed row in `{view}`: {err}")))
}

#[async_trait]
impl ItemsRepo for ViewRepositories {
    async fn list_items(&self) -> Result<Vec<ItemRow>, RepoError> {
        let query = ViewQuery::from_view(ITEMS_VIEW)?
            .select(ITEM_COLUMNS)?
            .order("name", Direction::Asc)?;
        self.rows(query).await
    }

    async fn find_item(&self, id: &str) -> Result<Option<ItemDetailRow>, RepoError> {
        let query = ViewQuery::from_view(ITEM_DETAILS_VIEW)?.eq("id", id)?;
        self.first(query).await
    }

    async fn list_item_sources(&self, item_id: &str) -> Result<Vec<ItemSourceRow>, RepoError> {
        let query = ViewQuery::from_view(ITEM_SOURCES_VIEW)?
            .eq("item_id", item_id)?
            .order("source_name", Direction::Asc)?;
        self.rows(query).await
    }

    async fn list_item_materials(
        &self,
        item_id: &str,
        list: MaterialList,
    ) -> Result<Vec<MaterialRow>, RepoError> {
        let view = match list {
            MaterialList::Crafting => CRAFTING_VIEW,
            MaterialList::Recycling => RECYCLING_VIEW,
        };
        let query = ViewQuery::from_view(view)?
            .select(&["item_id", "material_id", "material_name", "quantity"])?
            .eq("item_id", item_id)?
            .order("material_id", Direction::Asc)?;
        self.rows(query).await
    }
}

#[async_trait]
impl EconomyRepo for ViewRepositories {
    async fn list_repair_economy(&self) -> Result<Vec<RepairEconomyRow>, RepoError> {
        let query = ViewQuery::from_view(REPAIR_ECONOMY_VIEW)?.order("name", Direction::Asc)?;
        self.rows(query).await
    }

    async fn list_repair_costs(&self, item_id: &str) -> Result<Vec<CostRow>, RepoError> {
        let query = ViewQuery::from_view(REPAIR_COSTS_VIEW)?
            .select(&[
                "item_id",
                "component_id",
                "component_name",
                "quantity",
                "unit_cost",
            ])?
            .eq("item_id", item_id)?
            .order("component_id", Direction::Asc)?;
        self.rows(query).await
    }
}

#[async_trait]
impl MetadataRepo for ViewRepositories {
    async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
        let query = ViewQuery::from_view(METADATA_TABLE)?
            .select(&["id", "version", "last_synced_at"])?
            .eq("id", GLOBAL_VERSION_ID)?;
        self.first(query).await
    }
}

#[async_trait]
impl HealthRepo for ViewRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.store.health_check().await
    }
}
