//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    CostRow, ItemDetailRow, ItemRow, ItemSourceRow, MaterialRow, RepairEconomyRow, VersionRecord,
};

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    /// The upstream read failed: network, authentication, malformed query or
    /// a row that could not be decoded.
    #[error("{message}")]
    DataAccess { message: String },
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess {
            message: message.into(),
        }
    }

    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::data_access(err.to_string())
    }
}

/// Material lists attached to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialList {
    /// Inputs consumed when crafting the item.
    Crafting,
    /// Outputs yielded when recycling the item.
    Recycling,
}

impl MaterialList {
    pub fn as_str(self) -> &'static str {
        match self {
            MaterialList::Crafting => "crafting",
            MaterialList::Recycling => "recycling",
        }
    }
}

#[async_trait]
pub trait ItemsRepo: Send + Sync {
    /// All items, ordered by name.
    async fn list_items(&self) -> Result<Vec<ItemRow>, RepoError>;

    async fn find_item(&self, id: &str) -> Result<Option<ItemDetailRow>, RepoError>;

    async fn list_item_sources(&self, item_id: &str) -> Result<Vec<ItemSourceRow>, RepoError>;

    async fn list_item_materials(
        &self,
        item_id: &str,
        list: MaterialList,
    ) -> Result<Vec<MaterialRow>, RepoError>;
}

#[async_trait]
pub trait EconomyRepo: Send + Sync {
    async fn list_repair_economy(&self) -> Result<Vec<RepairEconomyRow>, RepoError>;

    async fn list_repair_costs(&self, item_id: &str) -> Result<Vec<CostRow>, RepoError>;
}

#[async_trait]
pub trait MetadataRepo: Send + Sync {
    /// Reads the singleton version row. `Ok(None)` means the row is absent;
    /// any other failure is an error.
    async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
