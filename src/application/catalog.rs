use std::sync::Arc;

use crate::application::cached::read_through;
use crate::application::repos::{EconomyRepo, ItemsRepo, MaterialList, RepoError};
use crate::cache::{CacheKey, CachePolicy, ReadThroughCache};
use crate::domain::entities::{CostRow, ItemDetailRow, ItemRow, ItemSourceRow, MaterialRow};

/// Item browser queries: the item list, single items and their relations.
#[derive(Clone)]
pub struct CatalogService {
    items: Arc<dyn ItemsRepo>,
    economy: Arc<dyn EconomyRepo>,
    cache: Option<Arc<ReadThroughCache>>,
}

impl CatalogService {
    pub fn new(
        items: Arc<dyn ItemsRepo>,
        economy: Arc<dyn EconomyRepo>,
        cache: Option<Arc<ReadThroughCache>>,
    ) -> Self {
        Self {
            items,
            economy,
            cache,
        }
    }

    pub async fn list_items(&self) -> Result<Vec<ItemRow>, RepoError> {
        let items = Arc::clone(&self.items);
        read_through(
            self.cache.as_deref(),
            CacheKey::items(),
            self.policy().items,
            || async move { items.list_items().await },
        )
        .await
    }

    pub async fn item(&self, id: &str) -> Result<Option<ItemDetailRow>, RepoError> {
        let items = Arc::clone(&self.items);
        read_through(
            self.cache.as_deref(),
            CacheKey::item_detail(id),
            self.policy().item_detail,
            || async move { items.find_item(id).await },
        )
        .await
    }

    /// Where an item can be obtained. Unknown items simply have no sources.
    pub async fn item_sources(&self, id: &str) -> Result<Vec<ItemSourceRow>, RepoError> {
        let items = Arc::clone(&self.items);
        read_through(
            self.cache.as_deref(),
            CacheKey::item_sources(id),
            self.policy().item_relations,
            || async move { items.list_item_sources(id).await },
        )
        .await
    }

    pub async fn item_materials(
        &self,
        id: &str,
        list: MaterialList,
    ) -> Result<Vec<MaterialRow>, RepoError> {
        let items = Arc::clone(&self.items);
        read_through(
            self.cache.as_deref(),
            CacheKey::item_materials(id, list),
            self.policy().item_relations,
            || async move { items.list_item_materials(id, list).await },
        )
        .await
    }

    pub async fn repair_costs(&self, id: &str) -> Result<Vec<CostRow>, RepoError> {
        let economy = Arc::clone(&self.economy);
        read_through(
            self.cache.as_deref(),
            CacheKey::repair_costs(id),
            self.policy().item_relations,
            || async move { economy.list_repair_costs(id).await },
        )
        .await
    }

    fn policy(&self) -> CachePolicy {
        self.cache
            .as_ref()
            .map(|cache| cache.config().policy)
            .unwrap_or_default()
    }
}
