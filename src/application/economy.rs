use std::sync::Arc;

use crate::application::cached::read_through;
use crate::application::repos::{EconomyRepo, RepoError};
use crate::cache::{CacheKey, ReadThroughCache};
use crate::domain::entities::RepairEconomyRow;

/// Repair-cost calculator data.
#[derive(Clone)]
pub struct EconomyService {
    economy: Arc<dyn EconomyRepo>,
    cache: Option<Arc<ReadThroughCache>>,
}

impl EconomyService {
    pub fn new(economy: Arc<dyn EconomyRepo>, cache: Option<Arc<ReadThroughCache>>) -> Self {
        Self { economy, cache }
    }

    pub async fn repair_economy(&self) -> Result<Vec<RepairEconomyRow>, RepoError> {
        let class = self
            .cache
            .as_ref()
            .map(|cache| cache.config().policy)
            .unwrap_or_default()
            .repair_economy;
        let economy = Arc::clone(&self.economy);

        read_through(
            self.cache.as_deref(),
            CacheKey::repair_economy(),
            class,
            || async move { economy.list_repair_economy().await },
        )
        .await
    }
}
