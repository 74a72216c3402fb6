use std::sync::Arc;

use crate::application::repos::{MetadataRepo, RepoError};
use crate::cache::ReadThroughCache;
use crate::domain::entities::VersionRecord;

/// Exposes the upstream data version.
///
/// With a cache configured the answer comes from its version gate, so this
/// endpoint reports exactly the version entries are being checked against.
#[derive(Clone)]
pub struct MetadataService {
    metadata: Arc<dyn MetadataRepo>,
    cache: Option<Arc<ReadThroughCache>>,
}

impl MetadataService {
    pub fn new(metadata: Arc<dyn MetadataRepo>, cache: Option<Arc<ReadThroughCache>>) -> Self {
        Self { metadata, cache }
    }

    pub async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
        match self.cache.as_ref() {
            Some(cache) if cache.config().enabled => cache.versions().record().await,
            _ => self.metadata.data_version().await,
        }
    }
}
