//! Routes service loads through the read-through cache when one is configured.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::{CacheKey, ReadThroughCache, TtlClass};

/// Route a load through the cache when one is configured and enabled.
pub(crate) async fn read_through<T, E, F, Fut>(
    cache: Option<&ReadThroughCache>,
    key: CacheKey,
    class: TtlClass,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache {
        Some(cache) if cache.config().enabled => cache.fetch(key, class, load).await,
        _ => load().await,
    }
}
