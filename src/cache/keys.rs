//! Cache key definitions.
//!
//! A key names the query it caches: the view family plus any path parameter.
//! The data version is not part of the key; it is stamped on the entry.

use std::fmt;

use crate::application::repos::MaterialList;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn items() -> Self {
        Self("items:list".to_string())
    }

    pub fn item_detail(id: &str) -> Self {
        Self(format!("items:detail:{id}"))
    }

    pub fn item_sources(id: &str) -> Self {
        Self(format!("items:sources:{id}"))
    }

    pub fn item_materials(id: &str, list: MaterialList) -> Self {
        Self(format!("items:{}:{id}", list.as_str()))
    }

    pub fn repair_costs(id: &str) -> Self {
        Self(format!("economy:repair-costs:{id}"))
    }

    pub fn repair_economy() -> Self {
        Self("economy:repair".to_string())
    }

    /// Key supplied verbatim, e.g. by the admin invalidation endpoint.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
