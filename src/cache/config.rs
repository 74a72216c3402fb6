//! Cache configuration and TTL classes.

use std::time::Duration;

use serde::Deserialize;

pub(crate) const DEFAULT_TTL_SECS: u64 = 60 * 60;
pub(crate) const VERSION_TTL_SECS: u64 = 60;
pub(crate) const MODAL_TTL_SECS: u64 = 15 * 60;
pub(crate) const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Freshness policy a caller picks for a key family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlClass {
    /// One hour, then re-read.
    Default,
    /// No time limit; only a data version bump invalidates.
    Long,
    /// One minute; the cadence at which the version row itself is re-read.
    Version,
    /// Fifteen minutes, for short-lived detail previews.
    Modal,
}

/// Resolved lifetime of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Finite(Duration),
    Infinite,
}

impl Ttl {
    /// Whether an entry of the given age is still inside its lifetime.
    pub fn admits(self, age: Duration) -> bool {
        match self {
            Ttl::Infinite => true,
            Ttl::Finite(ttl) => age < ttl,
        }
    }
}

/// TTL class chosen for each key family served by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub items: TtlClass,
    pub item_detail: TtlClass,
    pub item_relations: TtlClass,
    pub repair_economy: TtlClass,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            items: TtlClass::Long,
            item_detail: TtlClass::Modal,
            item_relations: TtlClass::Default,
            repair_economy: TtlClass::Long,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub version_ttl: Duration,
    pub modal_ttl: Duration,
    /// Upper bound on stored keys. New keys are refused once reached;
    /// existing entries are never evicted to make room.
    pub max_entries: usize,
    pub policy: CachePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            version_ttl: Duration::from_secs(VERSION_TTL_SECS),
            modal_ttl: Duration::from_secs(MODAL_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
            policy: CachePolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl: settings.default_ttl,
            version_ttl: settings.version_ttl,
            modal_ttl: settings.modal_ttl,
            max_entries: settings.max_entries.get(),
            policy: settings.policy,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, class: TtlClass) -> Ttl {
        match class {
            TtlClass::Default => Ttl::Finite(self.default_ttl),
            TtlClass::Long => Ttl::Infinite,
            TtlClass::Version => Ttl::Finite(self.version_ttl),
            TtlClass::Modal => Ttl::Finite(self.modal_ttl),
        }
    }
}
