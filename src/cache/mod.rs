//! Trove cache system
//!
//! A read-through cache for view query results, gated on the upstream data
//! version:
//!
//! - Every entry is stamped with the data version current when it was read.
//!   A version bump makes all older entries unservable.
//! - Entries in finite TTL classes additionally expire by age.
//! - The version row itself is re-read at most once per VERSION TTL.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 3600
//! version_ttl_seconds = 60
//! modal_ttl_seconds = 900
//!
//! [cache.policy]
//! items = "long"
//! item_detail = "modal"
//! item_relations = "default"
//! repair_economy = "long"
//! ```

mod clock;
mod config;
mod keys;
mod lock;
mod read_through;
mod store;
mod version;
mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CachePolicy, Ttl, TtlClass};
pub use keys::CacheKey;
pub use read_through::ReadThroughCache;
pub use store::{CacheEntry, CacheStorage, Freshness, MemoryStorage, StorageError};
pub use version::VersionGate;
pub use watcher::VersionWatcher;
