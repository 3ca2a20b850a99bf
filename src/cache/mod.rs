//! Two-tier response cache: a bounded in-process LRU in front of a durable,
//! TTL-indexed store.

pub mod durable;
pub mod key;
pub mod memory;
pub mod tiered;

pub use durable::{DurableStore, FileDurableStore, InMemoryDurableStore};
pub use key::CacheKey;
pub use memory::MemoryCache;
pub use tiered::{CacheTier, TieredCache};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Domain, SearchPayload};

/// A cached successful upstream response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub domain: Domain,
    pub payload: SearchPayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
