//! Read-through / write-through composition of the two cache tiers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CacheEntry, CacheKey, DurableStore, MemoryCache};
use crate::config::CachePolicy;
use crate::error::Result;
use crate::types::{Domain, SearchPayload};
use crate::util::clock::{add_duration, remaining};
use crate::util::{Clock, GatewayStats};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CacheTier {
    Memory,
    Durable,
}

/// In-process LRU in front of a durable store.
///
/// Durable-store failures never reach the caller: a failed read is a miss and
/// a failed write only costs a future upstream call.
#[derive(Clone)]
pub struct TieredCache {
    memory: MemoryCache,
    durable: Arc<dyn DurableStore>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    stats: GatewayStats,
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("policy", &self.policy)
            .field("memory_len", &self.memory.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    pub fn new(
        durable: Arc<dyn DurableStore>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
        stats: GatewayStats,
    ) -> Self {
        Self {
            memory: MemoryCache::new(policy.memory_max_entries, clock.clone()),
            durable,
            policy,
            clock,
            stats,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn durable(&self) -> &Arc<dyn DurableStore> {
        &self.durable
    }

    /// Look up a live entry.
    pub async fn get(&self, domain: Domain, key: &CacheKey) -> Option<CacheEntry> {
        self.lookup(domain, key).await.map(|(entry, _)| entry)
    }

    /// Look up a live entry and report which tier served it.
    ///
    /// A durable hit is copied into the in-process tier for
    /// `min(remaining lifetime, memory_ttl)`.
    pub async fn lookup(&self, domain: Domain, key: &CacheKey) -> Option<(CacheEntry, CacheTier)> {
        if !self.policy.enabled {
            self.stats.record_miss();
            return None;
        }

        if let Some(entry) = self.memory.get(key) {
            tracing::debug!(%domain, key = %key, tier = "memory", "Cache hit");
            self.stats.record_memory_hit();
            return Some((entry, CacheTier::Memory));
        }

        let stored = match self.durable.get(domain, key).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(%domain, key = %key, error = %err, "Durable cache read failed");
                None
            }
        };

        let now = self.clock.now();
        match stored.filter(|entry| entry.is_live(now)) {
            Some(entry) => {
                tracing::debug!(%domain, key = %key, tier = "durable", "Cache hit");
                self.stats.record_durable_hit();
                self.memory.insert(self.memory_copy(&entry, now));
                Some((entry, CacheTier::Durable))
            }
            None => {
                tracing::debug!(%domain, key = %key, "Cache miss");
                self.stats.record_miss();
                None
            }
        }
    }

    /// Store a successful result in both tiers.
    ///
    /// `ttl` overrides the domain's default lifetime.
    pub async fn set(
        &self,
        domain: Domain,
        key: &CacheKey,
        payload: SearchPayload,
        ttl: Option<Duration>,
    ) {
        if !self.policy.enabled {
            return;
        }
        let ttl = ttl.unwrap_or_else(|| self.policy.ttls.for_domain(domain));
        if ttl.is_zero() {
            tracing::debug!(%domain, key = %key, "Zero TTL, not caching");
            return;
        }

        let now = self.clock.now();
        let entry = CacheEntry {
            key: key.clone(),
            domain,
            payload,
            created_at: now,
            expires_at: add_duration(now, ttl),
        };

        self.memory.insert(self.memory_copy(&entry, now));
        if let Err(err) = self.durable.put(&entry).await {
            tracing::warn!(%domain, key = %key, error = %err, "Durable cache write failed");
        }
        self.stats.record_cache_write();
        tracing::debug!(%domain, key = %key, ttl_secs = ttl.as_secs(), "Cached upstream result");
    }

    /// Drop `key` from both tiers.
    pub async fn invalidate(&self, domain: Domain, key: &CacheKey) -> Result<bool> {
        let in_memory = self.memory.remove(key);
        let in_durable = self.durable.remove(domain, key).await?;
        Ok(in_memory || in_durable)
    }

    /// Drop every entry of `domain` (or all domains) from both tiers,
    /// returning how many durable records were removed.
    pub async fn clear(&self, domain: Option<Domain>) -> Result<usize> {
        match domain {
            Some(domain) => {
                self.memory.remove_where(|entry| entry.domain == domain);
            }
            None => self.memory.clear(),
        }
        self.durable.clear(domain).await
    }

    /// Physically remove expired entries from both tiers.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let from_memory = self.memory.purge_expired();
        let from_durable = self.durable.sweep_expired(self.clock.now()).await?;
        Ok(from_memory + from_durable)
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the
    /// handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Swept expired cache entries"),
                    Err(err) => tracing::warn!(error = %err, "Cache sweep failed"),
                }
            }
        })
    }

    fn memory_copy(&self, entry: &CacheEntry, now: DateTime<Utc>) -> CacheEntry {
        let lifetime = remaining(now, entry.expires_at)
            .unwrap_or_default()
            .min(self.policy.memory_ttl);
        CacheEntry {
            expires_at: add_duration(now, lifetime),
            ..entry.clone()
        }
    }
}
