//! Gateway counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Cumulative counters shared by the cache, deduplicator, executor and
/// token manager of one gateway instance.
#[derive(Clone, Default, Debug)]
pub struct GatewayStats {
    inner: Arc<StatsInner>,
}

#[derive(Default, Debug)]
struct StatsInner {
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    cache_writes: AtomicU64,
    upstream_calls: AtomicU64,
    upstream_failures: AtomicU64,
    deduplicated_joins: AtomicU64,
    token_refreshes: AtomicU64,
    auth_retries: AtomicU64,
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub memory_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub cache_writes: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub deduplicated_joins: u64,
    pub token_refreshes: u64,
    pub auth_retries: u64,
}

impl StatsReport {
    /// Fraction of lookups answered by either cache tier.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.inner.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_hit(&self) {
        self.inner.durable_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write(&self) {
        self.inner.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_call(&self) {
        self.inner.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.inner.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated_join(&self) {
        self.inner.deduplicated_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_refresh(&self) {
        self.inner.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_retry(&self) {
        self.inner.auth_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsReport {
        let inner = &self.inner;
        StatsReport {
            memory_hits: inner.memory_hits.load(Ordering::Relaxed),
            durable_hits: inner.durable_hits.load(Ordering::Relaxed),
            misses: inner.misses.load(Ordering::Relaxed),
            cache_writes: inner.cache_writes.load(Ordering::Relaxed),
            upstream_calls: inner.upstream_calls.load(Ordering::Relaxed),
            upstream_failures: inner.upstream_failures.load(Ordering::Relaxed),
            deduplicated_joins: inner.deduplicated_joins.load(Ordering::Relaxed),
            token_refreshes: inner.token_refreshes.load(Ordering::Relaxed),
            auth_retries: inner.auth_retries.load(Ordering::Relaxed),
        }
    }
}
