//! Collapses concurrent identical lookups into one upstream call.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{GatewayError, Result};
use crate::util::GatewayStats;

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Pending<T: Clone> {
    id: u64,
    outcome: SharedOutcome<T>,
}

type PendingMap<T> = Arc<Mutex<HashMap<String, Pending<T>>>>;

/// Map from request key to the single in-flight outcome for that key.
///
/// The first caller for a key runs the work; callers arriving before it
/// settles wait for the same value or the same error. The key is released as
/// soon as the work settles, however it settles, so failures are never
/// replayed to later callers.
pub struct RequestDeduplicator<T: Clone> {
    pending: PendingMap<T>,
    next_id: Arc<AtomicU64>,
    stats: GatewayStats,
}

impl<T: Clone> Clone for RequestDeduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            next_id: Arc::clone(&self.next_id),
            stats: self.stats.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl<T: Clone> Default for RequestDeduplicator<T> {
    fn default() -> Self {
        Self::new(GatewayStats::new())
    }
}

/// Releases the key when the work completes, fails, or unwinds.
struct PendingGuard<T: Clone> {
    pending: PendingMap<T>,
    key: String,
    id: u64,
}

impl<T: Clone> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&self.key).is_some_and(|p| p.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

impl<T: Clone> RequestDeduplicator<T> {
    pub fn new(stats: GatewayStats) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pending<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys with work in flight.
    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `factory()` for `key` unless a call for `key` is already in flight,
    /// in which case its outcome is awaited instead.
    ///
    /// The work runs on its own task, so it settles (and releases the key)
    /// even if every caller stops waiting. `factory` is invoked while the
    /// pending map is locked and must not call back into this deduplicator.
    pub async fn dedupe<F, Fut>(&self, key: &str, factory: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let outcome = {
            let mut pending = self.lock();
            match pending.get(key) {
                Some(existing) => {
                    self.stats.record_deduplicated_join();
                    tracing::debug!(key, "Joining in-flight request");
                    existing.outcome.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let guard = PendingGuard {
                        pending: Arc::clone(&self.pending),
                        key: key.to_string(),
                        id,
                    };
                    let work = factory();
                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        work.await
                    });
                    let outcome = async move {
                        match task.await {
                            Ok(result) => result,
                            Err(join_err) => Err(GatewayError::ServiceUnavailable(format!(
                                "request task aborted: {join_err}"
                            ))),
                        }
                    }
                    .boxed()
                    .shared();
                    pending.insert(
                        key.to_string(),
                        Pending {
                            id,
                            outcome: outcome.clone(),
                        },
                    );
                    outcome
                }
            }
        };
        outcome.await
    }
}
