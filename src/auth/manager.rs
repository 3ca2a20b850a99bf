//! Bearer credential lifecycle with single-flight refresh.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::auth::credential::Credential;
use crate::auth::error::AuthError;
use crate::auth::provider::CredentialProvider;
use crate::error::{GatewayError, Result};
use crate::util::{Clock, GatewayStats};

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential>>>;

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Observable state of the [`TokenManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TokenPhase {
    /// No usable credential and no refresh running.
    NoToken,
    /// A credential request is in flight.
    Refreshing,
    /// A credential with more than the refresh buffer left is cached.
    Valid,
}

/// Owns the bearer credential for one upstream account.
///
/// However many callers ask for a credential at the same time, at most one
/// request to the credential endpoint is in flight. A refresh that outlives
/// the refresh timeout fails every waiter and clears the in-flight marker.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
    refresh_timeout: Duration,
}

struct ManagerInner {
    provider: Arc<dyn CredentialProvider>,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
    stats: GatewayStats,
    state: Mutex<TokenState>,
}

#[derive(Default)]
struct TokenState {
    credential: Option<Credential>,
    in_flight: Option<RefreshFuture>,
}

impl ManagerInner {
    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("phase", &self.phase())
            .field("refresh_buffer", &self.inner.refresh_buffer)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

/// Clears the in-flight marker if the refresh task dies before publishing.
struct InFlightGuard {
    inner: Arc<ManagerInner>,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock().in_flight = None;
        }
    }
}

impl TokenManager {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
        refresh_buffer: Duration,
        stats: GatewayStats,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                provider,
                clock,
                refresh_buffer,
                stats,
                state: Mutex::new(TokenState::default()),
            }),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn refresh_buffer(&self) -> Duration {
        self.inner.refresh_buffer
    }

    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    pub fn phase(&self) -> TokenPhase {
        let now = self.inner.clock.now();
        let state = self.inner.lock();
        if state.in_flight.is_some() {
            TokenPhase::Refreshing
        } else if state
            .credential
            .as_ref()
            .is_some_and(|c| c.is_fresh(now, self.inner.refresh_buffer))
        {
            TokenPhase::Valid
        } else {
            TokenPhase::NoToken
        }
    }

    /// The cached credential, if it is outside the refresh buffer.
    pub fn current(&self) -> Option<Credential> {
        let now = self.inner.clock.now();
        self.inner
            .lock()
            .credential
            .clone()
            .filter(|c| c.is_fresh(now, self.inner.refresh_buffer))
    }

    /// Return a credential that is valid for at least the refresh buffer,
    /// refreshing it (or joining the refresh already running) when needed.
    pub async fn ensure_valid(&self) -> Result<Credential> {
        let refresh = {
            let now = self.inner.clock.now();
            let mut state = self.inner.lock();
            if let Some(credential) = state
                .credential
                .as_ref()
                .filter(|c| c.is_fresh(now, self.inner.refresh_buffer))
            {
                return Ok(credential.clone());
            }
            match state.in_flight.clone() {
                Some(refresh) => refresh,
                None => {
                    let refresh = self.spawn_refresh();
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    /// Drop the cached credential if it is still `rejected_token`.
    ///
    /// A newer credential installed by a concurrent refresh is kept.
    pub fn invalidate(&self, rejected_token: &str) -> bool {
        let mut state = self.inner.lock();
        if state
            .credential
            .as_ref()
            .is_some_and(|c| c.token == rejected_token)
        {
            state.credential = None;
            true
        } else {
            false
        }
    }

    /// Drop the cached credential unconditionally.
    pub fn clear(&self) {
        self.inner.lock().credential = None;
    }

    /// Must be called with the state lock held; the task cannot publish
    /// before the caller has stored the returned future.
    fn spawn_refresh(&self) -> RefreshFuture {
        let inner = Arc::clone(&self.inner);
        let timeout = self.refresh_timeout;
        let task = tokio::spawn(async move {
            let mut guard = InFlightGuard {
                inner: Arc::clone(&inner),
                armed: true,
            };
            tracing::debug!("Requesting credential");
            let fetched = match tokio::time::timeout(timeout, inner.provider.fetch()).await {
                Ok(fetched) => fetched,
                Err(_) => Err(AuthError::Timeout),
            };

            let now = inner.clock.now();
            let mut state = inner.lock();
            state.in_flight = None;
            guard.armed = false;
            match fetched {
                Ok(grant) => {
                    let credential =
                        Credential::from_expires_in(grant.access_token, grant.expires_in, now);
                    state.credential = Some(credential.clone());
                    inner.stats.record_token_refresh();
                    tracing::info!(
                        expires_at = %credential.expires_at,
                        "Credential refreshed"
                    );
                    Ok(credential)
                }
                Err(err) => {
                    state.credential = None;
                    tracing::warn!(error = %err, "Credential refresh failed");
                    Err(GatewayError::from(err))
                }
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(GatewayError::AuthenticationFailed(format!(
                    "credential refresh aborted: {join_err}"
                ))),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::TokenGrant;
    use crate::util::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
        stall: bool,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn fetch(&self) -> std::result::Result<TokenGrant, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.stall && n == 1 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 401,
                    message: "invalid_client".into(),
                });
            }
            Ok(TokenGrant {
                access_token: format!("token-{n}"),
                expires_in: Duration::from_secs(1799),
            })
        }
    }

    fn manager(provider: Arc<CountingProvider>, clock: &ManualClock) -> TokenManager {
        TokenManager::new(
            provider,
            Arc::new(clock.clone()),
            Duration::from_secs(300),
            GatewayStats::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let provider = Arc::new(CountingProvider::default());
        let clock = ManualClock::default();
        let tokens = manager(provider.clone(), &clock);
        assert_eq!(tokens.phase(), TokenPhase::NoToken);

        let results = futures::future::join_all((0..8).map(|_| tokens.ensure_valid())).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap().token, "token-1");
        }
        assert_eq!(tokens.phase(), TokenPhase::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn credential_is_refreshed_inside_the_buffer() {
        let provider = Arc::new(CountingProvider::default());
        let clock = ManualClock::default();
        let tokens = manager(provider.clone(), &clock);

        assert_eq!(tokens.ensure_valid().await.unwrap().token, "token-1");
        clock.advance(Duration::from_secs(1000));
        assert_eq!(tokens.ensure_valid().await.unwrap().token, "token-1");
        clock.advance(Duration::from_secs(600));
        assert_eq!(tokens.ensure_valid().await.unwrap().token, "token-2");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_reaches_every_waiter_and_is_retried_next_time() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let clock = ManualClock::default();
        let tokens = manager(provider.clone(), &clock);

        let (a, b) = tokio::join!(tokens.ensure_valid(), tokens.ensure_valid());
        assert_eq!(a, b);
        assert!(matches!(a, Err(GatewayError::AuthenticationFailed(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.phase(), TokenPhase::NoToken);

        let _ = tokens.ensure_valid().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_refresh_times_out_and_frees_the_next_caller() {
        let provider = Arc::new(CountingProvider {
            stall: true,
            ..Default::default()
        });
        let clock = ManualClock::default();
        let tokens =
            manager(provider.clone(), &clock).with_refresh_timeout(Duration::from_secs(5));

        let (a, b) = tokio::join!(tokens.ensure_valid(), tokens.ensure_valid());
        assert_eq!(a, b);
        assert_eq!(
            a,
            Err(GatewayError::AuthenticationFailed(
                "Credential request timed out".into()
            ))
        );
        assert_eq!(tokens.phase(), TokenPhase::NoToken);

        assert_eq!(tokens.ensure_valid().await.unwrap().token, "token-2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_only_clears_the_rejected_token() {
        let provider = Arc::new(CountingProvider::default());
        let clock = ManualClock::default();
        let tokens = manager(provider, &clock);
        tokens.ensure_valid().await.unwrap();

        assert!(!tokens.invalidate("some-older-token"));
        assert_eq!(tokens.phase(), TokenPhase::Valid);
        assert!(tokens.invalidate("token-1"));
        assert_eq!(tokens.phase(), TokenPhase::NoToken);
        assert_eq!(tokens.ensure_valid().await.unwrap().token, "token-2");

        tokens.clear();
        assert!(tokens.current().is_none());
    }
}
