use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{request_key, to_query, SearchQuery};
use crate::auth::{ClientCredentialsProvider, CredentialProvider, TokenManager};
use crate::cache::{DurableStore, FileDurableStore, TieredCache};
use crate::config::GatewayConfig;
use crate::dedupe::RequestDeduplicator;
use crate::error::Result;
use crate::types::SearchPayload;
use crate::upstream::http::build_client;
use crate::upstream::{RequestExecutor, UpstreamRequest};
use crate::util::{Clock, GatewayStats, StatsReport, SystemClock};

/// Entry point for every upstream lookup.
///
/// Cheap to clone; clones share the credential, caches, in-flight map and
/// counters.
///
/// # Example
/// ```no_run
/// use tripgate::config::GatewayConfig;
/// use tripgate::search::{LocationSearch, SearchService};
///
/// # async fn example() -> tripgate::error::Result<()> {
/// let service = SearchService::from_config(&GatewayConfig::from_env()?)?;
/// let query = LocationSearch::builder().keyword("Paris").build();
/// let payload = service.search(&query).await?;
/// println!("{} locations", payload.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    executor: RequestExecutor,
    cache: TieredCache,
    dedupe: RequestDeduplicator<SearchPayload>,
    stats: GatewayStats,
}

impl fmt::Debug for SearchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchService")
            .field("executor", &self.inner.executor)
            .field("cache", &self.inner.cache)
            .field("dedupe", &self.inner.dedupe)
            .finish()
    }
}

impl SearchService {
    /// Production wiring: file-backed durable tier, system clock and the
    /// client-credentials exchange.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config.request_timeout)?;
        let provider = Arc::new(ClientCredentialsProvider::from_config(client.clone(), config));
        Ok(Self::new(
            config,
            client,
            Arc::new(FileDurableStore::new(config.cache_dir.clone())),
            Arc::new(SystemClock),
            provider,
        ))
    }

    /// Wire a service from explicit parts.
    pub fn new(
        config: &GatewayConfig,
        client: reqwest::Client,
        durable: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        let stats = GatewayStats::new();
        let tokens = TokenManager::new(
            provider,
            Arc::clone(&clock),
            config.refresh_buffer,
            stats.clone(),
        )
        .with_refresh_timeout(config.request_timeout);
        let executor = RequestExecutor::new(
            client,
            config.base_url.clone(),
            tokens,
            config.request_timeout,
            stats.clone(),
        );
        let cache = TieredCache::new(durable, config.cache, clock, stats.clone());
        Self {
            inner: Arc::new(ServiceInner {
                executor,
                cache,
                dedupe: RequestDeduplicator::new(stats.clone()),
                stats,
            }),
        }
    }

    /// Run `query`, answering from cache when possible.
    ///
    /// Concurrent identical queries share one upstream call. Only successful
    /// results are cached.
    pub async fn search<Q>(&self, query: &Q) -> Result<SearchPayload>
    where
        Q: SearchQuery + ?Sized,
    {
        let domain = query.domain();
        let method = query.method();
        let params = query.params()?;
        let body = query.body();
        let key = request_key(domain, &method, query.path(), &params, body.as_ref());

        if let Some(entry) = self.inner.cache.get(domain, &key).await {
            return Ok(entry.payload);
        }

        let mut request = UpstreamRequest::new(method, query.path()).with_query(to_query(&params)?);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(timeout) = query.timeout() {
            request = request.with_timeout(timeout);
        }
        let ttl = query.ttl();

        let inner = Arc::clone(&self.inner);
        let cache_key = key.clone();
        self.inner
            .dedupe
            .dedupe(key.as_str(), move || async move {
                // An identical call may have finished while the cache read
                // above was still pending.
                if let Some(entry) = inner.cache.memory().get(&cache_key) {
                    return Ok(entry.payload);
                }
                let body = inner.executor.execute(&request).await?;
                let payload = SearchPayload::from_upstream(body);
                inner.cache.set(domain, &cache_key, payload.clone(), ttl).await;
                Ok(payload)
            })
            .await
    }

    pub fn stats(&self) -> StatsReport {
        self.inner.stats.snapshot()
    }

    pub fn cache(&self) -> &TieredCache {
        &self.inner.cache
    }

    pub fn tokens(&self) -> &TokenManager {
        self.inner.executor.tokens()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.inner.executor
    }

    /// Number of distinct lookups currently waiting on the upstream.
    pub fn in_flight(&self) -> usize {
        self.inner.dedupe.pending_len()
    }

    /// Periodically sweep expired entries from both cache tiers.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.inner.cache.spawn_sweeper(interval)
    }
}
