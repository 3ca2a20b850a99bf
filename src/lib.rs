//! tripgate: resilience and caching layer for pay-per-call travel APIs.
//!
//! Every lookup against the upstream (flights, hotels, locations,
//! activities) goes through one [`SearchService`](search::SearchService),
//! which keeps a single bearer credential fresh, bounds each call with a
//! deadline, re-authenticates once on 401, collapses concurrent identical
//! lookups into one upstream call, and caches successful results in an
//! in-process LRU backed by a durable store.
//!
//! # Quick Start
//!
//! ```no_run
//! use tripgate::prelude::*;
//!
//! # async fn example() -> tripgate::error::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! let service = SearchService::from_config(&config)?;
//!
//! let query = LocationSearch::builder().keyword("Paris").build();
//! let payload = service.search(&query).await?;
//! println!("{}", serde_json::to_string_pretty(&payload.data)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod prelude;
pub mod search;
pub mod types;
pub mod upstream;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
