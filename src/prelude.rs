//! Convenience re-exports for common use.

pub use crate::cache::{CacheKey, DurableStore, FileDurableStore, InMemoryDurableStore};
pub use crate::config::{CachePolicy, DomainTtls, GatewayConfig};
pub use crate::error::{GatewayError, Result};
pub use crate::search::{
    ActivitySearch, FlightSearch, HotelSearch, LocationSearch, LocationSubType, RawQuery,
    SearchQuery, SearchService, TravelClass,
};
pub use crate::types::{Domain, SearchPayload};
pub use crate::util::retry::RetryPolicy;
pub use crate::util::StatsReport;
