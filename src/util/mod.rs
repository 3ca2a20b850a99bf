//! Utility modules: clock, retry, timeout, stats.

pub mod clock;
pub mod retry;
pub mod stats;
pub mod timeout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use stats::{GatewayStats, StatsReport};
