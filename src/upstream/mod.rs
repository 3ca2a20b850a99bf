//! Upstream HTTP plumbing.

pub mod executor;
pub mod http;

pub use executor::{RequestExecutor, UpstreamRequest};
