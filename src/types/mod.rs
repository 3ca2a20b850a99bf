//! Core types shared by the cache, executor and search services.

pub mod domain;
pub mod payload;

pub use domain::Domain;
pub use payload::SearchPayload;
