//! Upstream credentials: the client-credentials exchange and the token
//! lifecycle manager that keeps one bearer token fresh.

pub mod credential;
pub mod error;
pub mod manager;
pub mod provider;

pub use credential::Credential;
pub use error::AuthError;
pub use manager::{TokenManager, TokenPhase};
pub use provider::{ClientCredentialsProvider, CredentialProvider, TokenGrant};
