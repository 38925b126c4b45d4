//! Hosted backend connectors
//!
//! The rest of the crate only talks to the backend through the
//! [`DataGateway`] trait, so the cache and the rating coordinator can run
//! against [`MockBackend`] in tests and against [`BackendClient`] otherwise.

pub mod backend;
pub mod config;
pub mod errors;

pub use backend::{BackendClient, DataGateway, MockBackend, SignUpResponse};
pub use config::BackendConfig;
pub use errors::ConnectorError;
