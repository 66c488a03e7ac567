//! octagnosis-client: backend integrations.
//!
//! Implements the `AttemptService` trait over HTTP and over an in-memory
//! question bank, and loads the configuration that chooses between them.

pub mod config;
pub mod http;
pub mod offline;

pub use config::{create_service, load_config, BackendConfig, OctagnosisConfig};
pub use http::HttpAttemptService;
pub use octagnosis_core::error::ServiceError;
pub use offline::InMemoryBackend;
