//! Infrastructure layer: configuration, logging, HTTP, and the
//! in-memory store used by tests and the dev binary.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod memory_store;

pub use config::AppConfig;
pub use http_client::{HttpClient, HttpClientConfig};
pub use memory_store::{MemoryJobQueue, MemoryResolverQueue, MemoryStore};
