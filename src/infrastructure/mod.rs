//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements the persistence and key generation boundary traits
//! and wires up services.

pub mod di;
pub mod error;
pub mod store;
pub mod traits;

pub use error::{InfraError, InfraResult, StoreError, StoreResult};
pub use store::{InMemoryRepository, JsonFileRepository, StoreDocument};
