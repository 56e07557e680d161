//! Domain layer: link records, identifier remapping and tree shape
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod forest;
pub mod remap;

pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use forest::{Forest, ForestNode, LinkNode};
pub use remap::{find_dangling, rewrite, DanglingParent, RemapTable, Rewrite, MAX_KEY_ATTEMPTS};
