//! Clone hierarchical menu link trees into a new group.
//!
//! The core is [`application::services::TreeCloner`]: it reads one group's
//! links through a [`infrastructure::traits::LinkRepository`], gives every
//! copy a fresh global key and rewrites parent references through a single
//! remap table so the cloned tree has the same shape as the source.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
