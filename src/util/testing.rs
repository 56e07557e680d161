//! Test support: logging setup, deterministic keys and sample menus.

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use crate::domain::{GlobalKey, GroupKey, LinkRecord, RecordId};
use crate::infrastructure::traits::KeyGenerator;

static TEST_SETUP: Once = Once::new();

/// Install a global tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate only.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("linkclone=debug"));
        let layer = fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false);

        if tracing::dispatcher::has_been_set() {
            return;
        }
        if let Err(e) = tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
        {
            eprintln!("Error: Failed to set up logging: {}", e);
        }
        info!("Test Setup complete (RUST_LOG={:?})", env::var("RUST_LOG").ok());
    });
}

/// Deterministic key built from a number (`00000000-0000-0000-0000-00000000002a` for 42).
pub fn key(n: u128) -> GlobalKey {
    GlobalKey::new(Uuid::from_u128(n))
}

pub fn group(name: &str) -> GroupKey {
    GroupKey::new(name).expect("valid test group key")
}

/// Stub generator handing out `key(start + 1)`, `key(start + 2)`, ...
#[derive(Debug)]
pub struct SequentialKeyGenerator {
    next: AtomicU64,
}

impl SequentialKeyGenerator {
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl Default for SequentialKeyGenerator {
    fn default() -> Self {
        Self::starting_at(1000)
    }
}

impl KeyGenerator for SequentialKeyGenerator {
    fn generate(&self) -> GlobalKey {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        key(n as u128)
    }
}

/// Persisted link with a title and weight.
pub fn link(id: u64, n: u128, group_name: &str, parent: Option<u128>, title: &str) -> LinkRecord {
    let mut record = LinkRecord::new(key(n), group(group_name))
        .with_id(RecordId(id))
        .with_attribute("title", title)
        .with_attribute("link", serde_json::json!({ "uri": "internal:/" }))
        .with_attribute("weight", 0)
        .with_attribute("expanded", true);
    record.parent_ref = parent.map(key);
    record
}

/// `account` menu: Home (key 1) with child Sub (key 2).
pub fn account_menu() -> Vec<LinkRecord> {
    vec![
        link(1, 1, "account", None, "Home"),
        link(2, 2, "account", Some(1), "Sub"),
    ]
}

/// `main` menu with two roots and three levels:
///
/// ```text
/// Home (10)          Contact (14)
/// ├── About (11)
/// │   └── Team (13)
/// └── Blog (12)
/// ```
pub fn main_menu() -> Vec<LinkRecord> {
    vec![
        link(10, 10, "main", None, "Home"),
        link(11, 11, "main", Some(10), "About"),
        link(12, 12, "main", Some(10), "Blog"),
        link(13, 13, "main", Some(11), "Team"),
        link(14, 14, "main", None, "Contact"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_sequential_generator_when_generating_then_counts_up() {
        init_test_setup();
        let keys = SequentialKeyGenerator::starting_at(5);

        assert_eq!(keys.generate(), key(6));
        assert_eq!(keys.generate(), key(7));
    }
}
