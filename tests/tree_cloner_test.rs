//! Tests for TreeCloner

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};

use linkclone::application::services::{CloneErrorKind, SuccessPolicy, TreeCloner};
use linkclone::application::ApplicationError;
use linkclone::domain::{DanglingParent, Forest, GlobalKey, GroupKey, LinkRecord, RecordId};
use linkclone::infrastructure::traits::LinkRepository;
use linkclone::infrastructure::{InMemoryRepository, StoreError, StoreResult};
use linkclone::util::testing::{
    account_menu, group, init_test_setup, key, link, main_menu, SequentialKeyGenerator,
};

/// Repository that fails `create` for links with selected titles and records every attempt
struct FlakyRepository {
    inner: InMemoryRepository,
    fail_titles: Vec<String>,
    attempts: Mutex<Vec<LinkRecord>>,
}

impl FlakyRepository {
    fn new(records: Vec<LinkRecord>, fail_titles: &[&str]) -> Self {
        Self {
            inner: InMemoryRepository::with_records(records).unwrap(),
            fail_titles: fail_titles.iter().map(|t| t.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<LinkRecord> {
        self.attempts.lock().unwrap().clone()
    }
}

impl LinkRepository for FlakyRepository {
    fn find_by_group(&self, group: &GroupKey) -> StoreResult<Vec<LinkRecord>> {
        self.inner.find_by_group(group)
    }

    fn create(&self, record: LinkRecord) -> StoreResult<RecordId> {
        self.attempts.lock().unwrap().push(record.clone());
        let fails = record
            .title()
            .map(|t| self.fail_titles.iter().any(|f| f == t))
            .unwrap_or(false);
        if fails {
            return Err(StoreError::rejected("disk full"));
        }
        self.inner.create(record)
    }
}

/// Repository whose reads always fail
struct UnreadableRepository;

impl LinkRepository for UnreadableRepository {
    fn find_by_group(&self, _group: &GroupKey) -> StoreResult<Vec<LinkRecord>> {
        Err(StoreError::io(
            "read links.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ))
    }

    fn create(&self, _record: LinkRecord) -> StoreResult<RecordId> {
        Err(StoreError::rejected("read-only"))
    }
}

#[fixture]
fn store() -> Arc<InMemoryRepository> {
    init_test_setup();
    let mut records = account_menu();
    records.extend(main_menu());
    Arc::new(InMemoryRepository::with_records(records).unwrap())
}

fn cloner(repo: Arc<dyn LinkRepository>) -> TreeCloner {
    TreeCloner::new(repo, Arc::new(SequentialKeyGenerator::default()))
}

fn by_title<'a>(records: &'a [LinkRecord], title: &str) -> &'a LinkRecord {
    records
        .iter()
        .find(|r| r.title() == Some(title))
        .unwrap_or_else(|| panic!("no link titled {title}"))
}

// ============================================================
// Scenarios
// ============================================================

#[rstest]
fn given_account_menu_when_cloning_then_child_points_to_cloned_parent(
    store: Arc<InMemoryRepository>,
) {
    // Arrange
    let service = cloner(store.clone());

    // Act
    let report = service.clone_group(&group("account"), &group("account_copy"));

    // Assert
    assert!(report.success);
    assert_eq!(report.cloned_count, 2);
    assert_eq!(report.error, None);

    let copies = store.find_by_group(&group("account_copy")).unwrap();
    assert_eq!(copies.len(), 2);
    let home = by_title(&copies, "Home");
    let sub = by_title(&copies, "Sub");
    assert!(home.is_root());
    assert_eq!(sub.parent_ref, Some(home.global_key));
    assert_ne!(home.global_key, key(1));
    assert_ne!(sub.global_key, key(2));
    assert!(copies.iter().all(|r| r.group_key == group("account_copy")));
    assert!(copies.iter().all(|r| r.id.is_some()));
}

#[rstest]
fn given_empty_group_when_cloning_then_reports_source_group_empty(
    store: Arc<InMemoryRepository>,
) {
    // Arrange
    let before = store.len();
    let service = cloner(store.clone());

    // Act
    let report = service.clone_group(&group("empty_menu"), &group("empty_copy"));

    // Assert
    assert!(!report.success);
    assert_eq!(report.error, Some(CloneErrorKind::SourceGroupEmpty));
    assert_eq!(report.cloned_count, 0);
    assert_eq!(store.len(), before);
}

#[test]
fn given_parent_outside_group_when_cloning_then_reports_dangling_and_writes_nothing() {
    // Arrange
    init_test_setup();
    let records = vec![
        link(1, 1, "broken", None, "Home"),
        link(2, 2, "broken", Some(99), "Orphan"),
    ];
    let store = Arc::new(InMemoryRepository::with_records(records).unwrap());
    let service = cloner(store.clone());

    // Act
    let report = service.clone_group(&group("broken"), &group("broken_copy"));

    // Assert
    assert!(!report.success);
    assert_eq!(report.error, Some(CloneErrorKind::DanglingParentReference));
    assert_eq!(
        report.dangling,
        vec![DanglingParent {
            record: key(2),
            parent: key(99)
        }]
    );
    assert_eq!(report.cloned_count, 0);
    assert!(store
        .find_by_group(&group("broken_copy"))
        .unwrap()
        .is_empty());
}

fn two_link_cycle() -> Vec<LinkRecord> {
    vec![
        link(1, 1, "looped", None, "Root"),
        link(2, 2, "looped", Some(3), "A"),
        link(3, 3, "looped", Some(2), "B"),
    ]
}

fn self_parent() -> Vec<LinkRecord> {
    vec![link(4, 4, "looped", Some(4), "Self")]
}

#[rstest]
#[case::two_link_cycle(two_link_cycle())]
#[case::self_parent(self_parent())]
fn given_cyclic_source_when_cloning_then_reports_invalid_source_and_writes_nothing(
    #[case] records: Vec<LinkRecord>,
) {
    // Arrange
    init_test_setup();
    let store = Arc::new(InMemoryRepository::with_records(records).unwrap());
    let before = store.len();
    let service = cloner(store.clone());

    // Act
    let report = service.clone_group(&group("looped"), &group("looped_copy"));

    // Assert
    assert!(!report.success);
    assert_eq!(report.error, Some(CloneErrorKind::InvalidSource));
    assert_eq!(report.cloned_count, 0);
    assert!(report.dangling.is_empty());
    assert_eq!(store.len(), before);
    assert!(store
        .find_by_group(&group("looped_copy"))
        .unwrap()
        .is_empty());
}

#[test]
fn given_parent_outside_set_when_rewriting_then_flags_record_instead_of_failing() {
    // Arrange
    init_test_setup();
    let records = vec![link(5, 5, "main", Some(77), "Orphan")];
    let service = cloner(Arc::new(InMemoryRepository::new()));
    let table = service.build_remap_table(&records).unwrap();

    // Act
    let rewritten = service
        .rewrite(&records, &table, &group("main_copy"))
        .unwrap();

    // Assert
    assert_eq!(rewritten.records.len(), 1);
    assert_eq!(
        rewritten.dangling,
        vec![DanglingParent {
            record: key(5),
            parent: key(77)
        }]
    );
}

// ============================================================
// Properties
// ============================================================

#[rstest]
fn given_main_menu_when_cloning_then_target_is_isomorphic(store: Arc<InMemoryRepository>) {
    // Arrange
    let service = cloner(store.clone());
    let source = store.find_by_group(&group("main")).unwrap();

    // Act
    let report = service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    let target = store.find_by_group(&group("main_copy")).unwrap();
    let source_forest = Forest::from_records(&source).unwrap();
    let target_forest = Forest::from_records(&target).unwrap();
    assert_eq!(target_forest.len(), source_forest.len());
    assert_eq!(target_forest.edge_count(), source_forest.edge_count());
    assert_eq!(target_forest.root_count(), source_forest.root_count());
    assert!(target_forest.is_isomorphic(&source_forest));
    assert_eq!(report.shape_digest, target_forest.shape_digest());
}

#[rstest]
fn given_clone_when_comparing_keys_then_disjoint_from_source(store: Arc<InMemoryRepository>) {
    // Arrange
    let service = cloner(store.clone());

    // Act
    service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    let source: HashSet<GlobalKey> = store
        .find_by_group(&group("main"))
        .unwrap()
        .iter()
        .map(|r| r.global_key)
        .collect();
    let target: HashSet<GlobalKey> = store
        .find_by_group(&group("main_copy"))
        .unwrap()
        .iter()
        .map(|r| r.global_key)
        .collect();
    assert_eq!(target.len(), 5);
    assert!(source.is_disjoint(&target));
}

#[rstest]
fn given_clone_when_reading_source_again_then_unchanged(store: Arc<InMemoryRepository>) {
    // Arrange
    let service = cloner(store.clone());
    let before = store.find_by_group(&group("main")).unwrap();

    // Act
    service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    let after = store.find_by_group(&group("main")).unwrap();
    assert_eq!(after, before);
}

#[rstest]
fn given_clone_when_matching_attributes_then_each_source_has_exactly_one_copy(
    store: Arc<InMemoryRepository>,
) {
    // Arrange
    let service = cloner(store.clone());

    // Act
    service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    let source = store.find_by_group(&group("main")).unwrap();
    let target = store.find_by_group(&group("main_copy")).unwrap();
    for original in &source {
        let matches = target
            .iter()
            .filter(|c| c.attributes == original.attributes)
            .count();
        assert_eq!(matches, 1, "attributes of {}", original.global_key);
    }
}

#[rstest]
#[case("account", true)]
#[case("main", true)]
#[case("empty_menu", false)]
fn given_group_state_when_checking_twice_then_same_answer(
    store: Arc<InMemoryRepository>,
    #[case] name: &str,
    #[case] expected: bool,
) {
    // Arrange
    let service = cloner(store.clone());
    let before = store.len();

    // Act
    let first = service.check_availability(&group(name));
    let second = service.check_availability(&group(name));

    // Assert
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(store.len(), before);
}

#[rstest]
fn given_group_when_fetching_then_reports_found(store: Arc<InMemoryRepository>) {
    let service = cloner(store);

    let found = service.fetch_group(&group("main")).unwrap();
    let missing = service.fetch_group(&group("nowhere")).unwrap();

    assert!(found.found);
    assert_eq!(found.records.len(), 5);
    assert!(!missing.found);
    assert!(missing.records.is_empty());
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn given_failing_create_when_cloning_with_all_policy_then_reports_failure() {
    // Arrange
    init_test_setup();
    let repo = Arc::new(FlakyRepository::new(main_menu(), &["Blog"]));
    let service = cloner(repo.clone());

    // Act
    let report = service.clone_group(&group("main"), &group("main_copy"));

    // Assert - remaining links are still attempted, nothing is rolled back
    assert!(!report.success);
    assert_eq!(report.error, Some(CloneErrorKind::PersistenceFailure));
    assert_eq!(report.cloned_count, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_key, key(12));
    assert!(report.is_partial());
    assert_eq!(repo.attempts().len(), 5);
    assert_eq!(
        repo.find_by_group(&group("main_copy")).unwrap().len(),
        4
    );
}

#[test]
fn given_failing_create_when_cloning_with_any_policy_then_still_succeeds() {
    // Arrange
    init_test_setup();
    let repo = Arc::new(FlakyRepository::new(main_menu(), &["Blog"]));
    let service = cloner(repo).with_policy(SuccessPolicy::Any);

    // Act
    let report = service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    assert!(report.success);
    assert_eq!(report.cloned_count, 4);
    assert_eq!(report.error, Some(CloneErrorKind::PersistenceFailure));
}

#[test]
fn given_every_create_failing_when_cloning_with_any_policy_then_fails() {
    init_test_setup();
    let repo = Arc::new(FlakyRepository::new(account_menu(), &["Home", "Sub"]));
    let service = cloner(repo).with_policy(SuccessPolicy::Any);

    let report = service.clone_group(&group("account"), &group("account_copy"));

    assert!(!report.success);
    assert_eq!(report.cloned_count, 0);
    assert_eq!(report.failures.len(), 2);
}

#[test]
fn given_nested_menu_when_cloning_then_parents_are_created_before_children() {
    // Arrange - children listed before their parents in the store
    init_test_setup();
    let mut records = main_menu();
    records.reverse();
    let repo = Arc::new(FlakyRepository::new(records, &[]));
    let service = cloner(repo.clone());

    // Act
    let report = service.clone_group(&group("main"), &group("main_copy"));

    // Assert
    assert!(report.success);
    let attempts = repo.attempts();
    for (pos, record) in attempts.iter().enumerate() {
        if let Some(parent) = record.parent_ref {
            let parent_pos = attempts
                .iter()
                .position(|r| r.global_key == parent)
                .expect("parent was attempted");
            assert!(parent_pos < pos, "{} created before its parent", record.global_key);
        }
    }
}

#[test]
fn given_unreadable_store_when_cloning_then_reports_fetch_failure() {
    init_test_setup();
    let service = cloner(Arc::new(UnreadableRepository));

    assert!(!service.check_availability(&group("main")));
    let report = service.clone_group(&group("main"), &group("main_copy"));

    assert!(!report.success);
    assert_eq!(report.error, Some(CloneErrorKind::FetchFailure));
    assert!(report.detail.is_some());
}

// ============================================================
// Planning
// ============================================================

#[rstest]
fn given_main_menu_when_planning_then_nothing_is_written(store: Arc<InMemoryRepository>) {
    // Arrange
    let service = cloner(store.clone());
    let before = store.len();

    // Act
    let plan = service.plan(&group("main"), &group("main_copy")).unwrap();

    // Assert
    assert_eq!(plan.links.len(), 5);
    assert_eq!(plan.table.len(), 5);
    assert_eq!(store.len(), before);
    assert!(plan.links[0].record.is_root());
    assert!(plan.links.iter().all(|l| l.record.id.is_none()));
}

#[rstest]
fn given_empty_group_when_planning_then_errors(store: Arc<InMemoryRepository>) {
    let service = cloner(store);

    let result = service.plan(&group("empty_menu"), &group("copy"));

    assert!(matches!(result, Err(ApplicationError::SourceGroupEmpty(_))));
}
