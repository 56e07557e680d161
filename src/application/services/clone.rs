//! Tree clone service
//!
//! Copies every link of a source group into a target group. Each copy gets a
//! fresh global key; parent references are translated through one remap table
//! built before any write, so the target tree has the same shape as the source.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    find_dangling, rewrite, DanglingParent, Forest, GlobalKey, GroupKey, LinkRecord, RecordId,
    RemapTable, Rewrite,
};
use crate::infrastructure::traits::{KeyGenerator, LinkRepository};

/// When a clone with some failed writes still counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    /// Every record must be persisted
    #[default]
    All,
    /// At least one record persisted (legacy host behaviour)
    Any,
}

impl SuccessPolicy {
    fn is_success(self, created: usize, failed: usize) -> bool {
        match self {
            SuccessPolicy::All => created > 0 && failed == 0,
            SuccessPolicy::Any => created > 0,
        }
    }
}

impl fmt::Display for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessPolicy::All => f.write_str("all"),
            SuccessPolicy::Any => f.write_str("any"),
        }
    }
}

impl FromStr for SuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SuccessPolicy::All),
            "any" => Ok(SuccessPolicy::Any),
            other => Err(format!("unknown success policy '{other}' (expected all|any)")),
        }
    }
}

/// Why a clone did not fully succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloneErrorKind {
    /// Source group has no records; nothing was written
    SourceGroupEmpty,
    /// Some parent reference does not resolve inside the source group; nothing was written
    DanglingParentReference,
    /// Source set cannot be cloned (duplicate keys, cycles, key generation); nothing was written
    InvalidSource,
    /// Reading the source group failed; nothing was written
    FetchFailure,
    /// At least one create failed; earlier creates are kept
    PersistenceFailure,
}

impl fmt::Display for CloneErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloneErrorKind::SourceGroupEmpty => "source group empty",
            CloneErrorKind::DanglingParentReference => "dangling parent reference",
            CloneErrorKind::InvalidSource => "invalid source",
            CloneErrorKind::FetchFailure => "fetch failure",
            CloneErrorKind::PersistenceFailure => "persistence failure",
        };
        f.write_str(s)
    }
}

/// Records of one group as returned by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFetch {
    pub records: Vec<LinkRecord>,
    pub found: bool,
}

/// A clone ready to be created, with the key of the record it copies.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLink {
    pub source_key: GlobalKey,
    pub record: LinkRecord,
}

/// Everything `clone_group` would write, in creation order (parents first).
#[derive(Debug, Clone)]
pub struct ClonePlan {
    pub source: GroupKey,
    pub target: GroupKey,
    pub table: RemapTable,
    pub links: Vec<PlannedLink>,
    /// Identifier-free digest of the source tree shape
    pub shape_digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub source_key: GlobalKey,
    pub global_key: GlobalKey,
    pub id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub source_key: GlobalKey,
    pub global_key: GlobalKey,
    pub message: String,
}

/// Outcome of `clone_group`. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneReport {
    pub source: GroupKey,
    pub target: GroupKey,
    pub success: bool,
    pub cloned_count: usize,
    pub error: Option<CloneErrorKind>,
    pub created: Vec<CreatedLink>,
    pub failures: Vec<RecordFailure>,
    pub dangling: Vec<DanglingParent>,
    /// Source shape digest; empty when nothing was planned
    pub shape_digest: String,
    /// Human-readable cause for errors raised before any write
    pub detail: Option<String>,
}

impl CloneReport {
    fn rejected(source: &GroupKey, target: &GroupKey, err: ApplicationError) -> Self {
        let (kind, dangling) = match &err {
            ApplicationError::SourceGroupEmpty(_) => (CloneErrorKind::SourceGroupEmpty, vec![]),
            ApplicationError::DanglingReferences(list) => {
                (CloneErrorKind::DanglingParentReference, list.clone())
            }
            ApplicationError::Store(_) => (CloneErrorKind::FetchFailure, vec![]),
            ApplicationError::Domain(_) | ApplicationError::Config { .. } => {
                (CloneErrorKind::InvalidSource, vec![])
            }
        };
        Self {
            source: source.clone(),
            target: target.clone(),
            success: false,
            cloned_count: 0,
            error: Some(kind),
            created: Vec::new(),
            failures: Vec::new(),
            dangling,
            shape_digest: String::new(),
            detail: Some(err.to_string()),
        }
    }

    /// Some records were written but not all.
    pub fn is_partial(&self) -> bool {
        self.cloned_count > 0 && !self.failures.is_empty()
    }
}

/// Clones one group's link tree into another group.
pub struct TreeCloner {
    repo: Arc<dyn LinkRepository>,
    keys: Arc<dyn KeyGenerator>,
    policy: SuccessPolicy,
}

impl TreeCloner {
    pub fn new(repo: Arc<dyn LinkRepository>, keys: Arc<dyn KeyGenerator>) -> Self {
        Self {
            repo,
            keys,
            policy: SuccessPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SuccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SuccessPolicy {
        self.policy
    }

    /// True iff the group has at least one record. Read failures count as false.
    #[instrument(level = "debug", skip(self))]
    pub fn check_availability(&self, group: &GroupKey) -> bool {
        match self.fetch_group(group) {
            Ok(fetch) => fetch.found,
            Err(e) => {
                warn!("availability check for {} failed: {}", group, e);
                false
            }
        }
    }

    /// Load a group's records. An empty group is `found = false`, not an error.
    #[instrument(level = "debug", skip(self))]
    pub fn fetch_group(&self, group: &GroupKey) -> ApplicationResult<GroupFetch> {
        let records = self.repo.find_by_group(group)?;
        debug!("fetch_group: {} record(s) in {}", records.len(), group);
        let found = !records.is_empty();
        Ok(GroupFetch { records, found })
    }

    /// One fresh key per record from the injected generator.
    pub fn build_remap_table(&self, records: &[LinkRecord]) -> ApplicationResult<RemapTable> {
        Ok(RemapTable::build(records, || self.keys.generate())?)
    }

    /// Target-group copies of `records`; dangling parents are flagged, not fatal.
    pub fn rewrite(
        &self,
        records: &[LinkRecord],
        table: &RemapTable,
        target: &GroupKey,
    ) -> ApplicationResult<Rewrite> {
        Ok(rewrite(records, table, target)?)
    }

    /// Compute the clone without writing anything.
    ///
    /// # Errors
    /// * `SourceGroupEmpty` if the source has no records
    /// * `DanglingReferences` listing every record whose parent is outside the source
    /// * `Store` if the source cannot be read
    /// * `Domain` for duplicate keys, cycles or key generation failures
    #[instrument(level = "debug", skip(self))]
    pub fn plan(&self, source: &GroupKey, target: &GroupKey) -> ApplicationResult<ClonePlan> {
        let fetch = self.fetch_group(source)?;
        if !fetch.found {
            return Err(ApplicationError::SourceGroupEmpty(source.clone()));
        }

        let dangling = find_dangling(&fetch.records);
        if !dangling.is_empty() {
            return Err(ApplicationError::DanglingReferences(dangling));
        }

        let forest = Forest::from_records(&fetch.records)?;
        let table = self.build_remap_table(&fetch.records)?;
        let rewritten = self.rewrite(&fetch.records, &table, target)?;

        let mut by_source: HashMap<GlobalKey, LinkRecord> = fetch
            .records
            .iter()
            .map(|r| r.global_key)
            .zip(rewritten.records)
            .collect();
        let links = forest
            .creation_order()
            .into_iter()
            .filter_map(|source_key| {
                by_source
                    .remove(&source_key)
                    .map(|record| PlannedLink { source_key, record })
            })
            .collect();

        Ok(ClonePlan {
            source: source.clone(),
            target: target.clone(),
            table,
            links,
            shape_digest: forest.shape_digest(),
        })
    }

    /// Clone every link of `source` into `target`.
    ///
    /// Records are created one at a time, parents before children. A failed
    /// create is reported and the remaining records are still attempted;
    /// records already created are not rolled back. `success` follows the
    /// configured `SuccessPolicy`.
    #[instrument(skip(self))]
    pub fn clone_group(&self, source: &GroupKey, target: &GroupKey) -> CloneReport {
        let plan = match self.plan(source, target) {
            Ok(plan) => plan,
            Err(e) => {
                debug!("clone_group: {} not cloned: {}", source, e);
                return CloneReport::rejected(source, target, e);
            }
        };

        let mut created = Vec::with_capacity(plan.links.len());
        let mut failures = Vec::new();
        for link in plan.links {
            let global_key = link.record.global_key;
            match self.repo.create(link.record) {
                Ok(id) => created.push(CreatedLink {
                    source_key: link.source_key,
                    global_key,
                    id,
                }),
                Err(e) => {
                    warn!("create {} (copy of {}) failed: {}", global_key, link.source_key, e);
                    failures.push(RecordFailure {
                        source_key: link.source_key,
                        global_key,
                        message: e.to_string(),
                    });
                }
            }
        }

        let cloned_count = created.len();
        let success = self.policy.is_success(cloned_count, failures.len());
        let error = (!failures.is_empty()).then_some(CloneErrorKind::PersistenceFailure);
        info!(
            "cloned {} of {} link(s) from {} to {} (success={})",
            cloned_count,
            cloned_count + failures.len(),
            source,
            target,
            success
        );

        CloneReport {
            source: source.clone(),
            target: target.clone(),
            success,
            cloned_count,
            error,
            created,
            failures,
            dangling: Vec::new(),
            shape_digest: plan.shape_digest,
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_policies_when_judging_partial_write_then_differ() {
        assert!(!SuccessPolicy::All.is_success(2, 1));
        assert!(SuccessPolicy::Any.is_success(2, 1));
        assert!(!SuccessPolicy::Any.is_success(0, 3));
        assert!(SuccessPolicy::All.is_success(3, 0));
    }

    #[test]
    fn given_policy_names_when_parsing_then_round_trip() {
        assert_eq!("ANY".parse::<SuccessPolicy>(), Ok(SuccessPolicy::Any));
        assert_eq!(SuccessPolicy::All.to_string(), "all");
        assert!("most".parse::<SuccessPolicy>().is_err());
    }
}
