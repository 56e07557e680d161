//! Identifier remapping for cloned record sets.
//!
//! A clone never reuses a source key. The remap table is built once, before
//! anything is rewritten, so every parent reference in the set is translated
//! through the same mapping.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, instrument, trace};

use crate::domain::entities::{GlobalKey, GroupKey, LinkRecord};
use crate::domain::error::{DomainError, DomainResult};

/// How often a generator may hand out an already used key before giving up.
pub const MAX_KEY_ATTEMPTS: usize = 8;

/// Old global key -> new global key, one entry per source record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: HashMap<GlobalKey, GlobalKey>,
}

impl RemapTable {
    /// Assign a fresh key to every record.
    ///
    /// `next_key` is asked for candidates; a candidate equal to any source key
    /// or to a key already issued in this table is discarded and asked again.
    ///
    /// # Errors
    /// * `DuplicateGlobalKey` if two source records share a key
    /// * `KeyCollision` if the generator exhausts `MAX_KEY_ATTEMPTS` for one record
    #[instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub fn build<F>(records: &[LinkRecord], mut next_key: F) -> DomainResult<Self>
    where
        F: FnMut() -> GlobalKey,
    {
        let mut sources = HashSet::with_capacity(records.len());
        for record in records {
            if !sources.insert(record.global_key) {
                return Err(DomainError::DuplicateGlobalKey(record.global_key));
            }
        }

        let mut issued = HashSet::with_capacity(records.len());
        let mut entries = HashMap::with_capacity(records.len());
        for record in records {
            let fresh = fresh_key(&mut next_key, &sources, &issued)?;
            trace!("remap {} -> {}", record.global_key, fresh);
            issued.insert(fresh);
            entries.insert(record.global_key, fresh);
        }

        debug!("built remap table with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn get(&self, old: &GlobalKey) -> Option<&GlobalKey> {
        self.entries.get(old)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GlobalKey, &GlobalKey)> {
        self.entries.iter()
    }
}

fn fresh_key<F>(
    next_key: &mut F,
    sources: &HashSet<GlobalKey>,
    issued: &HashSet<GlobalKey>,
) -> DomainResult<GlobalKey>
where
    F: FnMut() -> GlobalKey,
{
    let taken = |k: &GlobalKey| sources.contains(k) || issued.contains(k);

    let mut candidate = next_key();
    for _ in 1..MAX_KEY_ATTEMPTS {
        if !taken(&candidate) {
            return Ok(candidate);
        }
        candidate = next_key();
    }
    if taken(&candidate) {
        Err(DomainError::KeyCollision(candidate))
    } else {
        Ok(candidate)
    }
}

/// A record whose parent reference does not resolve inside its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DanglingParent {
    pub record: GlobalKey,
    pub parent: GlobalKey,
}

impl fmt::Display for DanglingParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> missing parent {}", self.record, self.parent)
    }
}

impl From<DanglingParent> for DomainError {
    fn from(d: DanglingParent) -> Self {
        DomainError::DanglingParentReference {
            record: d.record,
            parent: d.parent,
        }
    }
}

/// List every record whose parent is not part of `records`, in input order.
pub fn find_dangling(records: &[LinkRecord]) -> Vec<DanglingParent> {
    let keys: HashSet<&GlobalKey> = records.iter().map(|r| &r.global_key).collect();
    records
        .iter()
        .filter_map(|r| match &r.parent_ref {
            Some(parent) if !keys.contains(parent) => Some(DanglingParent {
                record: r.global_key,
                parent: *parent,
            }),
            _ => None,
        })
        .collect()
}

/// Result of rewriting a source set for its target group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rewrite {
    /// Unpersisted clones, in input order
    pub records: Vec<LinkRecord>,
    /// Clones whose parent could not be translated; they keep the source reference
    pub dangling: Vec<DanglingParent>,
}

impl Rewrite {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty()
    }
}

/// Produce target-group copies of `records` using `table`.
///
/// Per record: store id dropped, key and parent translated, group replaced,
/// attributes copied verbatim. Sources are only borrowed.
///
/// # Errors
/// `UnmappedRecord` if a record's own key is missing from `table`.
#[instrument(level = "debug", skip(records, table), fields(records = records.len()))]
pub fn rewrite(
    records: &[LinkRecord],
    table: &RemapTable,
    target: &GroupKey,
) -> DomainResult<Rewrite> {
    let mut out = Rewrite {
        records: Vec::with_capacity(records.len()),
        dangling: Vec::new(),
    };

    for source in records {
        let global_key = *table
            .get(&source.global_key)
            .ok_or(DomainError::UnmappedRecord(source.global_key))?;

        let parent_ref = match source.parent_ref {
            Some(parent) => match table.get(&parent) {
                Some(mapped) => Some(*mapped),
                None => {
                    debug!("dangling parent {} on {}", parent, source.global_key);
                    out.dangling.push(DanglingParent {
                        record: source.global_key,
                        parent,
                    });
                    Some(parent)
                }
            },
            None => None,
        };

        out.records.push(LinkRecord {
            id: None,
            global_key,
            group_key: target.clone(),
            parent_ref,
            attributes: source.attributes.clone(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RecordId;
    use uuid::Uuid;

    fn key(n: u128) -> GlobalKey {
        GlobalKey::new(Uuid::from_u128(n))
    }

    fn group(name: &str) -> GroupKey {
        GroupKey::new(name).unwrap()
    }

    fn counter(start: u128) -> impl FnMut() -> GlobalKey {
        let mut n = start;
        move || {
            n += 1;
            key(n)
        }
    }

    fn account() -> Vec<LinkRecord> {
        vec![
            LinkRecord::new(key(1), group("account"))
                .with_id(RecordId(1))
                .with_attribute("title", "Home"),
            LinkRecord::new(key(2), group("account"))
                .with_id(RecordId(2))
                .with_parent(key(1))
                .with_attribute("title", "Sub"),
        ]
    }

    #[test]
    fn given_records_when_building_table_then_maps_each_to_new_key() {
        let records = account();

        let table = RemapTable::build(&records, counter(100)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&key(1)), Some(&key(101)));
        assert_eq!(table.get(&key(2)), Some(&key(102)));
    }

    #[test]
    fn given_generator_returning_source_key_when_building_table_then_skips_it() {
        let records = account();
        // First candidate collides with a source key
        let mut candidates = vec![key(1), key(50), key(51)].into_iter();

        let table = RemapTable::build(&records, || candidates.next().unwrap_or(key(99))).unwrap();

        assert_eq!(table.get(&key(1)), Some(&key(50)));
        assert_eq!(table.get(&key(2)), Some(&key(51)));
    }

    #[test]
    fn given_constant_generator_when_building_table_then_reports_collision() {
        let records = account();

        let result = RemapTable::build(&records, || key(7));

        assert_eq!(result, Err(DomainError::KeyCollision(key(7))));
    }

    #[test]
    fn given_duplicate_source_keys_when_building_table_then_rejects() {
        let mut records = account();
        records[1].global_key = key(1);

        let result = RemapTable::build(&records, counter(100));

        assert_eq!(result, Err(DomainError::DuplicateGlobalKey(key(1))));
    }

    #[test]
    fn given_child_listed_before_parent_when_rewriting_then_parent_still_resolves() {
        let mut records = account();
        records.reverse();
        let table = RemapTable::build(&records, counter(100)).unwrap();

        let out = rewrite(&records, &table, &group("account_copy")).unwrap();

        assert!(out.is_clean());
        let child = &out.records[0];
        assert_eq!(child.parent_ref, Some(*table.get(&key(1)).unwrap()));
    }

    #[test]
    fn given_parent_outside_set_when_rewriting_then_flags_record() {
        let records = vec![LinkRecord::new(key(3), group("account")).with_parent(key(42))];
        let table = RemapTable::build(&records, counter(100)).unwrap();

        let out = rewrite(&records, &table, &group("account_copy")).unwrap();

        assert_eq!(
            out.dangling,
            vec![DanglingParent {
                record: key(3),
                parent: key(42)
            }]
        );
        assert_eq!(out.records[0].parent_ref, Some(key(42)));
        assert_eq!(find_dangling(&records), out.dangling);
    }

    #[test]
    fn given_table_missing_record_when_rewriting_then_errors() {
        let records = account();
        let table = RemapTable::build(&records[..1], counter(100)).unwrap();

        let result = rewrite(&records, &table, &group("account_copy"));

        assert_eq!(result, Err(DomainError::UnmappedRecord(key(2))));
    }
}
