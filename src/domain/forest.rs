//! Arena-backed view of one group's link trees.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use generational_arena::{Arena, Index};
use itertools::Itertools;
use sha2::{Digest, Sha256};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{GlobalKey, LinkRecord};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::remap::find_dangling;

/// Payload of a forest node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub global_key: GlobalKey,
    pub title: String,
    pub weight: i64,
}

impl fmt::Display for LinkNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.global_key)
    }
}

#[derive(Debug)]
pub struct ForestNode {
    pub data: LinkNode,
    /// None for root links
    pub parent: Option<Index>,
    /// Ordered by weight, then title
    pub children: Vec<Index>,
}

/// All trees of one group. Roots and siblings are kept in menu order.
#[derive(Debug)]
pub struct Forest {
    arena: Arena<ForestNode>,
    roots: Vec<Index>,
}

impl Forest {
    /// Build the forest for a record set.
    ///
    /// # Errors
    /// * `DuplicateGlobalKey` if two records share a key
    /// * `DanglingParentReference` for the first parent not in the set
    /// * `CycleDetected` if some records cannot be reached from any root
    #[instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub fn from_records(records: &[LinkRecord]) -> DomainResult<Self> {
        if let Some(d) = find_dangling(records).into_iter().next() {
            return Err(d.into());
        }

        let mut arena = Arena::with_capacity(records.len());
        let mut index_of: HashMap<GlobalKey, Index> = HashMap::with_capacity(records.len());
        for record in records {
            let idx = arena.insert(ForestNode {
                data: LinkNode {
                    global_key: record.global_key,
                    title: record.title().unwrap_or_default().to_string(),
                    weight: record.weight(),
                },
                parent: None,
                children: Vec::new(),
            });
            if index_of.insert(record.global_key, idx).is_some() {
                return Err(DomainError::DuplicateGlobalKey(record.global_key));
            }
        }

        let mut roots = Vec::new();
        for record in records {
            let idx = index_of[&record.global_key];
            match record.parent_ref.as_ref().map(|p| index_of[p]) {
                Some(parent_idx) => {
                    if let Some(node) = arena.get_mut(idx) {
                        node.parent = Some(parent_idx);
                    }
                    if let Some(parent) = arena.get_mut(parent_idx) {
                        parent.children.push(idx);
                    }
                }
                None => roots.push(idx),
            }
        }

        let mut forest = Self { arena, roots };
        forest.sort_siblings();
        forest.ensure_reachable()?;
        Ok(forest)
    }

    fn sort_key(&self, idx: Index) -> (i64, String, GlobalKey) {
        let data = &self.arena[idx].data;
        (data.weight, data.title.clone(), data.global_key)
    }

    fn sort_siblings(&mut self) {
        let roots: Vec<Index> = std::mem::take(&mut self.roots)
            .into_iter()
            .sorted_by_cached_key(|&i| self.sort_key(i))
            .collect();
        self.roots = roots;

        let indices: Vec<Index> = self.arena.iter().map(|(i, _)| i).collect();
        for idx in indices {
            let children = std::mem::take(&mut self.arena[idx].children);
            let sorted: Vec<Index> = children
                .into_iter()
                .sorted_by_cached_key(|&i| self.sort_key(i))
                .collect();
            self.arena[idx].children = sorted;
        }
    }

    fn ensure_reachable(&self) -> DomainResult<()> {
        let visited: HashSet<Index> = self.breadth_first().into_iter().collect();
        match self.arena.iter().find(|(i, _)| !visited.contains(i)) {
            Some((_, node)) => Err(DomainError::CycleDetected(node.data.global_key)),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of parent -> child edges.
    pub fn edge_count(&self) -> usize {
        self.arena.iter().filter(|(_, n)| n.parent.is_some()).count()
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn get(&self, idx: Index) -> Option<&ForestNode> {
        self.arena.get(idx)
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut queue: VecDeque<(Index, usize)> = self.roots.iter().map(|&r| (r, 1)).collect();
        while let Some((idx, level)) = queue.pop_front() {
            deepest = deepest.max(level);
            if let Some(node) = self.arena.get(idx) {
                queue.extend(node.children.iter().map(|&c| (c, level + 1)));
            }
        }
        deepest
    }

    fn breadth_first(&self) -> Vec<Index> {
        let mut order = Vec::with_capacity(self.arena.len());
        let mut queue: VecDeque<Index> = self.roots.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            if let Some(node) = self.arena.get(idx) {
                queue.extend(node.children.iter().copied());
            }
        }
        order
    }

    /// Keys in breadth-first order: every parent precedes its children.
    pub fn creation_order(&self) -> Vec<GlobalKey> {
        self.breadth_first()
            .into_iter()
            .map(|i| self.arena[i].data.global_key)
            .collect()
    }

    /// Canonical, identifier-free encoding of the forest shape.
    ///
    /// Two forests have the same signature iff they are isomorphic as
    /// unordered rooted forests.
    pub fn shape_signature(&self) -> String {
        // Reverse breadth-first order visits every child before its parent.
        let mut signatures: HashMap<Index, String> = HashMap::with_capacity(self.arena.len());
        for idx in self.breadth_first().into_iter().rev() {
            let inner: String = self.arena[idx]
                .children
                .iter()
                .filter_map(|c| signatures.remove(c))
                .sorted()
                .collect();
            signatures.insert(idx, format!("({inner})"));
        }
        self.roots
            .iter()
            .filter_map(|r| signatures.remove(r))
            .sorted()
            .collect()
    }

    /// Hex SHA-256 of `shape_signature`.
    pub fn shape_digest(&self) -> String {
        hex::encode(Sha256::digest(self.shape_signature().as_bytes()))
    }

    pub fn is_isomorphic(&self, other: &Forest) -> bool {
        self.len() == other.len() && self.shape_signature() == other.shape_signature()
    }

    /// Render each root as a display tree of link titles.
    pub fn display_trees(&self) -> Vec<Tree<String>> {
        self.roots.iter().map(|&r| self.display_tree(r)).collect()
    }

    fn display_tree(&self, idx: Index) -> Tree<String> {
        let node = &self.arena[idx];
        let mut tree = Tree::new(node.data.to_string());
        for &child in &node.children {
            tree.push(self.display_tree(child));
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::GroupKey;
    use uuid::Uuid;

    fn key(n: u128) -> GlobalKey {
        GlobalKey::new(Uuid::from_u128(n))
    }

    fn link(n: u128, parent: Option<u128>, title: &str, weight: i64) -> LinkRecord {
        let mut r = LinkRecord::new(key(n), GroupKey::new("main").unwrap())
            .with_attribute("title", title)
            .with_attribute("weight", weight);
        r.parent_ref = parent.map(key);
        r
    }

    #[test]
    fn given_nested_links_when_building_forest_then_counts_shape() {
        let records = vec![
            link(1, None, "Home", 0),
            link(2, Some(1), "About", 1),
            link(3, Some(1), "Team", 0),
            link(4, Some(3), "Jobs", 0),
            link(5, None, "Contact", 5),
        ];

        let forest = Forest::from_records(&records).unwrap();

        assert_eq!(forest.len(), 5);
        assert_eq!(forest.root_count(), 2);
        assert_eq!(forest.edge_count(), 3);
        assert_eq!(forest.depth(), 3);
    }

    #[test]
    fn given_weighted_siblings_when_ordering_then_parents_come_first_by_weight() {
        let records = vec![
            link(4, Some(3), "Jobs", 0),
            link(2, Some(1), "About", 1),
            link(3, Some(1), "Team", 0),
            link(1, None, "Home", 0),
        ];

        let forest = Forest::from_records(&records).unwrap();

        assert_eq!(
            forest.creation_order(),
            vec![key(1), key(3), key(2), key(4)]
        );
    }

    #[test]
    fn given_parent_cycle_when_building_forest_then_detects_cycle() {
        let records = vec![
            link(1, None, "Home", 0),
            link(2, Some(3), "A", 0),
            link(3, Some(2), "B", 0),
        ];

        let result = Forest::from_records(&records);

        assert!(matches!(result, Err(DomainError::CycleDetected(_))));
    }

    #[test]
    fn given_mirrored_shapes_when_comparing_then_isomorphic() {
        let a = Forest::from_records(&[
            link(1, None, "x", 0),
            link(2, Some(1), "y", 0),
            link(3, None, "z", 0),
        ])
        .unwrap();
        let b = Forest::from_records(&[
            link(10, None, "p", 0),
            link(11, None, "q", 0),
            link(12, Some(11), "r", 0),
        ])
        .unwrap();
        let c = Forest::from_records(&[
            link(20, None, "p", 0),
            link(21, Some(20), "q", 0),
            link(22, Some(21), "r", 0),
        ])
        .unwrap();

        assert!(a.is_isomorphic(&b));
        assert_eq!(a.shape_digest(), b.shape_digest());
        assert!(!a.is_isomorphic(&c));
    }

    #[test]
    fn given_very_deep_chain_when_measuring_shape_then_does_not_overflow_stack() {
        let records: Vec<LinkRecord> = (1..=20_000u128)
            .map(|n| link(n, (n > 1).then(|| n - 1), "x", 0))
            .collect();

        let forest = Forest::from_records(&records).unwrap();

        assert_eq!(forest.depth(), 20_000);
        let signature = forest.shape_signature();
        assert_eq!(signature.len(), 40_000);
        assert!(signature.starts_with("(((") && signature.ends_with(")))"));
    }

    #[test]
    fn given_forest_when_rendering_then_shows_titles_in_order() {
        let forest = Forest::from_records(&[
            link(1, None, "Home", 0),
            link(2, Some(1), "Sub", 0),
        ])
        .unwrap();

        let rendered = forest.display_trees()[0].to_string();

        assert!(rendered.starts_with("Home ["));
        assert!(rendered.contains("Sub ["));
    }
}
