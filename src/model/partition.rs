/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `Partition` and `PartitionTree` (spec §3).
//!
//! Partitions are linked by id, never by object reference (design note
//! §9: "use string ids and lookup maps; never follow object references
//! across the tree") — exactly how pippin links commits by `Sum` rather
//! than by `Rc<Commit>`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive-min, exclusive-max range over one row-key field.
///
/// `max: None` means unbounded (the region extends to the end of the key
/// space on this dimension).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Inclusive lower bound.
    pub min: String,
    /// Exclusive upper bound; `None` means unbounded.
    pub max: Option<String>,
}

impl Range {
    /// An unbounded range (the whole key space on this dimension).
    pub fn unbounded() -> Self {
        Range { min: String::new(), max: None }
    }

    /// True iff `key` falls within `[min, max)`.
    pub fn contains(&self, key: &str) -> bool {
        key >= self.min.as_str() && self.max.as_deref().map_or(true, |max| key < max)
    }
}

/// A partition's region: one `Range` per row-key field. The union of all
/// leaf regions equals the key space and leaf regions are pairwise
/// disjoint (invariant 3 and 5, spec §3).
pub type Region = Vec<Range>;

/// A node in the binary tree over the row-key space.
///
/// Wire shape (spec §6): `partitionId`, `isLeaf`, `parentPartitionId`
/// (nullable), `childPartitionIds`, `region`, `dimension`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Stable identifier, unique within the table.
    #[serde(rename = "partitionId")]
    pub id: String,
    /// This partition's region, one `Range` per row-key field.
    pub region: Region,
    /// Absent iff this is the root.
    #[serde(rename = "parentPartitionId")]
    pub parent_id: Option<String>,
    /// Empty iff this is a leaf; otherwise exactly two ids.
    #[serde(rename = "childPartitionIds")]
    pub child_ids: Vec<String>,
    /// True iff `child_ids` is empty.
    pub is_leaf: bool,
    /// Index into `region` of the field used to split this partition;
    /// `-1` for leaves.
    #[serde(rename = "dimension")]
    pub split_dimension: i32,
    /// Stamped by the log head during replay (see `transaction::codec`).
    /// Excluded from the serialized transaction body (spec §6); see
    /// `FileReference::last_updated`.
    #[serde(skip, default = "crate::model::epoch")]
    pub last_updated: DateTime<Utc>,
}

impl Partition {
    /// Builds the lone root partition covering the whole key space,
    /// spanning `dimensions` row-key fields.
    pub fn root(id: impl Into<String>, dimensions: usize) -> Self {
        Partition {
            id: id.into(),
            region: (0..dimensions.max(1)).map(|_| Range::unbounded()).collect(),
            parent_id: None,
            child_ids: Vec::new(),
            is_leaf: true,
            split_dimension: -1,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Builds a leaf child of `parent_id` with the given `region`.
    pub fn leaf_child(id: impl Into<String>, parent_id: impl Into<String>, region: Region) -> Self {
        Partition {
            id: id.into(),
            region,
            parent_id: Some(parent_id.into()),
            child_ids: Vec::new(),
            is_leaf: true,
            split_dimension: -1,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// True iff `key` falls within every dimension of this partition's
    /// region.
    pub fn contains_key(&self, key: &[impl AsRef<str>]) -> bool {
        self.region.iter().zip(key.iter()).all(|(range, k)| range.contains(k.as_ref()))
    }
}

/// Views a flat set of [`Partition`]s as a tree.
///
/// This is a read-only convenience index over whatever collection handed
/// it partitions (typically [`crate::state::partitions::StateStorePartitions`]);
/// it never mutates the partitions it was built from.
#[derive(Debug, Default)]
pub struct PartitionTree<'a> {
    by_id: HashMap<&'a str, &'a Partition>,
    root_id: Option<&'a str>,
}

impl<'a> PartitionTree<'a> {
    /// Indexes `partitions` by id, locating the (unique) root.
    pub fn build(partitions: impl IntoIterator<Item = &'a Partition>) -> Self {
        let mut by_id = HashMap::new();
        let mut root_id = None;
        for p in partitions {
            if p.parent_id.is_none() {
                root_id = Some(p.id.as_str());
            }
            by_id.insert(p.id.as_str(), p);
        }
        PartitionTree { by_id, root_id }
    }

    /// Looks up a partition by id.
    pub fn get(&self, id: &str) -> Option<&'a Partition> {
        self.by_id.get(id).copied()
    }

    /// Descends from the root through the unique child whose region
    /// contains `key`, returning the leaf reached.
    pub fn leaf_for_key(&self, key: &[impl AsRef<str>]) -> Option<&'a Partition> {
        let mut current = self.root_id.and_then(|id| self.get(id))?;
        loop {
            if current.is_leaf {
                return Some(current);
            }
            let next = current
                .child_ids
                .iter()
                .filter_map(|id| self.get(id))
                .find(|child| child.contains_key(key));
            current = next?;
        }
    }

    /// All leaf partitions in the tree.
    pub fn leaves(&self) -> impl Iterator<Item = &'a Partition> + '_ {
        self.by_id.values().copied().filter(|p| p.is_leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_respects_bounds() {
        let r = Range { min: "a".into(), max: Some("m".into()) };
        assert!(r.contains("a"));
        assert!(r.contains("f"));
        assert!(!r.contains("m"));
        assert!(!r.contains("0"));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let r = Range::unbounded();
        assert!(r.contains("anything"));
    }

    #[test]
    fn tree_descends_to_correct_leaf() {
        let root = Partition {
            id: "root".into(),
            region: vec![Range::unbounded()],
            parent_id: None,
            child_ids: vec!["L".into(), "R".into()],
            is_leaf: false,
            split_dimension: 0,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        };
        let left = Partition::leaf_child("L", "root", vec![Range { min: "".into(), max: Some("5".into()) }]);
        let right = Partition::leaf_child("R", "root", vec![Range { min: "5".into(), max: None }]);
        let all = vec![root, left, right];
        let tree = PartitionTree::build(&all);
        assert_eq!(tree.leaf_for_key(&["3"]).unwrap().id, "L");
        assert_eq!(tree.leaf_for_key(&["7"]).unwrap().id, "R");
        assert_eq!(tree.leaves().count(), 2);
    }
}
