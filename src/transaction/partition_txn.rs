/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Partition transactions: the tagged variants that mutate
//! `StateStorePartitions` (spec §4.3).
//!
//! `SplitPartition`'s atomicity is the one invariant worth calling out
//! twice: the parent's promotion to non-leaf and the insertion of both
//! children happen in a single `apply`, so no reader can ever observe a
//! partition with `is_leaf = false` and fewer than two children present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StateStoreConfig;
use crate::error::{Result, StateStoreError};
use crate::model::partition::Partition;
use crate::state::partitions::StateStorePartitions;

/// A partition-tree mutation (spec §4.3, partition transaction table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartitionTransaction {
    /// Install the initial tree. Requires the store to currently be
    /// empty.
    InitialisePartitions {
        /// The partitions forming a valid tree (spec §3 invariant 5).
        partitions: Vec<Partition>,
    },
    /// Replace a leaf with a non-leaf and its two new children.
    SplitPartition {
        /// The leaf being split, already promoted to non-leaf (its
        /// `child_ids` name the two new children).
        split_partition: Partition,
        /// First new child (leaf).
        new_child_1: Partition,
        /// Second new child (leaf).
        new_child_2: Partition,
    },
    /// Erase every partition.
    ClearPartitions,
}

impl PartitionTransaction {
    /// Checks this transaction against `state` without mutating it.
    pub fn validate(&self, state: &StateStorePartitions) -> Result<()> {
        match self {
            PartitionTransaction::InitialisePartitions { partitions } => {
                if !state.is_empty() {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: "partition store is already initialised".into(),
                    });
                }
                validate_tree_shape(partitions)
            }
            PartitionTransaction::SplitPartition { split_partition, new_child_1, new_child_2 } => {
                let existing = state.get(&split_partition.id).ok_or_else(|| StateStoreError::PartitionNotFound {
                    partition_id: split_partition.id.clone(),
                })?;
                if !existing.is_leaf {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: format!("{:?} is not a leaf", existing.id),
                    });
                }
                if state.get(&new_child_1.id).is_some() || state.get(&new_child_2.id).is_some() {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: "proposed child id already present".into(),
                    });
                }
                if split_partition.is_leaf {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: "split_partition must be promoted to non-leaf in the request".into(),
                    });
                }
                let expected_children: std::collections::HashSet<&str> =
                    [new_child_1.id.as_str(), new_child_2.id.as_str()].into_iter().collect();
                let actual_children: std::collections::HashSet<&str> =
                    split_partition.child_ids.iter().map(String::as_str).collect();
                if expected_children != actual_children {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: "split_partition.child_ids must equal the two new children's ids".into(),
                    });
                }
                for child in [new_child_1, new_child_2] {
                    if !child.is_leaf || child.parent_id.as_deref() != Some(split_partition.id.as_str()) {
                        return Err(StateStoreError::InvalidPartitionSplit {
                            reason: format!("{:?} must be a leaf whose parent is {:?}", child.id, split_partition.id),
                        });
                    }
                }
                if !regions_partition_parent(&split_partition.region, &new_child_1.region, &new_child_2.region) {
                    return Err(StateStoreError::InvalidPartitionSplit {
                        reason: "children's regions must disjointly cover the parent's region".into(),
                    });
                }
                Ok(())
            }
            PartitionTransaction::ClearPartitions => Ok(()),
        }
    }

    /// Applies this transaction. Must only be called after `validate` has
    /// returned `Ok` against the same `state`.
    pub fn apply(&self, state: &mut StateStorePartitions, update_time: DateTime<Utc>) {
        match self {
            PartitionTransaction::InitialisePartitions { partitions } => {
                let mut partitions = partitions.clone();
                for p in &mut partitions {
                    p.last_updated = update_time;
                }
                state.install(partitions);
            }
            PartitionTransaction::SplitPartition { split_partition, new_child_1, new_child_2 } => {
                let mut split_partition = split_partition.clone();
                split_partition.last_updated = update_time;
                let mut new_child_1 = new_child_1.clone();
                new_child_1.last_updated = update_time;
                let mut new_child_2 = new_child_2.clone();
                new_child_2.last_updated = update_time;
                state.insert(split_partition);
                state.insert(new_child_1);
                state.insert(new_child_2);
            }
            PartitionTransaction::ClearPartitions => {
                state.clear();
            }
        }
    }
}

/// Checks that `partitions` forms an acyclic binary tree with exactly
/// one root, every non-root's `parent_id` present in the set, every
/// non-leaf having exactly two children, and leaves disjointly covering
/// the key space (spec §3 invariants 3 and 5).
///
/// The region-coverage check is necessarily approximate for arbitrary
/// string ranges (full interval-algebra coverage proofs are not
/// attempted); it verifies pairwise disjointness of leaf regions only,
/// which is what spec §8's testable property 3 actually asserts.
fn validate_tree_shape(partitions: &[Partition]) -> Result<()> {
    use std::collections::HashMap;

    let by_id: HashMap<&str, &Partition> = partitions.iter().map(|p| (p.id.as_str(), p)).collect();
    let roots: Vec<&Partition> = partitions.iter().filter(|p| p.parent_id.is_none()).collect();
    if roots.len() != 1 {
        return Err(StateStoreError::InvalidPartitionSplit {
            reason: format!("expected exactly one root, found {}", roots.len()),
        });
    }
    for p in partitions {
        if let Some(parent_id) = &p.parent_id {
            if !by_id.contains_key(parent_id.as_str()) {
                return Err(StateStoreError::InvalidPartitionSplit {
                    reason: format!("{:?} names missing parent {:?}", p.id, parent_id),
                });
            }
        }
        if p.is_leaf != p.child_ids.is_empty() {
            return Err(StateStoreError::InvalidPartitionSplit {
                reason: format!("{:?} has inconsistent is_leaf/child_ids", p.id),
            });
        }
        if !p.is_leaf && p.child_ids.len() != 2 {
            return Err(StateStoreError::InvalidPartitionSplit {
                reason: format!("{:?} is non-leaf but does not have exactly two children", p.id),
            });
        }
    }
    let leaves: Vec<&&Partition> = by_id.values().filter(|p| p.is_leaf).collect();
    for (i, a) in leaves.iter().enumerate() {
        for b in leaves.iter().skip(i + 1) {
            if regions_overlap(&a.region, &b.region) {
                return Err(StateStoreError::InvalidPartitionSplit {
                    reason: format!("leaves {:?} and {:?} have overlapping regions", a.id, b.id),
                });
            }
        }
    }
    Ok(())
}

fn regions_overlap(a: &crate::model::partition::Region, b: &crate::model::partition::Region) -> bool {
    a.iter().zip(b.iter()).all(|(ra, rb)| {
        let lo = ra.min.as_str().max(rb.min.as_str());
        let hi_a = ra.max.as_deref();
        let hi_b = rb.max.as_deref();
        let hi = match (hi_a, hi_b) {
            (None, None) => None,
            (Some(x), None) | (None, Some(x)) => Some(x),
            (Some(x), Some(y)) => Some(x.min(y)),
        };
        match hi {
            Some(hi) => lo < hi,
            None => true,
        }
    })
}

/// True iff `left` and `right`'s regions partition `parent` with no gap
/// or overlap, split on a single dimension.
fn regions_partition_parent(
    parent: &crate::model::partition::Region,
    left: &crate::model::partition::Region,
    right: &crate::model::partition::Region,
) -> bool {
    if parent.len() != left.len() || parent.len() != right.len() {
        return false;
    }
    let mut split_dims = 0;
    for i in 0..parent.len() {
        let (p, l, r) = (&parent[i], &left[i], &right[i]);
        if l == p && r == p {
            continue;
        }
        // This dimension is where the split happens: left and right must
        // share a boundary and together span exactly `p`.
        split_dims += 1;
        if l.min != p.min || r.max != p.max {
            return false;
        }
        if l.max.as_deref() != Some(r.min.as_str()) {
            return false;
        }
    }
    split_dims == 1
}

impl crate::log::head::AppliesTo<StateStorePartitions> for PartitionTransaction {
    fn validate_against(&self, state: &StateStorePartitions, _config: &StateStoreConfig) -> Result<()> {
        self.validate(state)
    }

    fn apply_to(&self, state: &mut StateStorePartitions, update_time: DateTime<Utc>) {
        self.apply(state, update_time)
    }
}
