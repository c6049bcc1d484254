/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `StateStorePartitions`: id -> `Partition` projection.

use std::collections::HashMap;

use crate::model::partition::{Partition, PartitionTree};

/// The replayed projection backing [`crate::partition_store::PartitionStore`].
#[derive(Debug, Default, Clone)]
pub struct StateStorePartitions {
    partitions: HashMap<String, Partition>,
}

impl StateStorePartitions {
    /// An empty projection (no tree installed yet).
    pub fn new() -> Self {
        StateStorePartitions::default()
    }

    /// True iff no partitions have been installed yet.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Looks up a partition by id.
    pub fn get(&self, id: &str) -> Option<&Partition> {
        self.partitions.get(id)
    }

    /// Mutable lookup, used by `apply` implementations.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Partition> {
        self.partitions.get_mut(id)
    }

    /// Installs a full tree, replacing whatever was present
    /// (`InitialisePartitions`).
    pub fn install(&mut self, partitions: Vec<Partition>) {
        self.partitions = partitions.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    /// Inserts or overwrites a single partition (used by `SplitPartition`).
    pub fn insert(&mut self, partition: Partition) {
        self.partitions.insert(partition.id.clone(), partition);
    }

    /// Removes every partition (`ClearPartitions`).
    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Every partition, leaf or not.
    pub fn all(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    /// Every leaf partition.
    pub fn leaves(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values().filter(|p| p.is_leaf)
    }

    /// Builds a read-only [`PartitionTree`] view over the current
    /// projection.
    pub fn tree(&self) -> PartitionTree<'_> {
        PartitionTree::build(self.partitions.values())
    }
}
