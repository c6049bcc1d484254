/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `PartitionStore` (spec §4.5, component C7): the public API for
//! partition-tree mutations.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::StateStoreConfig;
use crate::error::{Result, StateStoreError};
use crate::file_store::FileReferenceStore;
use crate::log::head::TransactionLogHead;
use crate::log::store::TransactionLogStore;
use crate::model::partition::{Partition, PartitionTree};
use crate::state::partitions::StateStorePartitions;
use crate::transaction::partition_txn::PartitionTransaction;

/// Public API for partition-tree mutations (spec §4.5).
pub struct PartitionStore {
    head: TransactionLogHead<PartitionTransaction, StateStorePartitions>,
}

impl PartitionStore {
    /// Opens the partition store for `table_id` against `store`.
    pub fn new(
        table_id: impl Into<String>,
        store: Arc<dyn TransactionLogStore<PartitionTransaction>>,
        clock: Arc<dyn Clock>,
        config: StateStoreConfig,
    ) -> Self {
        PartitionStore { head: TransactionLogHead::new(table_id, store, clock, config) }
    }

    /// Installs the initial tree. Rejected if `file_store` is not empty
    /// (spec §4.5: "preventing loss of references whose partition
    /// disappears").
    pub fn initialise(&mut self, partitions: Vec<Partition>, file_store: &mut FileReferenceStore) -> Result<()> {
        if !file_store.is_empty()? {
            return Err(StateStoreError::FileStoreNotEmpty);
        }
        log::debug!("initialise: installing {} partition(s)", partitions.len());
        self.head.add(PartitionTransaction::InitialisePartitions { partitions })
    }

    /// Replaces a leaf partition with two children in one atomic
    /// transaction (spec §4.3: `SplitPartition`).
    pub fn atomically_update_partition_and_create_new_ones(
        &mut self,
        split_partition: Partition,
        left: Partition,
        right: Partition,
    ) -> Result<()> {
        log::debug!(
            "atomically_update_partition_and_create_new_ones: splitting {:?} into {:?}/{:?}",
            split_partition.id, left.id, right.id,
        );
        self.head.add(PartitionTransaction::SplitPartition {
            split_partition,
            new_child_1: left,
            new_child_2: right,
        })
    }

    /// Every partition, leaf or not.
    pub fn get_all_partitions(&mut self) -> Result<Vec<Partition>> {
        self.head.update()?;
        Ok(self.head.state().all().cloned().collect())
    }

    /// Every leaf partition.
    pub fn get_leaf_partitions(&mut self) -> Result<Vec<Partition>> {
        self.head.update()?;
        Ok(self.head.state().leaves().cloned().collect())
    }

    /// A lookup by id against the current projection.
    pub fn get_partition(&mut self, id: &str) -> Result<Option<Partition>> {
        self.head.update()?;
        Ok(self.head.state().get(id).cloned())
    }

    /// Runs `f` with a read-only [`PartitionTree`] view over the current
    /// projection, refreshed first.
    pub fn with_tree<R>(&mut self, f: impl FnOnce(&PartitionTree<'_>) -> R) -> Result<R> {
        self.head.update()?;
        Ok(f(&self.head.state().tree()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::file_store::FileReferenceStore;
    use crate::log::store::InMemoryLogStore;
    use crate::model::file_reference::{AllReferencesToAFile, FileReference};
    use crate::model::partition::Range;
    use crate::transaction::FileTransaction;

    fn new_stores() -> (PartitionStore, FileReferenceStore) {
        let clock = Arc::new(SystemClock);
        let partitions = PartitionStore::new(
            "t1",
            Arc::new(InMemoryLogStore::<PartitionTransaction>::new()),
            clock.clone(),
            StateStoreConfig::default(),
        );
        let files = FileReferenceStore::new(
            "t1",
            Arc::new(InMemoryLogStore::<FileTransaction>::new()),
            clock,
            StateStoreConfig::default(),
        );
        (partitions, files)
    }

    #[test]
    fn initialise_then_split() {
        let (mut partitions, mut files) = new_stores();
        partitions.initialise(vec![Partition::root("root", 1)], &mut files).unwrap();

        let mut split_partition = Partition::root("root", 1);
        split_partition.is_leaf = false;
        split_partition.split_dimension = 0;
        split_partition.child_ids = vec!["L".into(), "R".into()];
        let left = Partition::leaf_child("L", "root", vec![Range { min: "".into(), max: Some("5".into()) }]);
        let right = Partition::leaf_child("R", "root", vec![Range { min: "5".into(), max: None }]);

        partitions.atomically_update_partition_and_create_new_ones(split_partition, left, right).unwrap();
        assert_eq!(partitions.get_leaf_partitions().unwrap().len(), 2);
    }

    #[test]
    fn initialise_rejected_when_files_present() {
        let (mut partitions, mut files) = new_stores();
        partitions.initialise(vec![Partition::root("root", 1)], &mut files).unwrap();
        files.add_file(AllReferencesToAFile::new(FileReference::whole_file("f", "root", 1))).unwrap();

        let mut second = PartitionStore::new(
            "t1",
            Arc::new(InMemoryLogStore::<PartitionTransaction>::new()),
            Arc::new(SystemClock),
            StateStoreConfig::default(),
        );
        let err = second.initialise(vec![Partition::root("root", 1)], &mut files).unwrap_err();
        assert!(matches!(err, StateStoreError::FileStoreNotEmpty));
    }
}
