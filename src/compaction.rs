/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `CompactionJobFactory` + `FindCompactableSets` (spec §4.7, component
//! C9).
//!
//! The factory only *decides* what should be compacted; it writes no
//! state. The three-step dispatch described in spec §4.7 (assign job ids,
//! read and merge the files, replace the references) is an external
//! worker's job and stays out of this crate, the same way pippin's
//! `merge` module resolves conflicts without itself touching the commit
//! log.

use crate::config::StateStoreConfig;
use crate::error::Result;
use crate::file_store::FileReferenceStore;
use crate::model::file_reference::FileReference;
use crate::partition_store::PartitionStore;

/// A proposed compaction: read `input_filenames` from `partition_id`,
/// merge them, and write the result as `output_filename`.
///
/// Carries no reservation by itself — the dispatching worker still has to
/// call [`FileReferenceStore::assign_job_ids`] to make the reservation
/// real (spec §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionJob {
    /// Fresh, caller-chosen job identifier.
    pub id: String,
    /// The leaf partition this job operates on.
    pub partition_id: String,
    /// Filenames to read and merge.
    pub input_filenames: Vec<String>,
    /// The filename the merged output will be written as. Must be fresh
    /// (spec §3 invariant 6: "no reference may exist for a filename that
    /// appears as a new output").
    pub output_filename: String,
}

/// Generates fresh job ids and output filenames for proposed jobs.
///
/// Kept as a trait, not baked into `WholePartitionCompactionJobFactory`,
/// so tests can supply deterministic ids (see the `tests` module below)
/// the way pippin's `MakeMeta` trait lets tests supply a deterministic
/// timestamp instead of reading the system clock.
pub trait IdGenerator: Send + Sync {
    /// A fresh job id.
    fn job_id(&self) -> String;
    /// A fresh output filename for a job on `partition_id`.
    fn output_filename(&self, partition_id: &str) -> String;
}

/// Generates ids from a cryptographic RNG; the default for production use.
#[derive(Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn job_id(&self) -> String {
        format!("job-{}", random_hex(16))
    }

    fn output_filename(&self, partition_id: &str) -> String {
        format!("{partition_id}/compacted-{}.parquet", random_hex(16))
    }
}

fn random_hex(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect()
}

/// Selects eligible files per leaf partition and proposes
/// [`CompactionJob`]s (spec §4.7).
pub trait CompactionJobFactory {
    /// Reads the current unassigned references and leaf partitions and
    /// proposes zero or more jobs. Writes nothing.
    fn create_jobs(&self, files: &mut FileReferenceStore, partitions: &mut PartitionStore) -> Result<Vec<CompactionJob>>;
}

/// The minimum-viable strategy of spec §4.7: compact every unassigned
/// reference in a leaf partition once their count or combined record
/// count crosses a threshold.
pub struct WholePartitionCompactionJobFactory<I: IdGenerator = RandomIdGenerator> {
    min_files: usize,
    min_records: u64,
    ids: I,
}

impl WholePartitionCompactionJobFactory<RandomIdGenerator> {
    /// Builds the factory from a [`StateStoreConfig`], using
    /// [`RandomIdGenerator`] for ids.
    pub fn from_config(config: &StateStoreConfig) -> Self {
        WholePartitionCompactionJobFactory {
            min_files: config.compaction_min_files,
            min_records: config.compaction_min_bytes,
            ids: RandomIdGenerator,
        }
    }
}

impl<I: IdGenerator> WholePartitionCompactionJobFactory<I> {
    /// Builds the factory with an explicit [`IdGenerator`] (for
    /// deterministic tests).
    pub fn with_id_generator(config: &StateStoreConfig, ids: I) -> Self {
        WholePartitionCompactionJobFactory { min_files: config.compaction_min_files, min_records: config.compaction_min_bytes, ids }
    }
}

impl<I: IdGenerator> CompactionJobFactory for WholePartitionCompactionJobFactory<I> {
    fn create_jobs(&self, files: &mut FileReferenceStore, partitions: &mut PartitionStore) -> Result<Vec<CompactionJob>> {
        let unassigned = files.get_file_references_with_no_job_id()?;
        let leaves = partitions.get_leaf_partitions()?;

        let mut jobs = Vec::new();
        for leaf in &leaves {
            let candidates: Vec<&FileReference> = unassigned.iter().filter(|r| r.partition_id == leaf.id).collect();
            if candidates.is_empty() {
                continue;
            }
            let total_records: u64 = candidates.iter().map(|r| r.number_of_records).sum();
            if candidates.len() < self.min_files && total_records < self.min_records {
                continue;
            }
            let job = CompactionJob {
                id: self.ids.job_id(),
                partition_id: leaf.id.clone(),
                input_filenames: candidates.iter().map(|r| r.filename.clone()).collect(),
                output_filename: self.ids.output_filename(&leaf.id),
            };
            log::debug!("create_jobs: proposing job {:?} in partition {:?} over {} file(s)", job.id, job.partition_id, job.input_filenames.len());
            jobs.push(job);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::log::store::InMemoryLogStore;
    use crate::model::file_reference::AllReferencesToAFile;
    use crate::model::partition::Partition;
    use crate::transaction::file_txn::FileTransaction;
    use crate::transaction::partition_txn::PartitionTransaction;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct SequentialIds(AtomicU64);

    impl IdGenerator for SequentialIds {
        fn job_id(&self) -> String {
            format!("job-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
        fn output_filename(&self, partition_id: &str) -> String {
            format!("{partition_id}/out-{}.parquet", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn new_stores() -> (FileReferenceStore, PartitionStore) {
        let clock = Arc::new(SystemClock);
        let files = FileReferenceStore::new(
            "t1",
            Arc::new(InMemoryLogStore::<FileTransaction>::new()),
            clock.clone(),
            StateStoreConfig::default(),
        );
        let partitions = PartitionStore::new(
            "t1",
            Arc::new(InMemoryLogStore::<PartitionTransaction>::new()),
            clock,
            StateStoreConfig::default(),
        );
        (files, partitions)
    }

    #[test]
    fn proposes_a_job_once_threshold_crossed() {
        let (mut files, mut partitions) = new_stores();
        partitions.initialise(vec![Partition::root("root", 1)], &mut files).unwrap();
        for i in 0..4 {
            files
                .add_file(AllReferencesToAFile::new(crate::model::file_reference::FileReference::whole_file(
                    format!("f{i}"),
                    "root",
                    10,
                )))
                .unwrap();
        }

        let config = StateStoreConfig { compaction_min_files: 4, compaction_min_bytes: u64::MAX, ..StateStoreConfig::default() };
        let factory = WholePartitionCompactionJobFactory::with_id_generator(&config, SequentialIds(AtomicU64::new(0)));
        let jobs = factory.create_jobs(&mut files, &mut partitions).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input_filenames.len(), 4);
        assert_eq!(jobs[0].partition_id, "root");
    }

    #[test]
    fn below_threshold_proposes_nothing() {
        let (mut files, mut partitions) = new_stores();
        partitions.initialise(vec![Partition::root("root", 1)], &mut files).unwrap();
        files
            .add_file(AllReferencesToAFile::new(crate::model::file_reference::FileReference::whole_file("f0", "root", 10)))
            .unwrap();

        let config = StateStoreConfig { compaction_min_files: 4, compaction_min_bytes: u64::MAX, ..StateStoreConfig::default() };
        let factory = WholePartitionCompactionJobFactory::with_id_generator(&config, SequentialIds(AtomicU64::new(0)));
        let jobs = factory.create_jobs(&mut files, &mut partitions).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn assigned_references_are_not_proposed_again() {
        let (mut files, mut partitions) = new_stores();
        partitions.initialise(vec![Partition::root("root", 1)], &mut files).unwrap();
        for i in 0..4 {
            files
                .add_file(AllReferencesToAFile::new(crate::model::file_reference::FileReference::whole_file(
                    format!("f{i}"),
                    "root",
                    10,
                )))
                .unwrap();
        }
        files
            .assign_job_ids(vec![crate::transaction::file_txn::AssignJobIdRequest {
                job_id: "existing".into(),
                partition_id: "root".into(),
                filenames: vec!["f0".into(), "f1".into(), "f2".into(), "f3".into()],
            }])
            .unwrap();

        let config = StateStoreConfig { compaction_min_files: 1, compaction_min_bytes: 0, ..StateStoreConfig::default() };
        let factory = WholePartitionCompactionJobFactory::with_id_generator(&config, SequentialIds(AtomicU64::new(0)));
        let jobs = factory.create_jobs(&mut files, &mut partitions).unwrap();
        assert!(jobs.is_empty());
    }
}
