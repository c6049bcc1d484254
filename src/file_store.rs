/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `FileReferenceStore` (spec §4.4, component C6): the public API for
//! file-state mutations. Every mutating call here builds one transaction
//! and runs it through [`TransactionLogHead::add`]; every read calls
//! [`TransactionLogHead::update`] first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::config::StateStoreConfig;
use crate::error::{Result, StateStoreError};
use crate::log::head::TransactionLogHead;
use crate::log::store::TransactionLogStore;
use crate::model::file_reference::{AllReferencesToAFile, FileReference};
use crate::state::files::StateStoreFiles;
use crate::transaction::file_txn::{AssignJobIdRequest, FileTransaction, SplitFileReferenceRequest};

/// Carried by a failed [`FileReferenceStore::split_file_references`]
/// call: which requests (if any) had already committed in prior log
/// entries before the failure, versus which never took effect.
///
/// This implementation commits a whole `split_file_references` call as a
/// single transaction, so `requests_committed` is always empty here — the
/// field exists because the contract (spec §4.4) also covers
/// implementations that commit requests one at a time.
#[derive(Debug)]
pub struct SplitRequestsFailed {
    /// Requests that succeeded in a prior log entry before this call
    /// failed.
    pub requests_committed: Vec<SplitFileReferenceRequest>,
    /// Requests that never took effect.
    pub requests_not_committed: Vec<SplitFileReferenceRequest>,
    /// The underlying validation or store failure.
    pub cause: StateStoreError,
}

impl std::fmt::Display for SplitRequestsFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} split requests failed: {}",
            self.requests_not_committed.len(),
            self.requests_committed.len() + self.requests_not_committed.len(),
            self.cause
        )
    }
}

impl std::error::Error for SplitRequestsFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// A point-in-time listing of files for operator/GC tooling (spec §4.4,
/// `get_all_files_with_max_unreferenced`).
#[derive(Debug, Clone)]
pub struct FilesSnapshot {
    /// Every file with at least one reference.
    pub referenced: Vec<AllReferencesToAFile>,
    /// Up to the requested maximum of unreferenced files.
    pub unreferenced: Vec<AllReferencesToAFile>,
    /// True if more unreferenced files exist than were returned.
    pub more_than_max: bool,
}

/// Public API for file-state mutations (spec §4.4).
pub struct FileReferenceStore {
    head: TransactionLogHead<FileTransaction, StateStoreFiles>,
    config: StateStoreConfig,
}

impl FileReferenceStore {
    /// Opens the file store for `table_id` against `store`.
    pub fn new(
        table_id: impl Into<String>,
        store: Arc<dyn TransactionLogStore<FileTransaction>>,
        clock: Arc<dyn Clock>,
        config: StateStoreConfig,
    ) -> Self {
        FileReferenceStore { head: TransactionLogHead::new(table_id, store, clock, config.clone()), config }
    }

    /// True iff no file has ever been added (used by `PartitionStore` to
    /// guard re-initialisation, spec §4.5).
    pub fn is_empty(&mut self) -> Result<bool> {
        self.head.update()?;
        Ok(self.head.state().is_empty())
    }

    /// Ingests one or more new files. Fails with
    /// [`StateStoreError::FileAlreadyExists`] if any filename is already
    /// present; an empty list is a committed no-op transaction.
    pub fn add_files(&mut self, files: Vec<AllReferencesToAFile>) -> Result<()> {
        log::debug!("add_files: {} file(s)", files.len());
        self.head.add(FileTransaction::AddFiles { files })
    }

    /// Ingests a single new file. Convenience wrapper over
    /// [`Self::add_files`].
    pub fn add_file(&mut self, file: AllReferencesToAFile) -> Result<()> {
        self.add_files(vec![file])
    }

    /// Pushes references down into child partitions, all-or-nothing.
    pub fn split_file_references(&mut self, requests: Vec<SplitFileReferenceRequest>) -> std::result::Result<(), SplitRequestsFailed> {
        log::debug!("split_file_references: {} request(s)", requests.len());
        let txn = FileTransaction::SplitFileReferences { requests: requests.clone() };
        self.head.add(txn).map_err(|cause| SplitRequestsFailed {
            requests_committed: Vec::new(),
            requests_not_committed: requests,
            cause,
        })
    }

    /// Binds references to compaction jobs, all-or-nothing. Typical
    /// failure: [`StateStoreError::FileReferenceAssignedToJob`].
    pub fn assign_job_ids(&mut self, requests: Vec<AssignJobIdRequest>) -> Result<()> {
        log::debug!("assign_job_ids: {} request(s)", requests.len());
        self.head.add(FileTransaction::AssignJobIds { requests })
    }

    /// The compaction commit: atomically swaps `inputs` (which must all
    /// be references in `partition_id` assigned to `job_id`) for
    /// `new_reference`.
    pub fn atomically_replace_file_references_with_new_one(
        &mut self,
        job_id: impl Into<String>,
        partition_id: impl Into<String>,
        inputs: Vec<String>,
        new_reference: FileReference,
    ) -> Result<()> {
        let job_id = job_id.into();
        let partition_id = partition_id.into();
        log::debug!("atomically_replace_file_references_with_new_one: job {job_id} in partition {partition_id}, {} input(s) -> {:?}", inputs.len(), new_reference.filename);
        self.head.add(FileTransaction::ReplaceFileReferences {
            job_id,
            partition_id,
            input_filenames: inputs,
            new_reference,
        })
    }

    /// Erases file entries that now have zero references. Each must
    /// already have a zero reference count; an empty list is a
    /// committed no-op transaction.
    pub fn delete_garbage_collected_file_reference_counts(&mut self, filenames: Vec<String>) -> Result<()> {
        log::debug!("delete_garbage_collected_file_reference_counts: {} filename(s)", filenames.len());
        self.head.add(FileTransaction::DeleteFiles { filenames })
    }

    /// Every internal reference across all files.
    pub fn get_file_references(&mut self) -> Result<Vec<FileReference>> {
        self.head.update()?;
        Ok(self.head.state().all_references().cloned().collect())
    }

    /// The subset of [`Self::get_file_references`] with a null `job_id`.
    pub fn get_file_references_with_no_job_id(&mut self) -> Result<Vec<FileReference>> {
        self.head.update()?;
        Ok(self.head.state().references_with_no_job_id().cloned().collect())
    }

    /// Maps each partition id to the filenames referenced there.
    pub fn get_partition_to_referenced_files_map(&mut self) -> Result<HashMap<String, Vec<String>>> {
        self.head.update()?;
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for r in self.head.state().all_references() {
            map.entry(r.partition_id.clone()).or_default().push(r.filename.clone());
        }
        Ok(map)
    }

    /// Filenames with zero total references whose `last_updated`
    /// precedes `max_update_time`, ready for physical deletion by an
    /// external collaborator.
    pub fn get_ready_for_gc_filenames_before(&mut self, max_update_time: DateTime<Utc>) -> Result<Vec<String>> {
        self.head.update()?;
        Ok(self.head.state().ready_for_gc_before(max_update_time))
    }

    /// A snapshot listing every referenced file plus up to `max_unreferenced`
    /// unreferenced ones.
    pub fn get_all_files_with_max_unreferenced(&mut self, max_unreferenced: usize) -> Result<FilesSnapshot> {
        self.head.update()?;
        let mut referenced = Vec::new();
        let mut unreferenced_all = Vec::new();
        for f in self.head.state().all_files() {
            if f.is_unreferenced() {
                unreferenced_all.push(f.clone());
            } else {
                referenced.push(f.clone());
            }
        }
        let more_than_max = unreferenced_all.len() > max_unreferenced;
        unreferenced_all.truncate(max_unreferenced);
        Ok(FilesSnapshot { referenced, unreferenced: unreferenced_all, more_than_max })
    }

    /// The grace period configured for this store (used by
    /// [`Self::get_ready_for_gc_filenames_before`] callers to compute
    /// `max_update_time` from "now").
    pub fn grace_period_for_gc(&self) -> std::time::Duration {
        self.config.grace_period_for_gc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::log::store::InMemoryLogStore;

    fn new_store() -> (FileReferenceStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = FileReferenceStore::new(
            "table1",
            Arc::new(InMemoryLogStore::new()),
            clock.clone(),
            StateStoreConfig::default(),
        );
        (store, clock)
    }

    #[test]
    fn ingest_then_query() {
        let (mut store, _clock) = new_store();
        store
            .add_files(vec![
                AllReferencesToAFile::new(FileReference::whole_file("f1", "root", 100)),
                AllReferencesToAFile::new(FileReference::whole_file("f2", "root", 100)),
                AllReferencesToAFile::new(FileReference::whole_file("f3", "root", 100)),
            ])
            .unwrap();

        let refs = store.get_file_references().unwrap();
        assert_eq!(refs.len(), 3);
        let gc = store.get_ready_for_gc_filenames_before(DateTime::<Utc>::MAX_UTC).unwrap();
        assert!(gc.is_empty());
    }

    #[test]
    fn compaction_round_trip() {
        let (mut store, clock) = new_store();
        store
            .add_files(vec![
                AllReferencesToAFile::new(FileReference::whole_file("a", "L", 100)),
                AllReferencesToAFile::new(FileReference::whole_file("b", "L", 100)),
            ])
            .unwrap();
        store
            .assign_job_ids(vec![AssignJobIdRequest {
                job_id: "j1".into(),
                partition_id: "L".into(),
                filenames: vec!["a".into(), "b".into()],
            }])
            .unwrap();
        let t_replace = clock.advance(chrono::Duration::seconds(1));
        store
            .atomically_replace_file_references_with_new_one(
                "j1",
                "L",
                vec!["a".into(), "b".into()],
                FileReference::compaction_output("c", "L", 200),
            )
            .unwrap();

        let refs = store.get_file_references().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "c");

        assert!(store.get_ready_for_gc_filenames_before(t_replace).unwrap().is_empty());
        let gc = store.get_ready_for_gc_filenames_before(t_replace + chrono::Duration::nanoseconds(1)).unwrap();
        let mut gc_sorted = gc.clone();
        gc_sorted.sort();
        assert_eq!(gc_sorted, vec!["a".to_string(), "b".to_string()]);

        store.delete_garbage_collected_file_reference_counts(gc).unwrap();
        assert!(store.get_ready_for_gc_filenames_before(DateTime::<Utc>::MAX_UTC).unwrap().is_empty());
    }

    #[test]
    fn concurrent_job_assignment_only_one_wins() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let backend: Arc<InMemoryLogStore<FileTransaction>> = Arc::new(InMemoryLogStore::new());
        let mut store_a = FileReferenceStore::new("table1", backend.clone(), clock.clone(), StateStoreConfig::default());
        let mut store_b = FileReferenceStore::new("table1", backend, clock, StateStoreConfig::default());

        store_a.add_file(AllReferencesToAFile::new(FileReference::whole_file("f", "root", 1))).unwrap();

        let a_result = store_a.assign_job_ids(vec![AssignJobIdRequest {
            job_id: "j1".into(),
            partition_id: "root".into(),
            filenames: vec!["f".into()],
        }]);
        let b_result = store_b.assign_job_ids(vec![AssignJobIdRequest {
            job_id: "j2".into(),
            partition_id: "root".into(),
            filenames: vec!["f".into()],
        }]);

        assert!(a_result.is_ok());
        assert!(matches!(b_result, Err(StateStoreError::FileReferenceAssignedToJob { .. })));
    }

    #[test]
    fn split_rejected_while_assigned_reports_no_partial_commit() {
        let (mut store, _clock) = new_store();
        store.add_file(AllReferencesToAFile::new(FileReference::whole_file("f", "root", 100))).unwrap();
        store
            .assign_job_ids(vec![AssignJobIdRequest { job_id: "j1".into(), partition_id: "root".into(), filenames: vec!["f".into()] }])
            .unwrap();

        let before = store.get_file_references().unwrap().len();
        let err = store
            .split_file_references(vec![SplitFileReferenceRequest {
                filename: "f".into(),
                from_partition_id: "root".into(),
                new_references: vec![
                    FileReference::whole_file("f", "L", 50),
                    FileReference::whole_file("f", "R", 50),
                ],
            }])
            .unwrap_err();
        assert!(matches!(err.cause, StateStoreError::FileReferenceAssignedToJob { .. }));
        assert!(err.requests_committed.is_empty());
        assert_eq!(store.get_file_references().unwrap().len(), before);
    }
}
