/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! File transactions: the tagged variants that mutate `StateStoreFiles`
//! (spec §4.3).
//!
//! Each variant implements `validate` (pure, never mutates) and `apply`
//! (deterministic and total once `validate` has returned `Ok`). Pippin's
//! `commit.rs` plays an analogous role for `EltChange`, except there a
//! single commit bundles many changes against a merge-aware state; here
//! validation is against the *current* head and apply is a plain
//! dictionary edit, since there is no concurrent-branch merge story in
//! this store — optimistic retry (§5) takes its place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StateStoreConfig;
use crate::error::{Result, StateStoreError};
use crate::model::file_reference::{AllReferencesToAFile, FileReference};
use crate::state::files::StateStoreFiles;

/// One `assign_job_ids` request: bind `filenames` in `partition_id` to
/// `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignJobIdRequest {
    /// The job to assign.
    pub job_id: String,
    /// The partition the filenames must currently reference.
    pub partition_id: String,
    /// Filenames to assign.
    pub filenames: Vec<String>,
}

/// One `split_file_references` request: replace the reference to
/// `filename` at `from_partition_id` with `new_references`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitFileReferenceRequest {
    /// The file being split.
    pub filename: String,
    /// The partition whose reference is being removed.
    pub from_partition_id: String,
    /// The references taking its place (typically one per child
    /// partition).
    pub new_references: Vec<FileReference>,
}

/// A file-state mutation (spec §4.3, file transaction table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FileTransaction {
    /// Ingest one or more new files.
    AddFiles {
        /// The files to add; each becomes a new `AllReferencesToAFile`
        /// entry.
        files: Vec<AllReferencesToAFile>,
    },
    /// Bind references to a compaction job.
    AssignJobIds {
        /// One request per job assignment; processed all-or-nothing.
        requests: Vec<AssignJobIdRequest>,
    },
    /// Push references down into child partitions.
    SplitFileReferences {
        /// One request per reference being split; processed
        /// all-or-nothing.
        requests: Vec<SplitFileReferenceRequest>,
    },
    /// The compaction commit: atomically swap input references for one
    /// output reference.
    ReplaceFileReferences {
        /// The job that produced the output.
        job_id: String,
        /// The partition the inputs and output live in.
        partition_id: String,
        /// Filenames being replaced.
        input_filenames: Vec<String>,
        /// The new reference taking their place.
        new_reference: FileReference,
    },
    /// Erase file entries that have zero references (post-GC).
    DeleteFiles {
        /// Filenames to erase.
        filenames: Vec<String>,
    },
    /// Erase every file entry.
    ClearFiles,
}

impl FileTransaction {
    /// Checks this transaction against `state` without mutating it.
    /// Returns the specific named failure (spec §4.4) if any condition
    /// does not hold.
    ///
    /// `config.max_references_per_file`, when set, bounds the number of
    /// live references a single file may have across all partitions
    /// (spec §6); `AddFiles` and `SplitFileReferences` are the two
    /// variants that can grow that count.
    pub fn validate(&self, state: &StateStoreFiles, config: &StateStoreConfig) -> Result<()> {
        match self {
            FileTransaction::AddFiles { files } => {
                for file in files {
                    if state.get(&file.filename).is_some() {
                        return Err(StateStoreError::FileAlreadyExists { filename: file.filename.clone() });
                    }
                    check_reference_count(&file.filename, file.internal_references.len(), config)?;
                }
                Ok(())
            }
            FileTransaction::AssignJobIds { requests } => {
                for req in requests {
                    for filename in &req.filenames {
                        let reference = state
                            .reference(filename, &req.partition_id)
                            .ok_or_else(|| StateStoreError::FileReferenceNotFound {
                                filename: filename.clone(),
                                partition_id: req.partition_id.clone(),
                            })?;
                        if let Some(existing_job) = &reference.job_id {
                            return Err(StateStoreError::FileReferenceAssignedToJob {
                                filename: filename.clone(),
                                partition_id: req.partition_id.clone(),
                                job_id: existing_job.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }
            FileTransaction::SplitFileReferences { requests } => {
                for req in requests {
                    let reference = state
                        .reference(&req.filename, &req.from_partition_id)
                        .ok_or_else(|| StateStoreError::FileReferenceNotFound {
                            filename: req.filename.clone(),
                            partition_id: req.from_partition_id.clone(),
                        })?;
                    if let Some(job_id) = &reference.job_id {
                        return Err(StateStoreError::FileReferenceAssignedToJob {
                            filename: req.filename.clone(),
                            partition_id: req.from_partition_id.clone(),
                            job_id: job_id.clone(),
                        });
                    }
                    for new_ref in &req.new_references {
                        if state.reference(&req.filename, &new_ref.partition_id).is_some() {
                            return Err(StateStoreError::FileReferenceAlreadyExists {
                                filename: req.filename.clone(),
                                partition_id: new_ref.partition_id.clone(),
                            });
                        }
                    }
                    let existing_count = state.get(&req.filename).map_or(0, |f| f.internal_references.len());
                    let resulting_count = existing_count - 1 + req.new_references.len();
                    check_reference_count(&req.filename, resulting_count, config)?;
                }
                Ok(())
            }
            FileTransaction::ReplaceFileReferences { job_id, partition_id, input_filenames, new_reference } => {
                for filename in input_filenames {
                    let reference = state
                        .reference(filename, partition_id)
                        .ok_or_else(|| StateStoreError::FileReferenceNotFound {
                            filename: filename.clone(),
                            partition_id: partition_id.clone(),
                        })?;
                    match &reference.job_id {
                        Some(assigned) if assigned == job_id => {}
                        _ => {
                            return Err(StateStoreError::FileReferenceNotAssignedToJob {
                                filename: filename.clone(),
                                partition_id: partition_id.clone(),
                            });
                        }
                    }
                    if filename == &new_reference.filename {
                        return Err(StateStoreError::NewReferenceSameAsOldReference(new_reference.clone()));
                    }
                }
                if state.get(&new_reference.filename).is_some() {
                    return Err(StateStoreError::FileAlreadyExists { filename: new_reference.filename.clone() });
                }
                Ok(())
            }
            FileTransaction::DeleteFiles { filenames } => {
                for filename in filenames {
                    let file = state
                        .get(filename)
                        .ok_or_else(|| StateStoreError::FileNotFound { filename: filename.clone() })?;
                    if !file.is_unreferenced() {
                        return Err(StateStoreError::FileHasReferences {
                            filename: filename.clone(),
                            reference_count: file.total_reference_count() as usize,
                        });
                    }
                }
                Ok(())
            }
            FileTransaction::ClearFiles => Ok(()),
        }
    }

    /// Applies this transaction, stamping every reference/file it
    /// touches with `update_time`. Must only be called after `validate`
    /// has returned `Ok` against the same `state`.
    pub fn apply(&self, state: &mut StateStoreFiles, update_time: DateTime<Utc>) {
        match self {
            FileTransaction::AddFiles { files } => {
                for file in files {
                    let mut file = file.clone();
                    for r in &mut file.internal_references {
                        r.last_updated = update_time;
                    }
                    file.last_updated = update_time;
                    state.insert(file);
                }
            }
            FileTransaction::AssignJobIds { requests } => {
                for req in requests {
                    for filename in &req.filenames {
                        if let Some(file) = state.get_mut(filename) {
                            if let Some(r) = file.internal_references.iter_mut().find(|r| r.partition_id == req.partition_id) {
                                r.job_id = Some(req.job_id.clone());
                                r.last_updated = update_time;
                            }
                            file.last_updated = update_time;
                        }
                    }
                }
            }
            FileTransaction::SplitFileReferences { requests } => {
                for req in requests {
                    if let Some(file) = state.get_mut(&req.filename) {
                        file.internal_references.retain(|r| r.partition_id != req.from_partition_id);
                        for new_ref in &req.new_references {
                            let mut new_ref = new_ref.clone();
                            new_ref.last_updated = update_time;
                            file.internal_references.push(new_ref);
                        }
                        file.last_updated = update_time;
                    }
                }
            }
            FileTransaction::ReplaceFileReferences { partition_id, input_filenames, new_reference, .. } => {
                for filename in input_filenames {
                    if let Some(file) = state.get_mut(filename) {
                        file.internal_references.retain(|r| r.partition_id != *partition_id);
                        file.last_updated = update_time;
                    }
                }
                let mut new_reference = new_reference.clone();
                new_reference.last_updated = update_time;
                let new_file = AllReferencesToAFile::new(new_reference);
                state.insert(new_file);
            }
            FileTransaction::DeleteFiles { filenames } => {
                for filename in filenames {
                    state.remove(filename);
                }
            }
            FileTransaction::ClearFiles => {
                state.clear();
            }
        }
    }
}

/// Enforces `config.max_references_per_file` (spec §6), when set, against
/// the reference count an operation would produce for `filename`.
fn check_reference_count(filename: &str, resulting_count: usize, config: &StateStoreConfig) -> Result<()> {
    if let Some(max) = config.max_references_per_file {
        if resulting_count > max {
            return Err(StateStoreError::TooManyReferencesForFile {
                filename: filename.to_string(),
                reference_count: resulting_count,
                max,
            });
        }
    }
    Ok(())
}

impl crate::log::head::AppliesTo<StateStoreFiles> for FileTransaction {
    fn validate_against(&self, state: &StateStoreFiles, config: &StateStoreConfig) -> Result<()> {
        self.validate(state, config)
    }

    fn apply_to(&self, state: &mut StateStoreFiles, update_time: DateTime<Utc>) {
        self.apply(state, update_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, partition: &str, records: u64) -> AllReferencesToAFile {
        AllReferencesToAFile::new(FileReference::whole_file(name, partition, records))
    }

    #[test]
    fn add_files_rejects_duplicate_filename() {
        let config = StateStoreConfig::default();
        let mut state = StateStoreFiles::new();
        let txn = FileTransaction::AddFiles { files: vec![file("f1", "root", 100)] };
        txn.validate(&state, &config).unwrap();
        txn.apply(&mut state, Utc::now());

        let dup = FileTransaction::AddFiles { files: vec![file("f1", "root", 50)] };
        assert!(matches!(dup.validate(&state, &config), Err(StateStoreError::FileAlreadyExists { .. })));
    }

    #[test]
    fn add_files_rejects_exceeding_max_references_per_file() {
        let mut config = StateStoreConfig::default();
        config.max_references_per_file = Some(1);
        let state = StateStoreFiles::new();

        let mut f = file("f1", "root", 100);
        f.internal_references.push(FileReference::whole_file("f1", "other", 50));
        let txn = FileTransaction::AddFiles { files: vec![f] };
        assert!(matches!(
            txn.validate(&state, &config),
            Err(StateStoreError::TooManyReferencesForFile { .. })
        ));
    }

    #[test]
    fn split_file_references_rejects_exceeding_max_references_per_file() {
        let mut config = StateStoreConfig::default();
        let mut state = StateStoreFiles::new();
        let add = FileTransaction::AddFiles { files: vec![file("f", "root", 100)] };
        add.validate(&state, &config).unwrap();
        add.apply(&mut state, Utc::now());

        config.max_references_per_file = Some(1);
        let split = FileTransaction::SplitFileReferences {
            requests: vec![SplitFileReferenceRequest {
                filename: "f".into(),
                from_partition_id: "root".into(),
                new_references: vec![
                    FileReference::split_from(state.reference("f", "root").unwrap(), "L"),
                    FileReference::split_from(state.reference("f", "root").unwrap(), "R"),
                ],
            }],
        };
        assert!(matches!(
            split.validate(&state, &config),
            Err(StateStoreError::TooManyReferencesForFile { .. })
        ));
    }

    #[test]
    fn assign_then_replace_round_trip() {
        let config = StateStoreConfig::default();
        let mut state = StateStoreFiles::new();
        let add = FileTransaction::AddFiles {
            files: vec![file("a", "L", 100), file("b", "L", 100)],
        };
        add.validate(&state, &config).unwrap();
        add.apply(&mut state, Utc::now());

        let assign = FileTransaction::AssignJobIds {
            requests: vec![AssignJobIdRequest {
                job_id: "j1".into(),
                partition_id: "L".into(),
                filenames: vec!["a".into(), "b".into()],
            }],
        };
        assign.validate(&state, &config).unwrap();
        assign.apply(&mut state, Utc::now());

        // Re-assigning fails.
        assert!(matches!(assign.validate(&state, &config), Err(StateStoreError::FileReferenceAssignedToJob { .. })));

        let replace = FileTransaction::ReplaceFileReferences {
            job_id: "j1".into(),
            partition_id: "L".into(),
            input_filenames: vec!["a".into(), "b".into()],
            new_reference: FileReference::compaction_output("c", "L", 200),
        };
        replace.validate(&state, &config).unwrap();
        replace.apply(&mut state, Utc::now());

        assert!(state.get("a").unwrap().is_unreferenced());
        assert!(state.get("b").unwrap().is_unreferenced());
        assert_eq!(state.get("c").unwrap().total_reference_count(), 1);
    }

    #[test]
    fn split_blocked_when_assigned_to_job() {
        let config = StateStoreConfig::default();
        let mut state = StateStoreFiles::new();
        let add = FileTransaction::AddFiles { files: vec![file("f", "root", 100)] };
        add.validate(&state, &config).unwrap();
        add.apply(&mut state, Utc::now());

        let assign = FileTransaction::AssignJobIds {
            requests: vec![AssignJobIdRequest { job_id: "j1".into(), partition_id: "root".into(), filenames: vec!["f".into()] }],
        };
        assign.validate(&state, &config).unwrap();
        assign.apply(&mut state, Utc::now());

        let split = FileTransaction::SplitFileReferences {
            requests: vec![SplitFileReferenceRequest {
                filename: "f".into(),
                from_partition_id: "root".into(),
                new_references: vec![
                    FileReference::split_from(state.reference("f", "root").unwrap(), "L"),
                    FileReference::split_from(state.reference("f", "root").unwrap(), "R"),
                ],
            }],
        };
        assert!(matches!(split.validate(&state, &config), Err(StateStoreError::FileReferenceAssignedToJob { .. })));
    }

    #[test]
    fn delete_files_requires_zero_references() {
        let config = StateStoreConfig::default();
        let mut state = StateStoreFiles::new();
        let add = FileTransaction::AddFiles { files: vec![file("f", "root", 100)] };
        add.validate(&state, &config).unwrap();
        add.apply(&mut state, Utc::now());

        let delete = FileTransaction::DeleteFiles { filenames: vec!["f".into()] };
        assert!(matches!(delete.validate(&state, &config), Err(StateStoreError::FileHasReferences { .. })));
    }
}
