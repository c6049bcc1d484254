/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The closed error taxonomy of the state store (spec §7).
//!
//! Every mutating call returns exactly one of: success, a named validation
//! failure, [`StateStoreError::ConcurrencyExhausted`] or
//! [`StateStoreError::StoreUnavailable`]. There is no "default value in
//! place of a validation failure" — callers must match on the variant.

use crate::model::file_reference::FileReference;

/// Our crate-wide result type.
pub type Result<T, E = StateStoreError> = std::result::Result<T, E>;

/// Every way a state store operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    /// `add_file(s)` was called with a filename that already has a
    /// reference (or an `AllReferencesToAFile` entry) in the store.
    #[error("file already exists: {filename}")]
    FileAlreadyExists {
        /// The filename that collided.
        filename: String,
    },

    /// An operation referenced a filename with no entry in the file store.
    #[error("file not found: {filename}")]
    FileNotFound {
        /// The filename that was not found.
        filename: String,
    },

    /// An operation referenced a `(filename, partition_id)` pair with no
    /// live [`FileReference`].
    #[error("no reference to file {filename:?} in partition {partition_id:?}")]
    FileReferenceNotFound {
        /// The filename involved.
        filename: String,
        /// The partition involved.
        partition_id: String,
    },

    /// A split or ingest attempted to add a reference where one already
    /// exists (invariant: at most one reference per file per partition).
    #[error("reference to file {filename:?} already exists in partition {partition_id:?}")]
    FileReferenceAlreadyExists {
        /// The filename involved.
        filename: String,
        /// The partition involved.
        partition_id: String,
    },

    /// `split_file_references` or a second `assign_job_ids` targeted a
    /// reference that is already assigned to a job.
    #[error(
        "reference to file {filename:?} in partition {partition_id:?} is already assigned to job {job_id:?}"
    )]
    FileReferenceAssignedToJob {
        /// The filename involved.
        filename: String,
        /// The partition involved.
        partition_id: String,
        /// The job the reference is already assigned to.
        job_id: String,
    },

    /// `atomically_replace_file_references_with_new_one` named an input
    /// reference that has no job assigned, or is assigned to a different
    /// job than the one supplied.
    #[error("reference to file {filename:?} in partition {partition_id:?} is not assigned to a job")]
    FileReferenceNotAssignedToJob {
        /// The filename involved.
        filename: String,
        /// The partition involved.
        partition_id: String,
    },

    /// A replacement's new reference is identical (same filename, same
    /// partition) to one of the references it would replace.
    #[error("new reference {0:?} is the same as an old reference it would replace")]
    NewReferenceSameAsOldReference(FileReference),

    /// `delete_garbage_collected_file_reference_counts` (or `DeleteFiles`)
    /// named a file that still has live references.
    #[error("file {filename:?} still has {reference_count} live reference(s)")]
    FileHasReferences {
        /// The filename involved.
        filename: String,
        /// How many references are still live.
        reference_count: usize,
    },

    /// A partition transaction referenced a partition id with no entry in
    /// the partition store.
    #[error("partition not found: {partition_id}")]
    PartitionNotFound {
        /// The partition id that was not found.
        partition_id: String,
    },

    /// `SplitPartition` targeted a partition that is not a leaf, or one
    /// whose proposed children are already present, or whose regions do
    /// not partition the parent's region.
    #[error("invalid partition split: {reason}")]
    InvalidPartitionSplit {
        /// Human-readable reason the split was rejected.
        reason: String,
    },

    /// `PartitionStore::initialise` was called while the file store still
    /// holds references (would orphan them).
    #[error("cannot initialise partitions: file store is not empty")]
    FileStoreNotEmpty,

    /// `AddFiles` or `SplitFileReferences` would push a file's live
    /// reference count past `config.max_references_per_file`.
    #[error("file {filename:?} would have {reference_count} reference(s), exceeding the configured maximum of {max}")]
    TooManyReferencesForFile {
        /// The filename involved.
        filename: String,
        /// The reference count the operation would produce.
        reference_count: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The commit loop exhausted its retry budget (§5) racing other
    /// writers. The caller may retry at a higher level.
    #[error("commit loop exhausted {attempts} attempt(s) racing other writers")]
    ConcurrencyExhausted {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// The log backend reported an I/O or availability failure distinct
    /// from a raced `AlreadyCommitted` append.
    #[error("transaction log store unavailable: {0}")]
    StoreUnavailable(String),
}
