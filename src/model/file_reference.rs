/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `FileReference` and `AllReferencesToAFile` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The claim that a named file contributes records to a single partition.
///
/// At most one `FileReference` may exist per `(filename, partition_id)`
/// pair (invariant 2, spec §3); this is enforced by the stores that hold
/// these, not by the type itself.
///
/// Wire shape (spec §6): `partitionId`, `numberOfRecords`, `jobId`,
/// `countApproximate`, `onlyContainsDataForThisPartition`; `filename` is
/// unchanged and `lastUpdatedTime` is omitted entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Stable identifier, unique per file.
    pub filename: String,
    /// The partition this reference claims to contribute to.
    pub partition_id: String,
    /// Non-negative; approximate when this reference was produced by
    /// splitting rather than by direct ingest.
    pub number_of_records: u64,
    /// Non-null means this reference is reserved by a compaction job.
    /// Transitions `None -> Some(id)` (assign) and `Some(id) -> removed`
    /// (complete); never `Some(a) -> Some(b)` or `Some(id) -> None`
    /// (invariant 4, spec §3).
    pub job_id: Option<String>,
    /// Monotone per reference; stamped by the log head during replay,
    /// never set directly by callers (see `transaction::codec`). Excluded
    /// from the serialized transaction body (spec §6): `apply` always
    /// overwrites it before a reader can observe it.
    #[serde(skip, default = "crate::model::epoch")]
    pub last_updated: DateTime<Utc>,
    /// True if `number_of_records` is an estimate (always true for
    /// references produced by a split).
    pub count_approximate: bool,
    /// False iff this reference is a split fraction of a file whose data
    /// actually spans a larger region than `partition_id` alone.
    pub only_contains_data_for_this_partition: bool,
}

impl FileReference {
    /// Builds the single reference created by ingesting a whole file
    /// directly into one partition (not the product of a split).
    ///
    /// `last_updated` is a placeholder; the log head overwrites it with
    /// its own clock when the enclosing transaction is applied (spec
    /// §4.3: "update times are supplied by the head, not baked into the
    /// serialized form").
    pub fn whole_file(filename: impl Into<String>, partition_id: impl Into<String>, number_of_records: u64) -> Self {
        FileReference {
            filename: filename.into(),
            partition_id: partition_id.into(),
            number_of_records,
            job_id: None,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            count_approximate: false,
            only_contains_data_for_this_partition: true,
        }
    }

    /// Builds one of the two references produced by pushing `parent` down
    /// into `child_partition_id` (spec §4.6, `SplitFileReferences`).
    ///
    /// The record count is carried over unchanged but marked approximate,
    /// since a split cannot know how records divide between children
    /// without reading the file.
    pub fn split_from(parent: &FileReference, child_partition_id: impl Into<String>) -> Self {
        FileReference {
            filename: parent.filename.clone(),
            partition_id: child_partition_id.into(),
            number_of_records: parent.number_of_records,
            job_id: None,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            count_approximate: true,
            only_contains_data_for_this_partition: false,
        }
    }

    /// Builds the single reference produced by compacting a set of inputs
    /// into one output file (spec §4.3, `ReplaceFileReferences`).
    pub fn compaction_output(
        filename: impl Into<String>,
        partition_id: impl Into<String>,
        number_of_records: u64,
    ) -> Self {
        FileReference {
            filename: filename.into(),
            partition_id: partition_id.into(),
            number_of_records,
            job_id: None,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            count_approximate: false,
            only_contains_data_for_this_partition: true,
        }
    }

    /// Returns true if this reference is not currently assigned to a
    /// compaction job.
    pub fn has_no_job(&self) -> bool {
        self.job_id.is_none()
    }
}

/// Aggregates every live reference to one file.
///
/// A file with `total_reference_count() == 0` is unreferenced and becomes
/// eligible for garbage collection once `now - last_updated` exceeds the
/// table's grace period (spec §3).
///
/// Wire shape (spec §6): `filename`, a `references` array (this struct's
/// `internal_references`) and a computed `totalReferenceCount` field.
/// `totalReferenceCount` is never read back on deserialize — it is
/// recomputed from `references`/`externalReferenceCount`, the same way
/// `lastUpdatedTime` is recomputed by the log head rather than trusted
/// from the wire — so [`Serialize`] is implemented by hand while
/// [`Deserialize`] stays derived.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllReferencesToAFile {
    /// Stable identifier, unique per file.
    pub filename: String,
    /// At most one per partition (invariant 2, spec §3).
    #[serde(rename = "references")]
    pub internal_references: Vec<FileReference>,
    /// Reference count held by external collaborators outside this
    /// table's partition tree (e.g. a cross-table index); usually zero.
    #[serde(default)]
    pub external_reference_count: u64,
    /// Most recent `last_updated` across `internal_references` and any
    /// external-reference change. Excluded from the serialized
    /// transaction body (spec §6); see `FileReference::last_updated`.
    #[serde(skip, default = "crate::model::epoch")]
    pub last_updated: DateTime<Utc>,
}

impl Serialize for AllReferencesToAFile {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut out = serializer.serialize_struct("AllReferencesToAFile", 4)?;
        out.serialize_field("filename", &self.filename)?;
        out.serialize_field("references", &self.internal_references)?;
        out.serialize_field("totalReferenceCount", &self.total_reference_count())?;
        out.serialize_field("externalReferenceCount", &self.external_reference_count)?;
        out.end()
    }
}

impl AllReferencesToAFile {
    /// Wraps a single reference produced by ingesting a whole file.
    pub fn new(reference: FileReference) -> Self {
        let last_updated = reference.last_updated;
        AllReferencesToAFile {
            filename: reference.filename.clone(),
            internal_references: vec![reference],
            external_reference_count: 0,
            last_updated,
        }
    }

    /// `total_reference_count` from spec §3: internal references plus the
    /// external counter.
    pub fn total_reference_count(&self) -> u64 {
        self.internal_references.len() as u64 + self.external_reference_count
    }

    /// True iff this file currently has zero references anywhere.
    pub fn is_unreferenced(&self) -> bool {
        self.total_reference_count() == 0
    }

    /// The live reference in `partition_id`, if any.
    pub fn reference_in(&self, partition_id: &str) -> Option<&FileReference> {
        self.internal_references.iter().find(|r| r.partition_id == partition_id)
    }
}
