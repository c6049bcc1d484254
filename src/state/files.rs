/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `StateStoreFiles`: filename -> `AllReferencesToAFile` projection.

use std::collections::HashMap;

use crate::model::file_reference::{AllReferencesToAFile, FileReference};

/// The replayed projection backing [`crate::file_store::FileReferenceStore`].
#[derive(Debug, Default, Clone)]
pub struct StateStoreFiles {
    files: HashMap<String, AllReferencesToAFile>,
}

impl StateStoreFiles {
    /// An empty projection (the initial state before any transaction).
    pub fn new() -> Self {
        StateStoreFiles::default()
    }

    /// True iff no files are tracked at all (required before
    /// `PartitionStore::initialise`, spec §4.5).
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up a file's aggregate reference record.
    pub fn get(&self, filename: &str) -> Option<&AllReferencesToAFile> {
        self.files.get(filename)
    }

    /// Mutable lookup, used by `apply` implementations.
    pub fn get_mut(&mut self, filename: &str) -> Option<&mut AllReferencesToAFile> {
        self.files.get_mut(filename)
    }

    /// Inserts a new file entry; callers must have validated that
    /// `filename` is not already present.
    pub fn insert(&mut self, file: AllReferencesToAFile) {
        self.files.insert(file.filename.clone(), file);
    }

    /// Removes a file entry entirely (`DeleteFiles`, `ClearFiles`).
    pub fn remove(&mut self, filename: &str) -> Option<AllReferencesToAFile> {
        self.files.remove(filename)
    }

    /// Removes every file entry (`ClearFiles`).
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Every internal reference across all files.
    pub fn all_references(&self) -> impl Iterator<Item = &FileReference> {
        self.files.values().flat_map(|f| f.internal_references.iter())
    }

    /// Every internal reference with a null `job_id`.
    pub fn references_with_no_job_id(&self) -> impl Iterator<Item = &FileReference> {
        self.all_references().filter(|r| r.has_no_job())
    }

    /// All `AllReferencesToAFile` entries, referenced or not.
    pub fn all_files(&self) -> impl Iterator<Item = &AllReferencesToAFile> {
        self.files.values()
    }

    /// Filenames with zero total references whose `last_updated` precedes
    /// `max_update_time`.
    pub fn ready_for_gc_before(&self, max_update_time: chrono::DateTime<chrono::Utc>) -> Vec<String> {
        self.files
            .values()
            .filter(|f| f.is_unreferenced() && f.last_updated < max_update_time)
            .map(|f| f.filename.clone())
            .collect()
    }

    /// The live reference for `(filename, partition_id)`, if any.
    pub fn reference(&self, filename: &str, partition_id: &str) -> Option<&FileReference> {
        self.get(filename).and_then(|f| f.reference_in(partition_id))
    }
}
