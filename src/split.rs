/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `SplitFileReferences` (spec §4.6, component C8): pushes unassigned
//! references down one level of the partition tree per invocation.
//!
//! Converging the whole tree (running this repeatedly until no non-leaf
//! partition holds an unassigned reference) is an external scheduling
//! concern, same as spec §4.6 says; this module does exactly one pass.

use std::collections::HashMap;

use crate::file_store::FileReferenceStore;
use crate::model::file_reference::FileReference;
use crate::partition_store::PartitionStore;
use crate::transaction::file_txn::SplitFileReferenceRequest;

/// Runs one pass of the split cascade: every non-leaf partition holding
/// unassigned references has each of those references replaced by one
/// new reference per child.
///
/// Returns the number of references split. A reference already assigned
/// to a compaction job is left untouched (spec §4.6: "assigning a
/// reference to a job blocks its splitting").
pub fn split_file_references_one_level(files: &mut FileReferenceStore, partitions: &mut PartitionStore) -> crate::error::Result<usize> {
    let unassigned = files.get_file_references_with_no_job_id()?;
    let all_partitions = partitions.get_all_partitions()?;
    let by_id: HashMap<&str, &crate::model::partition::Partition> =
        all_partitions.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut by_partition: HashMap<&str, Vec<&FileReference>> = HashMap::new();
    for r in &unassigned {
        by_partition.entry(r.partition_id.as_str()).or_default().push(r);
    }

    let mut requests = Vec::new();
    for (partition_id, references) in by_partition {
        let Some(partition) = by_id.get(partition_id) else { continue };
        if partition.is_leaf {
            continue;
        }
        for reference in references {
            let new_references = partition
                .child_ids
                .iter()
                .map(|child_id| FileReference::split_from(reference, child_id.clone()))
                .collect();
            requests.push(SplitFileReferenceRequest {
                filename: reference.filename.clone(),
                from_partition_id: partition_id.to_string(),
                new_references,
            });
        }
    }

    let count = requests.len();
    if count == 0 {
        return Ok(0);
    }
    log::debug!("split_file_references_one_level: pushing {count} reference(s) down one level");
    files.split_file_references(requests).map_err(|failed| failed.cause)?;
    Ok(count)
}
