/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Canonical JSON encoding of transactions (spec §6).
//!
//! A log entry is conceptually `(table_id, transaction_number, type_tag,
//! body_json)`; the tag and body are one and the same JSON object here
//! (`#[serde(tag = "type")]` on the transaction enums), so this module is
//! a thin, explicit wrapper rather than a second tagging scheme layered
//! on top. Kept as its own module — rather than inlined at call sites —
//! because spec §8's round-trip law ("Serialize(transaction) then
//! deserialize yields a transaction that... produces the same post-state
//! and the same validate result") is exactly the property this boundary
//! exists to make testable in isolation.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StateStoreError};

/// Serializes a transaction to its canonical JSON body.
pub fn encode<T: Serialize>(transaction: &T) -> Result<String> {
    serde_json::to_string(transaction).map_err(|e| StateStoreError::StoreUnavailable(e.to_string()))
}

/// Deserializes a transaction from its JSON body.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| StateStoreError::StoreUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::file_reference::{AllReferencesToAFile, FileReference};
    use crate::transaction::FileTransaction;

    #[test]
    fn round_trip_preserves_transaction() {
        let txn = FileTransaction::AddFiles {
            files: vec![AllReferencesToAFile::new(FileReference::whole_file("f1", "root", 100))],
        };
        let body = encode(&txn).unwrap();
        let decoded: FileTransaction = decode(&body).unwrap();
        assert_eq!(txn, decoded);
    }

    #[test]
    fn last_updated_is_excluded_from_the_wire_body() {
        let mut reference = FileReference::whole_file("f1", "root", 100);
        reference.last_updated = chrono::Utc::now();
        let txn = FileTransaction::AddFiles { files: vec![AllReferencesToAFile::new(reference)] };
        let body = encode(&txn).unwrap();
        assert!(!body.contains("lastUpdated") && !body.contains("last_updated"));
    }

    #[test]
    fn wire_body_uses_the_documented_camel_case_shape() {
        let txn = FileTransaction::AddFiles {
            files: vec![AllReferencesToAFile::new(FileReference::whole_file("f1", "root", 100))],
        };
        let body = encode(&txn).unwrap();
        for key in ["\"references\"", "\"totalReferenceCount\"", "\"partitionId\"", "\"numberOfRecords\"", "\"jobId\"", "\"countApproximate\"", "\"onlyContainsDataForThisPartition\""] {
            assert!(body.contains(key), "expected {key} in {body}");
        }
        assert!(!body.contains("\"internal_references\""));
        assert!(!body.contains("\"partition_id\""));
    }

    #[test]
    fn identical_transactions_serialize_identically() {
        let txn_a = FileTransaction::AddFiles {
            files: vec![AllReferencesToAFile::new(FileReference::whole_file("f1", "root", 100))],
        };
        let mut reference_b = FileReference::whole_file("f1", "root", 100);
        reference_b.last_updated = chrono::Utc::now(); // differs, but must not affect the wire body
        let txn_b = FileTransaction::AddFiles { files: vec![AllReferencesToAFile::new(reference_b)] };
        assert_eq!(encode(&txn_a).unwrap(), encode(&txn_b).unwrap());
    }
}
