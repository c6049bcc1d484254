/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Immutable value types and their invariants (spec §3, component C1).
//!
//! Nothing in this module touches the transaction log or any backend; it
//! is the plain-data layer the rest of the crate builds on, the same role
//! pippin's `elt` and `sum` modules play relative to `part` and `repo`.

pub mod file_reference;
pub mod partition;

/// The zero value used as a placeholder for `last_updated` fields before
/// the log head stamps them at apply time. Exists so `#[serde(default =
/// ...)]` has something to call when decoding a transaction body, where
/// `last_updated` is intentionally absent (spec §4.3, §6).
pub fn epoch() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::UNIX_EPOCH
}
