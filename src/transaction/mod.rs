/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Transaction types and their wire codec (spec §4.3, §6, component C3).

pub mod codec;
pub mod file_txn;
pub mod partition_txn;

pub use file_txn::FileTransaction;
pub use partition_txn::PartitionTransaction;

/// Anything that can sit in a [`crate::log::store::TransactionLogStore`]:
/// cloneable, debuggable, and round-trippable through JSON (spec §6:
/// "Serialized transaction format... JSON objects with a required `type`
/// tag").
pub trait Transaction:
    Clone + std::fmt::Debug + PartialEq + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static
{
}

impl Transaction for FileTransaction {}
impl Transaction for PartitionTransaction {}
