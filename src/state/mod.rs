/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! In-memory projections of the two logical sub-stores (spec §4, C2).
//!
//! These are plain data: nothing here talks to the log. They are mutated
//! only by [`crate::transaction::file_txn::FileTransaction::apply`] and
//! [`crate::transaction::partition_txn::PartitionTransaction::apply`],
//! and read only through [`crate::log::head::TransactionLogHead::state`].

pub mod files;
pub mod partitions;
