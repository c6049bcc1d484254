/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Partition state store and compaction-orchestration core.
//!
//! This crate stores a large row-keyed table by partitioning the key space
//! into a binary tree of regions. Data is ingested as immutable files;
//! references to those files are tracked per partition and progressively
//! pushed down and compacted as the tree splits.
//!
//! Two logical sub-stores make up the state of one table:
//!
//! *   the **file store** ([`file_store::FileReferenceStore`]), tracking
//!     which files reference which partitions, and
//! *   the **partition store** ([`partition_store::PartitionStore`]),
//!     tracking the partition tree itself.
//!
//! Both are backed by the same mechanism: an append-only, strictly numbered
//! [`log`] of transactions, replayed into an in-memory projection
//! ([`state`]) by a [`log::head::TransactionLogHead`]. Mutations are
//! committed via an optimistic retry loop (see [`log::head`]); there is no
//! distributed lock.
//!
//! Terminology:
//!
//! *   **file** — an immutable object identified by its filename.
//! *   **reference** — a claim that a file contributes data to one
//!     partition ([`model::file_reference::FileReference`]).
//! *   **partition** — a node in the binary key-space tree
//!     ([`model::partition::Partition`]).
//! *   **transaction** — an atomic, validated mutation of one of the two
//!     projections ([`transaction`]).
//! *   **head** — a client's cached projection plus last-seen transaction
//!     number ([`log::head::TransactionLogHead`]).
//!
//! See `README.md` in the repository root for an overview; [`file_store`]
//! and [`partition_store`] are the public entry points most callers need.

#![warn(missing_docs)]

pub mod clock;
pub mod compaction;
pub mod config;
pub mod error;
pub mod file_store;
pub mod log;
pub mod model;
pub mod partition_store;
pub mod split;
pub mod state;
pub mod transaction;

pub use clock::Clock;
pub use compaction::{CompactionJob, CompactionJobFactory};
pub use config::{CompactionStrategy, StateStoreConfig};
pub use error::{Result, StateStoreError};
pub use file_store::FileReferenceStore;
pub use log::head::TransactionLogHead;
pub use log::store::{InMemoryLogStore, TransactionLogStore};
pub use model::file_reference::{AllReferencesToAFile, FileReference};
pub use model::partition::{Partition, PartitionTree, Range, Region};
pub use partition_store::PartitionStore;

/// Crate version, exposed for diagnostics and snapshot compatibility checks.
///
/// The low 16 bits are the patch number, the next 16 the minor version, the
/// next the major version; the top 16 bits are reserved and currently zero.
pub const LIB_VERSION: u64 = 0x0000_0000_0001;
