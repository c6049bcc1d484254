/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `TransactionLogStore` (spec §4.1, component C4): an append-only,
//! strictly numbered log, keyed on `(table_id, transaction_number)`.
//!
//! This is the one external collaborator the core genuinely needs (spec
//! §6: "a keyed table with a uniqueness constraint on the composite key;
//! serializable reads"). [`InMemoryLogStore`] is the reference
//! implementation used by tests and the in-process examples; a
//! production deployment swaps it for a real conditional-write backend
//! without touching anything above this trait.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::Result;
use crate::transaction::Transaction;

/// The outcome of an [`TransactionLogStore::append`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was written at `expected_number`.
    Committed,
    /// Another writer already holds `expected_number`; the caller should
    /// refresh its head and retry with the next number.
    AlreadyCommitted,
}

/// One committed entry: its transaction number and the transaction
/// itself.
pub type LogEntry<T> = (u64, T);

/// An append-only, strictly numbered transaction log (spec §4.1).
///
/// Implementations must guarantee that `append` is atomic: if two callers
/// race to write the same `expected_number`, exactly one succeeds and the
/// other observes [`AppendOutcome::AlreadyCommitted`].
pub trait TransactionLogStore<T: Transaction>: Send + Sync {
    /// Writes `transaction` at `expected_number` iff no entry currently
    /// exists there.
    fn append(&self, table_id: &str, transaction: &T, expected_number: u64) -> Result<AppendOutcome>;

    /// Every committed transaction with number greater than
    /// `last_number`, in strict ascending order, with no gaps.
    fn read_after(&self, table_id: &str, last_number: u64) -> Result<Vec<LogEntry<T>>>;
}

/// Reference, in-memory implementation of [`TransactionLogStore`].
///
/// Backed by a `parking_lot::Mutex`-guarded `Vec` per table; numbering is
/// simply the 1-based index into that `Vec`. Not a production backend
/// (state is lost on process exit) but gives identical serialization
/// semantics to one, which is all the commit loop (spec §5) depends on.
#[derive(Debug, Default)]
pub struct InMemoryLogStore<T> {
    tables: Mutex<HashMap<String, Vec<T>>>,
}

impl<T: Transaction> InMemoryLogStore<T> {
    /// An empty log store.
    pub fn new() -> Self {
        InMemoryLogStore { tables: Mutex::new(HashMap::new()) }
    }
}

impl<T: Transaction> TransactionLogStore<T> for InMemoryLogStore<T> {
    fn append(&self, table_id: &str, transaction: &T, expected_number: u64) -> Result<AppendOutcome> {
        let mut tables = self.tables.lock();
        let log = tables.entry(table_id.to_string()).or_default();
        // `expected_number` is 1-based; the log currently holds `log.len()` entries.
        if expected_number != log.len() as u64 + 1 {
            return Ok(AppendOutcome::AlreadyCommitted);
        }
        log.push(transaction.clone());
        Ok(AppendOutcome::Committed)
    }

    fn read_after(&self, table_id: &str, last_number: u64) -> Result<Vec<LogEntry<T>>> {
        let tables = self.tables.lock();
        let Some(log) = tables.get(table_id) else {
            return Ok(Vec::new());
        };
        Ok(log
            .iter()
            .enumerate()
            .skip(last_number as usize)
            .map(|(i, txn)| (i as u64 + 1, txn.clone()))
            .collect())
    }
}
