/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `TransactionLogHead` (spec §4.2, component C5): a client's cached
//! projection plus last-seen transaction number, and the optimistic
//! commit loop (spec §5) built on top of it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::StateStoreConfig;
use crate::error::{Result, StateStoreError};
use crate::log::store::{AppendOutcome, TransactionLogStore};
use crate::transaction::Transaction;

/// A transaction that can be validated and applied against projection
/// `S`. Implemented once per `(transaction type, projection type)` pair
/// ([`crate::transaction::file_txn::FileTransaction`] against
/// [`crate::state::files::StateStoreFiles`],
/// [`crate::transaction::partition_txn::PartitionTransaction`] against
/// [`crate::state::partitions::StateStorePartitions`]) so the head below
/// can stay generic over both logs.
pub trait AppliesTo<S> {
    /// See the transaction type's own `validate`.
    fn validate_against(&self, state: &S, config: &StateStoreConfig) -> Result<()>;
    /// See the transaction type's own `apply`.
    fn apply_to(&self, state: &mut S, update_time: chrono::DateTime<chrono::Utc>);
}

/// Maintains the latest replayed projection for one log, plus the last
/// transaction number it has seen (spec §4.2).
pub struct TransactionLogHead<T, S> {
    table_id: String,
    store: Arc<dyn TransactionLogStore<T>>,
    clock: Arc<dyn Clock>,
    config: StateStoreConfig,
    state: S,
    last_seen_number: u64,
    _marker: PhantomData<T>,
}

impl<T, S> TransactionLogHead<T, S>
where
    T: Transaction + AppliesTo<S>,
    S: Default,
{
    /// Creates a head over `table_id`'s log, with an empty starting
    /// projection. Call [`Self::update`] (or let [`Self::add`] do it for
    /// you) before trusting [`Self::state`].
    pub fn new(
        table_id: impl Into<String>,
        store: Arc<dyn TransactionLogStore<T>>,
        clock: Arc<dyn Clock>,
        config: StateStoreConfig,
    ) -> Self {
        TransactionLogHead {
            table_id: table_id.into(),
            store,
            clock,
            config,
            state: S::default(),
            last_seen_number: 0,
            _marker: PhantomData,
        }
    }

    /// Reads every entry with number greater than the last one seen,
    /// applying each in order and advancing the last-seen number (spec
    /// §4.2).
    pub fn update(&mut self) -> Result<()> {
        let entries = self.store.read_after(&self.table_id, self.last_seen_number)?;
        if !entries.is_empty() {
            log::debug!("{}: replaying {} transaction(s) after {}", self.table_id, entries.len(), self.last_seen_number);
        }
        for (number, transaction) in entries {
            let now = self.clock.now();
            transaction.apply_to(&mut self.state, now);
            self.last_seen_number = number;
        }
        Ok(())
    }

    /// The current projection, as of the last [`Self::update`]. Does not
    /// itself refresh — callers that need fresh data call `update` first
    /// (this is what every read path in `file_store`/`partition_store`
    /// does).
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The last transaction number this head has applied.
    pub fn last_seen_number(&self) -> u64 {
        self.last_seen_number
    }

    /// Runs the optimistic commit loop of spec §5 for `transaction`:
    /// `update` → `validate` → `append(L+1)`, retrying on a race up to
    /// `config.commit_retry_limit` times with exponential backoff.
    ///
    /// Validation failures abort immediately without retrying — only a
    /// raced [`AppendOutcome::AlreadyCommitted`] triggers another
    /// iteration.
    pub fn add(&mut self, transaction: T) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            self.update()?;
            transaction.validate_against(&self.state, &self.config)?;
            let next_number = self.last_seen_number + 1;
            log::debug!("{}: appending transaction {} (attempt {})", self.table_id, next_number, attempt + 1);
            match self.store.append(&self.table_id, &transaction, next_number)? {
                AppendOutcome::Committed => {
                    log::debug!("{}: committed transaction {}", self.table_id, next_number);
                    return Ok(());
                }
                AppendOutcome::AlreadyCommitted => {
                    attempt += 1;
                    log::warn!("{}: lost race for transaction {}, retrying (attempt {}/{})", self.table_id, next_number, attempt, self.config.commit_retry_limit);
                    if attempt >= self.config.commit_retry_limit {
                        log::warn!("{}: commit loop exhausted after {} attempt(s)", self.table_id, attempt);
                        return Err(StateStoreError::ConcurrencyExhausted { attempts: attempt });
                    }
                    let backoff = self.config.commit_backoff_base * attempt.min(8);
                    if backoff > Duration::ZERO {
                        thread::sleep(backoff);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::log::store::InMemoryLogStore;
    use crate::state::files::StateStoreFiles;
    use crate::transaction::FileTransaction;
    use chrono::Utc;

    fn new_head(store: Arc<InMemoryLogStore<FileTransaction>>) -> TransactionLogHead<FileTransaction, StateStoreFiles> {
        TransactionLogHead::new("t1", store, Arc::new(FixedClock::new(Utc::now())), StateStoreConfig::default())
    }

    #[test]
    fn add_commits_and_updates_state() {
        let store = Arc::new(InMemoryLogStore::new());
        let mut head = new_head(store);
        head.add(FileTransaction::AddFiles {
            files: vec![crate::model::file_reference::AllReferencesToAFile::new(
                crate::model::file_reference::FileReference::whole_file("f1", "root", 100),
            )],
        })
        .unwrap();
        assert_eq!(head.last_seen_number(), 1);
        assert!(head.state().get("f1").is_some());
    }

    #[test]
    fn second_head_sees_first_heads_commit_after_update() {
        let store = Arc::new(InMemoryLogStore::new());
        let mut writer = new_head(store.clone());
        let mut reader = new_head(store);

        writer
            .add(FileTransaction::AddFiles {
                files: vec![crate::model::file_reference::AllReferencesToAFile::new(
                    crate::model::file_reference::FileReference::whole_file("f1", "root", 100),
                )],
            })
            .unwrap();

        assert!(reader.state().get("f1").is_none());
        reader.update().unwrap();
        assert!(reader.state().get("f1").is_some());
    }

    #[test]
    fn concurrent_add_loses_to_already_committed_and_retries() {
        let store = Arc::new(InMemoryLogStore::new());
        let mut a = new_head(store.clone());
        let mut b = new_head(store);

        a.add(FileTransaction::AddFiles {
            files: vec![crate::model::file_reference::AllReferencesToAFile::new(
                crate::model::file_reference::FileReference::whole_file("a", "root", 1),
            )],
        })
        .unwrap();

        // b's add() internally refreshes before validating/appending, so it
        // still succeeds even though a committed first.
        b.add(FileTransaction::AddFiles {
            files: vec![crate::model::file_reference::AllReferencesToAFile::new(
                crate::model::file_reference::FileReference::whole_file("b", "root", 1),
            )],
        })
        .unwrap();

        assert_eq!(b.last_seen_number(), 2);
    }
}
