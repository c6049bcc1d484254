/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Configuration consumed by the core (spec §6). Property names are
//! opaque strings to the *caller's* loader (a cloud-config file, a CLI
//! flag parser, ...); none of that lives here. This struct is simply
//! where those values land once decoded, the way pippin's `UserPartT`
//! implementations carry policy decisions (snapshot frequency etc.)
//! without the library ever reading a config file itself.

use std::time::Duration;

/// Selects the [`crate::compaction::CompactionJobFactory`] strategy
/// (`compaction_strategy` in spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactionStrategy {
    /// Compact all unassigned references in a leaf partition once they
    /// pass a count or byte threshold (spec §4.7's minimum viable
    /// strategy).
    #[default]
    WholePartition,
}

/// Tunables consumed by the state store and the default compaction
/// factory.
#[derive(Debug, Clone)]
pub struct StateStoreConfig {
    /// Minimum `now - last_updated` before a zero-reference file is
    /// returned by GC queries.
    pub grace_period_for_gc: Duration,
    /// Which [`CompactionJobFactory`](crate::compaction::CompactionJobFactory)
    /// implementation to use.
    pub compaction_strategy: CompactionStrategy,
    /// Minimum number of unassigned references in a leaf partition before
    /// the default strategy proposes a job.
    pub compaction_min_files: usize,
    /// Minimum combined size (in records, as a byte-count proxy; see
    /// `CompactionJobFactory` doc) before the default strategy proposes a
    /// job even with fewer than `compaction_min_files` references.
    pub compaction_min_bytes: u64,
    /// Optional safety bound on references per file; `None` disables the
    /// check.
    pub max_references_per_file: Option<usize>,
    /// Bound on commit-loop retries before returning
    /// [`crate::error::StateStoreError::ConcurrencyExhausted`].
    pub commit_retry_limit: u32,
    /// Base duration for exponential backoff between commit retries.
    pub commit_backoff_base: Duration,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig {
            grace_period_for_gc: Duration::from_secs(600),
            compaction_strategy: CompactionStrategy::default(),
            compaction_min_files: 4,
            compaction_min_bytes: 0,
            max_references_per_file: None,
            commit_retry_limit: 10,
            commit_backoff_base: Duration::from_millis(10),
        }
    }
}
