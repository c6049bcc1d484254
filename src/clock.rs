/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Injected time source (spec §9: "`updateTime` is injected... to allow
//! deterministic tests; the core otherwise calls system time only at
//! commit").
//!
//! Nothing in this crate calls `chrono::Utc::now()` directly outside of
//! the default [`Clock`] implementation; every place that needs "now"
//! takes a `&dyn Clock` instead, the way pippin threads a `MakeMeta` trait
//! through commit construction rather than calling the system clock from
//! deep inside `commit.rs`.

use chrono::{DateTime, Utc};

/// A source of timestamps for transaction replay (see
/// [`crate::log::head::TransactionLogHead::update`]).
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The default clock: reads the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed, manually-advanced clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        FixedClock { now: parking_lot::Mutex::new(start) }
    }

    /// Advances the clock by `duration`, returning the new time.
    pub fn advance(&self, duration: chrono::Duration) -> DateTime<Utc> {
        let mut now = self.now.lock();
        *now += duration;
        *now
    }

    /// Sets the clock to an explicit time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.lock() = time;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
