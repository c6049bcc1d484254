/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The transaction log and its replayed head (spec §4.1-4.2, components
//! C4-C5).

pub mod head;
pub mod store;
