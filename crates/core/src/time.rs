// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Nanosecond-precision timestamps, used to order gossip events for logging and diagnostics.

use std::{
    fmt::{Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Represents a UNIX timestamp in nanoseconds since the epoch.
#[repr(C)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct UnixNanos(u64);

impl UnixNanos {
    /// Creates a new [`UnixNanos`] from a raw nanosecond count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw nanosecond count.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for UnixNanos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for UnixNanos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", stringify!(UnixNanos), self.0)
    }
}

/// Returns the current wall-clock time as [`UnixNanos`].
///
/// Falls back to zero if the system clock is set before the epoch, which should never
/// happen in practice but is cheaper to handle than to propagate as an error here.
#[must_use]
pub fn unix_nanos_now() -> UnixNanos {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    UnixNanos::new(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_nanos_now_is_nonzero() {
        assert!(unix_nanos_now().as_u64() > 0);
    }

    #[test]
    fn test_ordering() {
        assert!(UnixNanos::new(1) < UnixNanos::new(2));
    }
}
