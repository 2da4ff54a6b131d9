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

//! Precondition checks for validating inputs at construction boundaries.

use anyhow::bail;

/// Message used when a fallible constructor is called through its panicking variant.
pub const FAILED: &str = "Condition failed";

/// Checks the given string slice is not empty.
///
/// # Errors
///
/// Returns an error if `s` is empty.
pub fn check_nonempty_string(s: &str, param: &str) -> anyhow::Result<()> {
    if s.is_empty() {
        bail!("invalid string for '{param}': empty string is not allowed");
    }
    Ok(())
}
