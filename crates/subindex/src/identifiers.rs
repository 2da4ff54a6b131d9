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

//! Identifiers and topic string types.
//!
//! [`Topic`] and [`TopicFilter`] are deliberately distinct types rather than a single
//! string wrapper: a [`Topic`] names a concrete location a message is published to and can
//! never contain a wildcard, while a [`TopicFilter`] is what a client subscribes with and
//! may contain `+` and `#`. Keeping them apart means a lookup can never accidentally be
//! handed a pattern, and a subscribe can never accidentally be handed a literal.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use subindex_core::correctness::{FAILED, check_nonempty_string};
use ustr::Ustr;

/// The reserved prefix for broker-internal topics (`$SYS/...`), never persisted or gossiped.
pub const SYS_PREFIX: &str = "$SYS";

/// Uniquely identifies a connected MQTT client.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClientId(Ustr);

impl ClientId {
    /// Creates a new [`ClientId`], validating the raw string.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is empty.
    pub fn new_checked<S: AsRef<str>>(s: S) -> anyhow::Result<Self> {
        let s = s.as_ref();
        check_nonempty_string(s, "client_id")?;
        Ok(Self(Ustr::from(s)))
    }

    /// Creates a new [`ClientId`].
    ///
    /// # Panics
    ///
    /// Panics if `s` is empty.
    #[must_use]
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self::new_checked(s).expect(FAILED)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}('{}')", stringify!(ClientId), self.0)
    }
}

/// A concrete topic a message is published to, e.g. `sensors/kitchen/temperature`.
///
/// Never contains `+` or `#`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Topic(Ustr);

impl Topic {
    /// Creates a new [`Topic`], validating that it contains no wildcard characters.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is empty or contains `+` or `#`.
    pub fn new_checked<S: AsRef<str>>(s: S) -> anyhow::Result<Self> {
        let s = s.as_ref();
        check_nonempty_string(s, "topic")?;
        if s.contains(['+', '#']) {
            anyhow::bail!("invalid topic '{s}': concrete topics cannot contain '+' or '#'");
        }
        Ok(Self(Ustr::from(s)))
    }

    /// Creates a new [`Topic`].
    ///
    /// # Panics
    ///
    /// Panics if `s` is empty or contains a wildcard character.
    #[must_use]
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self::new_checked(s).expect(FAILED)
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns `true` if this is a broker-internal `$SYS` topic.
    #[must_use]
    pub fn is_sys(&self) -> bool {
        self.0.starts_with(SYS_PREFIX)
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}('{}')", stringify!(Topic), self.0)
    }
}

/// A topic filter a client subscribes with, e.g. `sensors/+/temperature` or `sensors/#`.
///
/// May contain the single-level wildcard `+` and the multi-level wildcard `#`, each of
/// which must occupy an entire level of its own, with `#` permitted only as the final level.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TopicFilter(Ustr);

impl TopicFilter {
    /// Creates a new [`TopicFilter`], validating wildcard placement.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is empty, or a level mixes a wildcard with other
    /// characters, or `#` appears anywhere but the final level.
    pub fn new_checked<S: AsRef<str>>(s: S) -> anyhow::Result<Self> {
        let s = s.as_ref();
        check_nonempty_string(s, "topic_filter")?;
        let levels: Vec<&str> = s.split('/').collect();
        for (i, level) in levels.iter().enumerate() {
            if level.contains('#') && *level != "#" {
                anyhow::bail!("invalid topic filter '{s}': '#' must occupy its own level");
            }
            if *level == "#" && i != levels.len() - 1 {
                anyhow::bail!("invalid topic filter '{s}': '#' is only valid as the final level");
            }
            if level.contains('+') && *level != "+" {
                anyhow::bail!("invalid topic filter '{s}': '+' must occupy its own level");
            }
        }
        Ok(Self(Ustr::from(s)))
    }

    /// Creates a new [`TopicFilter`].
    ///
    /// # Panics
    ///
    /// Panics if `s` is not a structurally valid topic filter.
    #[must_use]
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self::new_checked(s).expect(FAILED)
    }

    /// Returns the filter as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns `true` if this filter names the `$SYS` namespace.
    #[must_use]
    pub fn is_sys(&self) -> bool {
        self.0.starts_with(SYS_PREFIX)
    }
}

impl Display for TopicFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for TopicFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}('{}')", stringify!(TopicFilter), self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("a")]
    #[case("sensors/kitchen/temperature")]
    #[case("$SYS/broker/clients")]
    fn test_topic_accepts_valid(#[case] input: &str) {
        assert!(Topic::new_checked(input).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("sensors/+")]
    #[case("sensors/#")]
    fn test_topic_rejects_invalid(#[case] input: &str) {
        assert!(Topic::new_checked(input).is_err());
    }

    #[rstest]
    #[case("a")]
    #[case("sensors/+/temperature")]
    #[case("sensors/#")]
    #[case("#")]
    #[case("+")]
    #[case("+/+")]
    #[case("$SYS/#")]
    fn test_filter_accepts_valid(#[case] input: &str) {
        assert!(TopicFilter::new_checked(input).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("sensors/#/more")]
    #[case("sensors/kitchen#")]
    #[case("sensors/+kitchen")]
    fn test_filter_rejects_invalid(#[case] input: &str) {
        assert!(TopicFilter::new_checked(input).is_err());
    }

    #[test]
    #[should_panic(expected = "Condition failed")]
    fn test_client_id_new_panics_on_empty() {
        let _ = ClientId::new("");
    }

    #[test]
    fn test_topic_is_sys() {
        assert!(Topic::new("$SYS/broker/uptime").is_sys());
        assert!(!Topic::new("sensors/kitchen").is_sys());
    }
}
