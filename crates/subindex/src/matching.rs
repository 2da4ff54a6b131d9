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

//! Topic filter matching against concrete topics, per the MQTT wildcard rules.
//!
//! `+` matches exactly one level. `#` matches that level and every level below it,
//! including zero remaining levels, and is only valid as the final level of a filter
//! (enforced at construction by [`crate::identifiers::TopicFilter`], not here). A filter
//! whose first level is `+` or `#` never matches a topic whose first level starts with
//! `$`, so ordinary subscriptions cannot accidentally sweep up `$SYS` topics.

use crate::identifiers::{Topic, TopicFilter};

/// Returns `true` if `topic` matches `filter` under MQTT wildcard semantics.
#[must_use]
pub fn is_match(filter: &TopicFilter, topic: &Topic) -> bool {
    is_match_str(filter.as_str(), topic.as_str())
}

/// Returns `true` if the concrete topic string `topic` matches the filter string `filter`.
///
/// Operates on raw strings so it can be exercised directly by table and property tests
/// without constructing [`TopicFilter`]/[`Topic`] values for every case.
#[must_use]
pub fn is_match_str(filter: &str, topic: &str) -> bool {
    let filter_levels: Vec<&str> = filter.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    if topic.starts_with('$')
        && !filter.starts_with('$')
        && matches!(filter_levels.first(), Some(&"+") | Some(&"#"))
    {
        return false;
    }

    match_levels(&filter_levels, &topic_levels)
}

fn match_levels(filter: &[&str], topic: &[&str]) -> bool {
    match (filter.first(), topic.first()) {
        (None, None) => true,
        (Some(&"#"), _) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(&"+"), Some(_)) => match_levels(&filter[1..], &topic[1..]),
        (Some(f), Some(t)) => *f == *t && match_levels(&filter[1..], &topic[1..]),
    }
}
