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

//! Index for `$SYS/...` broker-internal topics.
//!
//! Structurally identical to [`crate::ephemeral::EphemeralIndex`], but kept as a distinct
//! type so that `$SYS` subscriptions can never be reached by the persistent-index or
//! cluster-gossip code paths: the isolation is enforced by the type system, not by a
//! runtime flag that could be forgotten at a call site.

use crate::{
    identifiers::{ClientId, Topic, TopicFilter},
    local_index::LocalTopicIndex,
    record::{Qos, SubscriptionRecord},
};

/// The subscription index for `$SYS` topics. Never persisted, never gossiped.
#[derive(Default)]
pub struct SysTopicIndex {
    inner: LocalTopicIndex,
}

impl SysTopicIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, client_id: ClientId, filter: TopicFilter, qos: Qos) {
        self.inner.subscribe(client_id, filter, qos);
    }

    pub fn unsubscribe(&self, client_id: ClientId, filter: &TopicFilter) {
        self.inner.unsubscribe(client_id, filter);
    }

    pub fn clear_client(&self, client_id: ClientId) -> Vec<TopicFilter> {
        self.inner.clear_client(client_id)
    }

    #[must_use]
    pub fn matching_records(&self, topic: &Topic) -> Vec<SubscriptionRecord> {
        self.inner.matching_records(topic)
    }
}
