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

//! In-memory subscription index for clean-session ("ephemeral") clients.
//!
//! Every operation here is synchronous and infallible: nothing is ever persisted or
//! gossiped to other nodes, so a client that reconnects with a clean session simply
//! starts from an empty set again. Maintains two invariants:
//!
//! - **E1**: a topic filter appears in the topic set if and only if it has at least one
//!   subscriber.
//! - **E2**: the client-to-filters map and the filter-to-clients map always agree on
//!   which `(client, filter)` pairs exist.

use crate::{
    identifiers::{ClientId, Topic, TopicFilter},
    local_index::LocalTopicIndex,
    record::{Qos, SubscriptionRecord},
};

/// The subscription index for clean-session clients.
#[derive(Default)]
pub struct EphemeralIndex {
    inner: LocalTopicIndex,
}

impl EphemeralIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `client_id` to `filter`. Idempotent under repeat delivery.
    pub fn subscribe(&self, client_id: ClientId, filter: TopicFilter, qos: Qos) {
        self.inner.subscribe(client_id, filter, qos);
    }

    /// Unsubscribes `client_id` from `filter`. A no-op if it was not subscribed.
    pub fn unsubscribe(&self, client_id: ClientId, filter: &TopicFilter) {
        self.inner.unsubscribe(client_id, filter);
    }

    /// Removes every subscription held by `client_id`, e.g. on disconnect.
    pub fn clear_client(&self, client_id: ClientId) -> Vec<TopicFilter> {
        self.inner.clear_client(client_id)
    }

    /// Removes `filter`'s subscriber list entirely, for every client that held it.
    ///
    /// Applies an inbound `DEL_TOPIC` gossip event: every affected client is discovered
    /// by walking `filter`'s own subscriber list, never by trusting a `client_id` carried
    /// on the event (see [`crate::cluster::ClusterAgent`]).
    pub fn remove_topic_everywhere(&self, filter: &TopicFilter) {
        self.inner.remove_topic_everywhere(filter);
    }

    /// Returns every subscription record whose filter matches `topic`.
    #[must_use]
    pub fn matching_records(&self, topic: &Topic) -> Vec<SubscriptionRecord> {
        self.inner.matching_records(topic)
    }

    /// Returns the filters `client_id` is currently subscribed to.
    #[must_use]
    pub fn client_topics(&self, client_id: ClientId) -> Vec<TopicFilter> {
        self.inner.client_topics(client_id)
    }

    #[must_use]
    pub fn is_subscribed(&self, client_id: ClientId, filter: &TopicFilter) -> bool {
        self.inner.is_subscribed(client_id, filter)
    }
}
