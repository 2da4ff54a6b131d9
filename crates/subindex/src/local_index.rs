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

//! A purely local, fully in-memory topic index.
//!
//! Shared by [`crate::ephemeral::EphemeralIndex`] and [`crate::sys::SysTopicIndex`], and
//! used as the inner-cache mirror of [`crate::persistent::PersistentIndex`]. All three
//! need the same three-map shape and the same consistency invariants; only the
//! surrounding type distinguishes "never persisted, never gossiped" (ephemeral, sys) from
//! "mirrors the remote store, kept warm by cluster gossip" (persistent's cache).
//!
//! Concurrency is provided entirely by `dashmap`'s internal striping: no map here is ever
//! wrapped in an outer lock, so a lookup never blocks behind a concurrent subscribe.

use dashmap::{DashMap, DashSet};

use crate::{
    identifiers::{ClientId, TopicFilter},
    matching,
    record::{Qos, SubscriptionRecord},
};

/// A local, lock-free (beyond dashmap's internal stripes) three-map topic index.
#[derive(Default)]
pub(crate) struct LocalTopicIndex {
    /// The set of topic filters with at least one subscriber (invariant: non-empty entry
    /// in `topic_clients` implies membership here, and vice versa).
    topics: DashSet<TopicFilter>,
    /// Topic filter -> the set of subscription records naming it.
    topic_clients: DashMap<TopicFilter, DashSet<SubscriptionRecord>>,
    /// Client -> the set of topic filters it is subscribed to.
    client_topics: DashMap<ClientId, DashSet<TopicFilter>>,
}

impl LocalTopicIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds or updates a subscription. Idempotent: re-subscribing the same
    /// `(client_id, topic_filter)` pair updates the stored QoS in place rather than
    /// creating a duplicate entry.
    pub(crate) fn subscribe(&self, client_id: ClientId, filter: TopicFilter, qos: Qos) {
        {
            let clients = self
                .topic_clients
                .entry(filter.clone())
                .or_insert_with(DashSet::new);
            let probe = SubscriptionRecord::new(client_id, filter.clone(), qos);
            if let Some(existing) = clients.get(&probe) {
                existing.set_qos(qos);
            } else {
                clients.insert(probe);
            }
        }
        self.topics.insert(filter.clone());
        self.client_topics
            .entry(client_id)
            .or_insert_with(DashSet::new)
            .insert(filter);
    }

    /// Removes a single subscription. A no-op if it did not exist.
    pub(crate) fn unsubscribe(&self, client_id: ClientId, filter: &TopicFilter) {
        let mut topic_now_empty = false;
        if let Some(clients) = self.topic_clients.get(filter) {
            let probe = SubscriptionRecord::new(client_id, filter.clone(), Qos::AtMostOnce);
            clients.remove(&probe);
            topic_now_empty = clients.is_empty();
        }
        if topic_now_empty {
            self.topic_clients.remove(filter);
            self.topics.remove(filter);
        }

        if let Some(filters) = self.client_topics.get(&client_id) {
            filters.remove(filter);
            let client_now_empty = filters.is_empty();
            drop(filters);
            if client_now_empty {
                self.client_topics.remove(&client_id);
            }
        }
    }

    /// Removes every subscription for `client_id`, returning the filters it had been
    /// subscribed to.
    pub(crate) fn clear_client(&self, client_id: ClientId) -> Vec<TopicFilter> {
        let Some((_, filters)) = self.client_topics.remove(&client_id) else {
            return Vec::new();
        };
        let removed: Vec<TopicFilter> = filters.iter().map(|f| f.clone()).collect();
        for filter in &removed {
            if let Some(clients) = self.topic_clients.get(filter) {
                let probe = SubscriptionRecord::new(client_id, filter.clone(), Qos::AtMostOnce);
                clients.remove(&probe);
                let now_empty = clients.is_empty();
                drop(clients);
                if now_empty {
                    self.topic_clients.remove(filter);
                    self.topics.remove(filter);
                }
            }
        }
        removed
    }

    /// Removes a topic filter's subscriber list entirely, and for every client that had
    /// been subscribed to it, removes it from that client's own topic set too.
    ///
    /// Used to apply an inbound `DEL_TOPIC` gossip event: the event names only the topic,
    /// so every affected client is discovered by walking this filter's own subscriber
    /// list, never by trusting a `client_id` carried on the event.
    pub(crate) fn remove_topic_everywhere(&self, filter: &TopicFilter) {
        if let Some((_, clients)) = self.topic_clients.remove(filter) {
            for record in clients.iter() {
                let client_id = record.client_id();
                if let Some(filters) = self.client_topics.get(&client_id) {
                    filters.remove(filter);
                    let now_empty = filters.is_empty();
                    drop(filters);
                    if now_empty {
                        self.client_topics.remove(&client_id);
                    }
                }
            }
        }
        self.topics.remove(filter);
    }

    /// Returns every subscription record whose filter matches `topic`.
    ///
    /// A linear scan over the set of distinct filters rather than a trie: simple, and
    /// fast enough given filter-set sizes stay in the thousands.
    pub(crate) fn matching_records(&self, topic: &crate::identifiers::Topic) -> Vec<SubscriptionRecord> {
        let mut out = Vec::new();
        let filters: Vec<TopicFilter> = self.topics.iter().map(|f| f.clone()).collect();
        for filter in &filters {
            if matching::is_match(filter, topic) {
                if let Some(clients) = self.topic_clients.get(filter) {
                    out.extend(clients.iter().map(|r| r.clone()));
                }
            }
        }
        out
    }

    /// Returns the set of topic filters `client_id` is currently subscribed to.
    pub(crate) fn client_topics(&self, client_id: ClientId) -> Vec<TopicFilter> {
        self.client_topics
            .get(&client_id)
            .map(|filters| filters.iter().map(|f| f.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `client_id` is subscribed to `filter`.
    pub(crate) fn is_subscribed(&self, client_id: ClientId, filter: &TopicFilter) -> bool {
        self.client_topics
            .get(&client_id)
            .is_some_and(|filters| filters.contains(filter))
    }

    #[cfg(test)]
    pub(crate) fn topic_count(&self) -> usize {
        self.topics.len()
    }

    #[cfg(test)]
    pub(crate) fn client_count(&self) -> usize {
        self.client_topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Topic;

    fn cid(s: &str) -> ClientId {
        ClientId::new(s)
    }

    fn filt(s: &str) -> TopicFilter {
        TopicFilter::new(s)
    }

    #[test]
    fn test_subscribe_then_unsubscribe_is_empty() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("a/b"), Qos::AtMostOnce);
        assert_eq!(idx.topic_count(), 1);
        assert_eq!(idx.client_count(), 1);

        idx.unsubscribe(cid("c1"), &filt("a/b"));
        assert_eq!(idx.topic_count(), 0);
        assert_eq!(idx.client_count(), 0);
    }

    #[test]
    fn test_resubscribe_updates_qos_without_duplicating() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("a/b"), Qos::AtMostOnce);
        idx.subscribe(cid("c1"), filt("a/b"), Qos::ExactlyOnce);

        let records = idx.matching_records(&Topic::new("a/b"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qos(), Qos::ExactlyOnce);
    }

    #[test]
    fn test_matching_records_with_wildcards() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("sport/+/player"), Qos::AtMostOnce);
        idx.subscribe(cid("c2"), filt("sport/#"), Qos::AtMostOnce);

        let records = idx.matching_records(&Topic::new("sport/tennis/player"));
        let clients: Vec<ClientId> = records.iter().map(|r| r.client_id()).collect();
        assert_eq!(clients.len(), 2);
        assert!(clients.contains(&cid("c1")));
        assert!(clients.contains(&cid("c2")));
    }

    #[test]
    fn test_clear_client_removes_all_its_topics() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce);
        idx.subscribe(cid("c1"), filt("b"), Qos::AtMostOnce);
        idx.subscribe(cid("c2"), filt("a"), Qos::AtMostOnce);

        let removed = idx.clear_client(cid("c1"));
        assert_eq!(removed.len(), 2);
        assert!(!idx.is_subscribed(cid("c1"), &filt("a")));
        // c2 is still subscribed to "a".
        assert_eq!(idx.matching_records(&Topic::new("a")).len(), 1);
    }

    #[test]
    fn test_remove_topic_everywhere_uses_topics_own_subscriber_list() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("a/#"), Qos::AtMostOnce);
        idx.subscribe(cid("c2"), filt("a/#"), Qos::AtMostOnce);
        idx.subscribe(cid("c1"), filt("b"), Qos::AtMostOnce);

        // The event naming "a/#" carries no client_id of its own in this call; every
        // subscriber discovered via the topic's own list must be cleaned up.
        idx.remove_topic_everywhere(&filt("a/#"));

        assert!(!idx.is_subscribed(cid("c1"), &filt("a/#")));
        assert!(!idx.is_subscribed(cid("c2"), &filt("a/#")));
        // Unrelated subscriptions for the same client are untouched.
        assert!(idx.is_subscribed(cid("c1"), &filt("b")));
    }

    #[test]
    fn test_remove_topic_everywhere_idempotent() {
        let idx = LocalTopicIndex::new();
        idx.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce);
        idx.remove_topic_everywhere(&filt("a"));
        idx.remove_topic_everywhere(&filt("a"));
        assert_eq!(idx.topic_count(), 0);
    }
}
