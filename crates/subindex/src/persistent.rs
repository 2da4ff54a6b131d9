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

//! Durable-session subscription index, backed by an abstract [`RemoteStore`].
//!
//! Mirrors three logical structures in the remote store:
//!
//! - `TopicSet`: the set of all persistent topic filters with at least one subscriber
//!   (invariant **P1**: every filter named in `TopicHash` appears here).
//! - `TopicHash`: per filter, a hash of `client_id -> qos`.
//! - `ClientTopicSet`: per client, the set of filters it is subscribed to (invariant
//!   **P2**: consistent with the `(filter, client)` pairs implied by `TopicHash`).
//!
//! An optional inner cache mirrors these locally (the same [`LocalTopicIndex`] ephemeral
//! and sys indices use) so that matching a publish does not need a remote round trip on
//! the hot path; the cache is kept warm purely by inbound cluster gossip, never written
//! to directly by this index's own mutating methods beyond the write that originates it.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::{
    config::SubIndexConfig,
    error::StoreError,
    identifiers::{ClientId, Topic, TopicFilter},
    local_index::LocalTopicIndex,
    matching,
    record::{Qos, SubscriptionRecord},
    store::RemoteStore,
};

/// Upper bound on concurrent `TopicHash[t]` reads issued by an uncached [`PersistentIndex::matching_records`].
const MAX_CONCURRENT_HASH_READS: usize = 16;

/// The durable-session subscription index.
pub struct PersistentIndex<S: RemoteStore> {
    store: Arc<S>,
    cache: Option<LocalTopicIndex>,
    topic_set_key: String,
    topic_prefix: String,
    client_topics_prefix: String,
}

impl<S: RemoteStore> PersistentIndex<S> {
    /// Creates a new [`PersistentIndex`] over `store`, with the remote-store key names
    /// read from `config`. When `config.enable_inner_cache` is set, an in-memory mirror
    /// is maintained; call [`Self::hydrate_cache`] once at startup to populate it from
    /// whatever durable subscriptions already exist.
    #[must_use]
    pub fn new(store: Arc<S>, config: &SubIndexConfig) -> Self {
        Self {
            store,
            cache: config.enable_inner_cache.then(LocalTopicIndex::new),
            topic_set_key: config.topic_set_key.clone(),
            topic_prefix: config.topic_prefix.clone(),
            client_topics_prefix: config.client_topics_prefix.clone(),
        }
    }

    fn topic_hash_key(&self, filter: &TopicFilter) -> String {
        format!("{}{}", self.topic_prefix, filter)
    }

    fn client_topic_set_key(&self, client_id: ClientId) -> String {
        format!("{}{}", self.client_topics_prefix, client_id)
    }

    pub(crate) fn cache(&self) -> Option<&LocalTopicIndex> {
        self.cache.as_ref()
    }

    /// Populates the inner cache from the remote store. A no-op if no cache is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote store cannot be read.
    pub async fn hydrate_cache(&self) -> Result<(), StoreError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        for filter_str in self.store.set_members(&self.topic_set_key).await? {
            let Ok(filter) = TopicFilter::new_checked(&filter_str) else {
                log::warn!("skipping malformed persisted topic filter '{filter_str}' during cache hydration");
                continue;
            };
            for (client_str, qos_str) in self.store.hash_entries(&self.topic_hash_key(&filter)).await? {
                let Ok(client_id) = ClientId::new_checked(&client_str) else {
                    continue;
                };
                let qos = qos_str.parse::<u8>().ok().and_then(|b| Qos::try_from(b).ok()).unwrap_or(Qos::AtMostOnce);
                cache.subscribe(client_id, filter.clone(), qos);
            }
        }
        Ok(())
    }

    /// Adds a durable subscription. The three underlying writes are issued concurrently;
    /// if any fail, the whole operation is reported as a single [`StoreError`] naming
    /// the failed sub-operation(s) in its `reason`, so a caller's retry (itself
    /// idempotent, since every underlying write is a set/hash upsert) can heal a state
    /// where only some of the three succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the underlying remote store writes fail.
    pub async fn add(&self, client_id: ClientId, filter: TopicFilter, qos: Qos) -> Result<(), StoreError> {
        let (r1, r2, r3) = tokio::join!(
            self.store.set_add(&self.topic_set_key, filter.as_str()),
            self.store
                .hash_put(&self.topic_hash_key(&filter), client_id.as_str(), &(qos as u8).to_string()),
            self.store.set_add(&self.client_topic_set_key(client_id), filter.as_str()),
        );
        collect_partial_failures("subscribe", [r1, r2, r3])?;

        if let Some(cache) = &self.cache {
            cache.subscribe(client_id, filter, qos);
        }
        Ok(())
    }

    /// Removes a durable subscription.
    ///
    /// This does *not* prune `filter` from the global topic set
    /// even once its hash becomes empty: the set is pruned only by an explicit
    /// [`Self::remove_topic_everywhere`] call, driven by an inbound `DEL_TOPIC` gossip
    /// event (see [`crate::cluster`]). Leaving an empty hash behind is harmless: it
    /// simply yields no records the next time it is matched.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the underlying remote store writes fail.
    pub async fn remove(&self, client_id: ClientId, filter: &TopicFilter) -> Result<(), StoreError> {
        let (r1, r2) = tokio::join!(
            self.store.hash_remove(&self.topic_hash_key(filter), client_id.as_str()),
            self.store.set_remove(&self.client_topic_set_key(client_id), filter.as_str()),
        );
        collect_partial_failures("unsubscribe", [r1, r2])?;

        if let Some(cache) = &self.cache {
            cache.unsubscribe(client_id, filter);
        }
        Ok(())
    }

    /// Removes every durable subscription held by `client_id`, returning the filters it
    /// had been subscribed to.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote store cannot be read or written.
    pub async fn clear_client(&self, client_id: ClientId) -> Result<Vec<TopicFilter>, StoreError> {
        let filters = self.client_topics(client_id).await?;
        for filter in &filters {
            self.remove(client_id, filter).await?;
        }
        self.store.set_delete(&self.client_topic_set_key(client_id)).await?;
        Ok(filters)
    }

    /// Removes `filter` from the global topic set (best-effort: logged, not propagated,
    /// on failure) and from the inner cache if enabled. The designated pruner for a
    /// topic that an administrative path has determined has no subscribers anywhere;
    /// never called autonomously by [`Self::remove`].
    pub async fn remove_topic_everywhere(&self, filter: &TopicFilter) {
        if let Err(err) = self.store.set_remove(&self.topic_set_key, filter.as_str()).await {
            log::warn!("best-effort removal of topic '{filter}' from the remote topic set failed: {err}");
        }
        if let Some(cache) = &self.cache {
            cache.remove_topic_everywhere(filter);
        }
    }

    /// Returns the filters `client_id` is currently subscribed to.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote store cannot be read.
    pub async fn client_topics(&self, client_id: ClientId) -> Result<Vec<TopicFilter>, StoreError> {
        if let Some(cache) = &self.cache {
            return Ok(cache.client_topics(client_id));
        }
        Ok(self
            .store
            .set_members(&self.client_topic_set_key(client_id))
            .await?
            .into_iter()
            .filter_map(|s| TopicFilter::new_checked(&s).ok())
            .collect())
    }

    /// Returns every subscription record whose filter matches `topic`.
    ///
    /// Serves from the inner cache when enabled; otherwise falls back to scanning the
    /// remote `TopicSet` and reading each matching filter's hash. Matching filters' hash
    /// reads are issued concurrently (bounded by [`MAX_CONCURRENT_HASH_READS`]), since
    /// this path sits behind every uncached publish lookup and a strictly sequential
    /// round trip per matching filter would scale badly with a wide subscriber base.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote store cannot be read.
    pub async fn matching_records(&self, topic: &Topic) -> Result<Vec<SubscriptionRecord>, StoreError> {
        if let Some(cache) = &self.cache {
            return Ok(cache.matching_records(topic));
        }

        let matching_filters: Vec<TopicFilter> = self
            .store
            .set_members(&self.topic_set_key)
            .await?
            .into_iter()
            .filter_map(|s| TopicFilter::new_checked(&s).ok())
            .filter(|filter| matching::is_match(filter, topic))
            .collect();

        let hashes: Vec<Result<(TopicFilter, Vec<(String, String)>), StoreError>> = stream::iter(matching_filters)
            .map(|filter| async move {
                let entries = self.store.hash_entries(&self.topic_hash_key(&filter)).await?;
                Ok((filter, entries))
            })
            .buffer_unordered(MAX_CONCURRENT_HASH_READS)
            .collect()
            .await;

        let mut out = Vec::new();
        for result in hashes {
            let (filter, entries) = result?;
            for (client_str, qos_str) in entries {
                let Ok(client_id) = ClientId::new_checked(&client_str) else {
                    continue;
                };
                let qos = qos_str.parse::<u8>().ok().and_then(|b| Qos::try_from(b).ok()).unwrap_or(Qos::AtMostOnce);
                out.push(SubscriptionRecord::new(client_id, filter.clone(), qos));
            }
        }
        Ok(out)
    }
}

fn collect_partial_failures<const N: usize>(
    operation: &str,
    results: [Result<(), StoreError>; N],
) -> Result<(), StoreError> {
    let failures: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.err().map(|e| e.to_string()))
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(StoreError {
            operation: operation.to_owned(),
            reason: failures.join("; "),
        })
    }
}
