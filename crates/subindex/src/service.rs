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

//! The public facade composing the ephemeral, persistent and `$SYS` indices with the
//! cluster agent behind a small set of methods on a shared `Arc`, so it can serve
//! genuinely concurrent callers rather than a single thread-local owner.

use std::{collections::HashSet, sync::Arc};

use crate::{
    bus::Bus,
    cluster::{ClientSubOrUnsubMsg, ClusterAgent, Codec},
    config::SubIndexConfig,
    ephemeral::EphemeralIndex,
    error::SubscriptionError,
    identifiers::{ClientId, Topic, TopicFilter},
    persistent::PersistentIndex,
    record::{Qos, SubscriptionRecord},
    store::RemoteStore,
    sys::SysTopicIndex,
};

/// The subscription index's public facade.
pub struct SubscriptionService<S: RemoteStore, B: Bus, C: Codec> {
    ephemeral: Arc<EphemeralIndex>,
    sys: SysTopicIndex,
    persistent: Arc<PersistentIndex<S>>,
    cluster: Option<Arc<ClusterAgent<S, B, C>>>,
}

impl<S, B, C> SubscriptionService<S, B, C>
where
    S: RemoteStore + 'static,
    B: Bus + 'static,
    C: Codec + 'static,
{
    /// Builds a new service. When `config.enable_inner_cache` is set, the persistent
    /// index's cache is hydrated from `store` before this returns, since serving lookups
    /// from a half-populated cache would silently drop subscribers, so construction
    /// blocks until hydration completes. When `config.enable_cluster` is set, a
    /// [`ClusterAgent`] is constructed over `bus` and `codec`; call
    /// [`Self::spawn_cluster_listener`] once the service is wrapped in an `Arc` to start
    /// consuming inbound gossip.
    ///
    /// # Errors
    ///
    /// Returns an error if cache hydration fails to read the remote store.
    pub async fn new(store: Arc<S>, bus: Arc<B>, codec: Arc<C>, config: SubIndexConfig) -> Result<Self, SubscriptionError> {
        let persistent = Arc::new(PersistentIndex::new(store, &config));
        if config.enable_inner_cache {
            persistent.hydrate_cache().await?;
        }

        let ephemeral = Arc::new(EphemeralIndex::new());

        let cluster = config.enable_cluster.then(|| {
            Arc::new(ClusterAgent::new(
                config.broker_id,
                config.cluster_channel.clone(),
                bus,
                codec,
                ephemeral.clone(),
                persistent.clone(),
            ))
        });

        Ok(Self {
            ephemeral,
            sys: SysTopicIndex::new(),
            persistent,
            cluster,
        })
    }

    /// Spawns the background task that consumes inbound cluster gossip. Returns `None`
    /// if clustering is disabled.
    pub fn spawn_cluster_listener(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        self.cluster
            .clone()
            .map(|agent| tokio::spawn(async move { agent.run_inbound_loop().await }))
    }

    /// Subscribes `client_id` to `filter`. `clean_session` selects the purely local
    /// ephemeral index over the durable persistent one; either way, a successful local
    /// mutation is gossiped to the cluster (if enabled) so peers converge.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Validation`] if `filter` names a `$SYS` topic (use
    /// [`Self::subscribe_sys`] instead), or [`SubscriptionError::Store`] if a durable
    /// subscribe's remote store write fails.
    pub async fn subscribe(
        &self,
        client_id: ClientId,
        filter: TopicFilter,
        qos: Qos,
        clean_session: bool,
    ) -> Result<(), SubscriptionError> {
        if filter.is_sys() {
            return Err(SubscriptionError::Validation(
                "ordinary subscribe cannot target a $SYS topic filter; use subscribe_sys".to_owned(),
            ));
        }

        if clean_session {
            self.ephemeral.subscribe(client_id, filter.clone(), qos);
            log::trace!("client {client_id} subscribed (ephemeral) to {filter}");
        } else {
            self.persistent.add(client_id, filter.clone(), qos).await?;
        }
        self.gossip(ClientSubOrUnsubMsg::sub(client_id, filter, qos, clean_session)).await;
        Ok(())
    }

    /// Unsubscribes `client_id` from every filter in `topics`. A no-op if `topics` is
    /// empty. `clean_session` selects which index the removal applies to.
    ///
    /// # Errors
    ///
    /// Returns an error if a durable unsubscribe's remote store write fails.
    pub async fn unsubscribe(
        &self,
        client_id: ClientId,
        topics: &[TopicFilter],
        clean_session: bool,
    ) -> Result<(), SubscriptionError> {
        if topics.is_empty() {
            return Ok(());
        }

        for filter in topics {
            if clean_session {
                self.ephemeral.unsubscribe(client_id, filter);
            } else {
                self.persistent.remove(client_id, filter).await?;
            }
        }
        self.gossip(ClientSubOrUnsubMsg::unsub(client_id, topics.to_vec(), clean_session))
            .await;
        Ok(())
    }

    /// Returns every subscription record (ephemeral and persistent) whose filter matches
    /// `topic`. Per-client ordering is not meaningful here; this is a snapshot lookup,
    /// not a delivery queue.
    ///
    /// De-duplicated on `(client_id, topic_filter)`: nothing stops the same client
    /// holding the same filter via an ephemeral subscribe on one connection and a
    /// durable subscribe on another, and the two lanes are queried independently here.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent index has no inner cache and the remote store
    /// cannot be read.
    pub async fn search_subscribe_client_list(&self, topic: &Topic) -> Result<Vec<SubscriptionRecord>, SubscriptionError> {
        let mut records = self.ephemeral.matching_records(topic);
        records.extend(self.persistent.matching_records(topic).await?);

        let mut seen = HashSet::new();
        records.retain(|r| seen.insert((r.client_id(), r.topic_filter().clone())));
        Ok(records)
    }

    /// Removes every subscription (ephemeral and persistent) held by `client_id`, e.g.
    /// on disconnect, gossiping an unsubscribe for each lane that had subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent index's remote store cannot be written.
    pub async fn clear_client_subscriptions(&self, client_id: ClientId) -> Result<(), SubscriptionError> {
        let ephemeral_topics = self.ephemeral.clear_client(client_id);
        if !ephemeral_topics.is_empty() {
            self.gossip(ClientSubOrUnsubMsg::unsub(client_id, ephemeral_topics, true)).await;
        }

        let persistent_topics = self.persistent.clear_client(client_id).await?;
        if !persistent_topics.is_empty() {
            self.gossip(ClientSubOrUnsubMsg::unsub(client_id, persistent_topics, false))
                .await;
        }
        Ok(())
    }

    /// Unsubscribes `client_id` from every filter in `unauthorized` that it is *actually*
    /// currently subscribed to.
    ///
    /// Deliberately intersects `unauthorized` with the client's own current
    /// subscriptions first, rather than unsubscribing every client from each named
    /// filter: the latter would affect every other client subscribed to the same topic,
    /// when only `client_id`'s authorization has changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a durable unsubscribe's remote store write fails.
    pub async fn clear_unauthorized_client_sub(
        &self,
        client_id: ClientId,
        unauthorized: &[TopicFilter],
    ) -> Result<(), SubscriptionError> {
        let persistent_topics = self.persistent.client_topics(client_id).await?;
        let current: HashSet<TopicFilter> = self
            .ephemeral
            .client_topics(client_id)
            .into_iter()
            .chain(persistent_topics)
            .collect();

        let mut revoked_ephemeral = Vec::new();
        let mut revoked_persistent = Vec::new();
        for filter in unauthorized {
            if !current.contains(filter) {
                continue;
            }
            if self.ephemeral.is_subscribed(client_id, filter) {
                self.ephemeral.unsubscribe(client_id, filter);
                revoked_ephemeral.push(filter.clone());
            } else {
                self.persistent.remove(client_id, filter).await?;
                revoked_persistent.push(filter.clone());
            }
        }

        if !revoked_ephemeral.is_empty() {
            self.gossip(ClientSubOrUnsubMsg::unsub(client_id, revoked_ephemeral, true)).await;
        }
        if !revoked_persistent.is_empty() {
            self.gossip(ClientSubOrUnsubMsg::unsub(client_id, revoked_persistent, false))
                .await;
        }
        Ok(())
    }

    /// Subscribes `client_id` to a `$SYS` topic filter. Never persisted, never gossiped.
    pub fn subscribe_sys(&self, client_id: ClientId, filter: TopicFilter, qos: Qos) {
        self.sys.subscribe(client_id, filter, qos);
    }

    /// Unsubscribes `client_id` from a `$SYS` topic filter.
    pub fn unsubscribe_sys(&self, client_id: ClientId, filter: &TopicFilter) {
        self.sys.unsubscribe(client_id, filter);
    }

    /// Returns every subscription record whose `$SYS` filter matches `topic`.
    #[must_use]
    pub fn search_sys_topic_clients(&self, topic: &Topic) -> Vec<SubscriptionRecord> {
        self.sys.matching_records(topic)
    }

    /// Removes every `$SYS` subscription held by `client_id`.
    pub fn clear_client_sys_sub(&self, client_id: ClientId) {
        self.sys.clear_client(client_id);
    }

    async fn gossip(&self, event: ClientSubOrUnsubMsg) {
        if let Some(cluster) = &self.cluster {
            cluster.publish_event(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bus::InMemoryBus, cluster::JsonCodec, store::InMemoryStore};

    fn cid(s: &str) -> ClientId {
        ClientId::new(s)
    }

    fn filt(s: &str) -> TopicFilter {
        TopicFilter::new(s)
    }

    async fn build_service(config: SubIndexConfig) -> SubscriptionService<InMemoryStore, InMemoryBus, JsonCodec> {
        SubscriptionService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryBus::new()),
            Arc::new(JsonCodec),
            config,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ephemeral_subscribe_and_match() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a/+/c"), Qos::AtMostOnce, true).await.unwrap();

        let records = service.search_subscribe_client_list(&Topic::new("a/b/c")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_id(), cid("c1"));
    }

    #[tokio::test]
    async fn test_search_dedupes_same_client_subscribed_via_both_lanes() {
        // Nothing stops the same client holding the same filter ephemerally (e.g. one
        // connection) and durably (e.g. another); the search must still report it once.
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, true).await.unwrap();
        service.subscribe(cid("c1"), filt("a"), Qos::ExactlyOnce, false).await.unwrap();

        let records = service.search_subscribe_client_list(&Topic::new("a")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_id(), cid("c1"));
    }

    #[tokio::test]
    async fn test_durable_subscribe_and_match() {
        let service = build_service(SubIndexConfig {
            enable_inner_cache: true,
            ..Default::default()
        })
        .await;
        service.subscribe(cid("c1"), filt("a"), Qos::ExactlyOnce, false).await.unwrap();

        let records = service.search_subscribe_client_list(&Topic::new("a")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qos(), Qos::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_qos_not_duplicates() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("t"), Qos::AtMostOnce, false).await.unwrap();
        service.subscribe(cid("c1"), filt("t"), Qos::ExactlyOnce, false).await.unwrap();

        let records = service.search_subscribe_client_list(&Topic::new("t")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qos(), Qos::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_subscribe_then_unsubscribe_restores_prior_state() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("t"), Qos::AtLeastOnce, true).await.unwrap();
        service.unsubscribe(cid("c1"), &[filt("t")], true).await.unwrap();

        assert!(service.search_subscribe_client_list(&Topic::new("t")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_noop_on_empty_topics() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("t"), Qos::AtMostOnce, true).await.unwrap();
        service.unsubscribe(cid("c1"), &[], true).await.unwrap();

        assert_eq!(service.search_subscribe_client_list(&Topic::new("t")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_multiple_topics_in_one_call() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, true).await.unwrap();
        service.subscribe(cid("c1"), filt("b"), Qos::AtMostOnce, true).await.unwrap();

        service.unsubscribe(cid("c1"), &[filt("a"), filt("b")], true).await.unwrap();

        assert!(service.search_subscribe_client_list(&Topic::new("a")).await.unwrap().is_empty());
        assert!(service.search_subscribe_client_list(&Topic::new("b")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_sys_topics() {
        let service = build_service(SubIndexConfig::default()).await;
        let result = service
            .subscribe(cid("c1"), filt("$SYS/broker/clients"), Qos::AtMostOnce, true)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_client_subscriptions_clears_both_indices() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, true).await.unwrap();
        service.subscribe(cid("c1"), filt("b"), Qos::AtMostOnce, false).await.unwrap();

        service.clear_client_subscriptions(cid("c1")).await.unwrap();

        assert!(service.search_subscribe_client_list(&Topic::new("a")).await.unwrap().is_empty());
        assert!(service.search_subscribe_client_list(&Topic::new("b")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_unauthorized_only_affects_named_clients_subscription() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, true).await.unwrap();
        service.subscribe(cid("c2"), filt("a"), Qos::AtMostOnce, true).await.unwrap();

        // "a" is unauthorized for c1 only; c2's subscription to the same topic must survive.
        service
            .clear_unauthorized_client_sub(cid("c1"), &[filt("a")])
            .await
            .unwrap();

        let records = service.search_subscribe_client_list(&Topic::new("a")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_id(), cid("c2"));
    }

    #[tokio::test]
    async fn test_clear_unauthorized_ignores_topics_client_is_not_subscribed_to() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, true).await.unwrap();

        // c1 was never subscribed to "z"; naming it as unauthorized must be a no-op,
        // not an attempt to unsubscribe something that doesn't exist.
        service
            .clear_unauthorized_client_sub(cid("c1"), &[filt("z")])
            .await
            .unwrap();

        assert_eq!(service.search_subscribe_client_list(&Topic::new("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sys_topics_are_isolated_from_ordinary_search() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe_sys(cid("monitor"), filt("$SYS/broker/#"), Qos::AtMostOnce);

        assert!(service
            .search_subscribe_client_list(&Topic::new("$SYS/broker/uptime"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            service.search_sys_topic_clients(&Topic::new("$SYS/broker/uptime")).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_sys_subscribe_via_ordinary_search_stays_empty_but_sys_search_finds_it() {
        let service = build_service(SubIndexConfig::default()).await;
        service.subscribe_sys(cid("c1"), filt("$SYS/broker/uptime"), Qos::AtMostOnce);

        assert!(service
            .search_subscribe_client_list(&Topic::new("$SYS/broker/uptime"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            service.search_sys_topic_clients(&Topic::new("$SYS/broker/uptime")).len(),
            1
        );

        service.clear_client_sys_sub(cid("c1"));
        assert!(service.search_sys_topic_clients(&Topic::new("$SYS/broker/uptime")).is_empty());
    }

    #[tokio::test]
    async fn test_gossip_propagates_durable_subscribe_to_other_nodes_cache() {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(InMemoryBus::new());

        let node_a = Arc::new(
            SubscriptionService::new(
                store.clone(),
                bus.clone(),
                Arc::new(JsonCodec),
                SubIndexConfig {
                    enable_inner_cache: true,
                    enable_cluster: true,
                    broker_id: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap(),
        );
        let node_b = Arc::new(
            SubscriptionService::new(
                Arc::new(InMemoryStore::new()),
                bus,
                Arc::new(JsonCodec),
                SubIndexConfig {
                    enable_inner_cache: true,
                    enable_cluster: true,
                    broker_id: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap(),
        );

        let _listener = node_b.spawn_cluster_listener();

        node_a.subscribe(cid("c1"), filt("a"), Qos::AtMostOnce, false).await.unwrap();

        for _ in 0..100 {
            if !node_b
                .search_subscribe_client_list(&Topic::new("a"))
                .await
                .unwrap()
                .is_empty()
            {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(node_b.search_subscribe_client_list(&Topic::new("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gossip_propagates_ephemeral_subscribe_to_other_nodes_ephemeral_index() {
        let bus = Arc::new(InMemoryBus::new());

        let node_a = Arc::new(
            SubscriptionService::new(
                Arc::new(InMemoryStore::new()),
                bus.clone(),
                Arc::new(JsonCodec),
                SubIndexConfig {
                    enable_cluster: true,
                    broker_id: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap(),
        );
        let node_b = Arc::new(
            SubscriptionService::new(
                Arc::new(InMemoryStore::new()),
                bus,
                Arc::new(JsonCodec),
                SubIndexConfig {
                    enable_cluster: true,
                    broker_id: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap(),
        );

        let _listener = node_b.spawn_cluster_listener();

        node_a.subscribe(cid("c1"), filt("a/+/c"), Qos::AtMostOnce, true).await.unwrap();

        for _ in 0..100 {
            if !node_b
                .search_subscribe_client_list(&Topic::new("a/b/c"))
                .await
                .unwrap()
                .is_empty()
            {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(
            node_b.search_subscribe_client_list(&Topic::new("a/b/c")).await.unwrap().len(),
            1
        );
    }
}
