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

//! Cross-node gossip of subscription events, keeping every node's ephemeral index and
//! [`crate::persistent::PersistentIndex`] inner cache converged without requiring a
//! remote read on every publish.
//!
//! Each node publishes a [`ClientSubOrUnsubMsg`] wrapped in an [`InternalMessage`]
//! envelope to a shared bus channel whenever it mutates its own subscriptions. Every
//! node (including the originator) receives every message; the originator's own
//! `broker_id` on the envelope lets it recognise and skip its own echo, which is the
//! only loop-suppression this protocol needs since there is no further relay.
//!
//! Handling is idempotent under duplicate or out-of-order delivery: `Sub`/`Unsub` are
//! set operations, and `DelTopic` removing an already-absent filter is a no-op.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use subindex_core::{UUID4, UnixNanos, time::unix_nanos_now};

use crate::{
    bus::Bus,
    ephemeral::EphemeralIndex,
    error::{DecodeError, ProtocolError},
    identifiers::{ClientId, TopicFilter},
    persistent::PersistentIndex,
    record::Qos,
    store::RemoteStore,
};

/// The kind of subscription-lifecycle event being gossiped.
///
/// Serializes and deserializes as its raw numeric byte (`SUB=1`, `UNSUB=2`,
/// `DEL_TOPIC=3` per §4.5), not its variant name, so an independently-written peer
/// codec can interoperate on the numeric `type` the wire contract actually specifies.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventType {
    Sub = 1,
    Unsub = 2,
    DelTopic = 3,
}

impl From<EventType> for u8 {
    fn from(value: EventType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Sub),
            2 => Ok(Self::Unsub),
            3 => Ok(Self::DelTopic),
            other => Err(ProtocolError(format!("unrecognised event type byte: {other}"))),
        }
    }
}

/// A single subscribe, unsubscribe, or topic-deletion event.
///
/// `topic` carries the filter for `Sub` and `DelTopic`; `topics` carries the (possibly
/// multiple) filters for `Unsub`, mirroring the facade's own batched unsubscribe. `qos`
/// is only meaningful for `Sub`. `clean_session` selects which local index (ephemeral or
/// the persistent cache) a `Sub`/`Unsub` applies to; it is ignored by `DelTopic`, which
/// targets both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientSubOrUnsubMsg {
    pub client_id: ClientId,
    pub topic: Option<TopicFilter>,
    pub topics: Option<Vec<TopicFilter>>,
    pub qos: Option<Qos>,
    pub clean_session: bool,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl ClientSubOrUnsubMsg {
    /// Builds a `SUB` event.
    #[must_use]
    pub fn sub(client_id: ClientId, topic: TopicFilter, qos: Qos, clean_session: bool) -> Self {
        Self {
            client_id,
            topic: Some(topic),
            topics: None,
            qos: Some(qos),
            clean_session,
            event_type: EventType::Sub,
        }
    }

    /// Builds an `UNSUB` event covering one or more filters.
    #[must_use]
    pub fn unsub(client_id: ClientId, topics: Vec<TopicFilter>, clean_session: bool) -> Self {
        Self {
            client_id,
            topic: None,
            topics: Some(topics),
            qos: None,
            clean_session,
            event_type: EventType::Unsub,
        }
    }

    /// Builds a `DEL_TOPIC` event: an administrative signal that `topic` has no
    /// subscribers anywhere in the cluster and should be pruned everywhere.
    #[must_use]
    pub fn del_topic(client_id: ClientId, topic: TopicFilter) -> Self {
        Self {
            client_id,
            topic: Some(topic),
            topics: None,
            qos: None,
            clean_session: false,
            event_type: EventType::DelTopic,
        }
    }
}

/// The envelope every gossiped message travels in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InternalMessage {
    pub id: UUID4,
    pub broker_id: u64,
    pub timestamp: UnixNanos,
    pub event: ClientSubOrUnsubMsg,
}

/// A pluggable wire format for [`InternalMessage`].
pub trait Codec: Send + Sync {
    fn encode(&self, msg: &InternalMessage) -> Result<Vec<u8>, DecodeError>;
    fn decode(&self, bytes: &[u8]) -> Result<InternalMessage, DecodeError>;
}

/// The default [`Codec`], using JSON.
#[derive(Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, msg: &InternalMessage) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(msg).map_err(|e| DecodeError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<InternalMessage, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError(e.to_string()))
    }
}

/// Gossips subscription events to and from other broker nodes.
pub struct ClusterAgent<S: RemoteStore, B: Bus, C: Codec> {
    broker_id: u64,
    channel: String,
    bus: Arc<B>,
    codec: Arc<C>,
    ephemeral: Arc<EphemeralIndex>,
    persistent: Arc<PersistentIndex<S>>,
}

impl<S, B, C> ClusterAgent<S, B, C>
where
    S: RemoteStore + 'static,
    B: Bus + 'static,
    C: Codec + 'static,
{
    #[must_use]
    pub fn new(
        broker_id: u64,
        channel: String,
        bus: Arc<B>,
        codec: Arc<C>,
        ephemeral: Arc<EphemeralIndex>,
        persistent: Arc<PersistentIndex<S>>,
    ) -> Self {
        Self {
            broker_id,
            channel,
            bus,
            codec,
            ephemeral,
            persistent,
        }
    }

    /// Publishes a subscription event to the cluster. Bus failures are logged and
    /// swallowed: local state is already correct, so a gossip failure only costs other
    /// nodes a stale cache entry until the next subscribe or cache rebuild, not
    /// correctness.
    pub async fn publish_event(&self, event: ClientSubOrUnsubMsg) {
        let message = InternalMessage {
            id: UUID4::new(),
            broker_id: self.broker_id,
            timestamp: unix_nanos_now(),
            event,
        };

        let bytes = match self.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to encode outbound cluster gossip message: {err}");
                return;
            }
        };

        if let Err(err) = self.bus.publish(&self.channel, bytes).await {
            log::warn!("cluster gossip publish on channel '{}' failed: {err}", self.channel);
        }
    }

    /// Runs the inbound gossip loop until the bus channel closes. Intended to be spawned
    /// as a background task for the lifetime of the node.
    pub async fn run_inbound_loop(self: Arc<Self>) {
        let mut subscription = self.bus.subscribe(&self.channel);
        while let Some(bytes) = subscription.recv().await {
            self.handle_inbound(&bytes).await;
        }
    }

    /// Decodes and applies a single inbound gossip payload. Exposed separately from the
    /// loop so tests can drive it without a running bus task.
    pub async fn handle_inbound(&self, bytes: &[u8]) {
        let message = match self.codec.decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("dropping undecodable cluster gossip message: {err}");
                return;
            }
        };

        if message.broker_id == self.broker_id {
            return; // Our own echo; loop suppression.
        }

        let event = message.event;
        match event.event_type {
            EventType::Sub => {
                let Some(topic) = event.topic else {
                    log::warn!("dropping SUB gossip event with no topic");
                    return;
                };
                let qos = event.qos.unwrap_or(Qos::AtMostOnce);
                if event.clean_session {
                    self.ephemeral.subscribe(event.client_id, topic, qos);
                } else if let Some(cache) = self.persistent.cache() {
                    cache.subscribe(event.client_id, topic, qos);
                }
                // Inner cache disabled and durable: the remote store is already
                // authoritative and will be read on the next local cache miss.
            }
            EventType::Unsub => {
                let Some(topics) = event.topics else {
                    log::warn!("dropping UNSUB gossip event with no topics");
                    return;
                };
                for topic in &topics {
                    if event.clean_session {
                        self.ephemeral.unsubscribe(event.client_id, topic);
                    } else if let Some(cache) = self.persistent.cache() {
                        cache.unsubscribe(event.client_id, topic);
                    }
                }
            }
            EventType::DelTopic => {
                let Some(topic) = event.topic else {
                    log::warn!("dropping DEL_TOPIC gossip event with no topic");
                    return;
                };
                // Every client currently subscribed to this filter is discovered by
                // walking the filter's own subscriber list in each index, not by
                // trusting `event.client_id`: a DEL_TOPIC event describes the topic
                // becoming gone everywhere, not one client's membership in it.
                self.ephemeral.remove_topic_everywhere(&topic);
                self.persistent.remove_topic_everywhere(&topic).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SubIndexConfig, identifiers::Topic, store::InMemoryStore};

    #[test]
    fn test_event_type_serializes_as_numeric_type_field() {
        let event = ClientSubOrUnsubMsg::sub(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtLeastOnce, false);
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], serde_json::json!(1));
        assert!(value.get("event_type").is_none());

        let unsub = ClientSubOrUnsubMsg::unsub(ClientId::new("c1"), vec![TopicFilter::new("a")], true);
        assert_eq!(serde_json::to_value(&unsub).unwrap()["type"], serde_json::json!(2));

        let del = ClientSubOrUnsubMsg::del_topic(ClientId::new("c1"), TopicFilter::new("a"));
        assert_eq!(serde_json::to_value(&del).unwrap()["type"], serde_json::json!(3));
    }

    #[test]
    fn test_event_type_rejects_unrecognised_numeric_type() {
        let bytes = br#"{"client_id":"c1","topic":"a","topics":null,"qos":1,"clean_session":false,"type":9}"#;
        assert!(serde_json::from_slice::<ClientSubOrUnsubMsg>(bytes).is_err());
    }

    fn build_agent() -> (
        Arc<ClusterAgent<InMemoryStore, crate::bus::InMemoryBus, JsonCodec>>,
        Arc<EphemeralIndex>,
        Arc<PersistentIndex<InMemoryStore>>,
    ) {
        let config = SubIndexConfig {
            enable_inner_cache: true,
            ..Default::default()
        };
        let ephemeral = Arc::new(EphemeralIndex::new());
        let persistent = Arc::new(PersistentIndex::new(Arc::new(InMemoryStore::new()), &config));
        let bus = Arc::new(crate::bus::InMemoryBus::new());
        let agent = Arc::new(ClusterAgent::new(
            1,
            "cluster.subscriptions".to_owned(),
            bus,
            Arc::new(JsonCodec),
            ephemeral.clone(),
            persistent.clone(),
        ));
        (agent, ephemeral, persistent)
    }

    fn inbound_bytes(codec: &JsonCodec, broker_id: u64, event: ClientSubOrUnsubMsg) -> Vec<u8> {
        let message = InternalMessage {
            id: UUID4::new(),
            broker_id,
            timestamp: unix_nanos_now(),
            event,
        };
        codec.encode(&message).unwrap()
    }

    #[tokio::test]
    async fn test_own_broker_id_is_suppressed() {
        let (agent, _ephemeral, persistent) = build_agent();
        let codec = JsonCodec;
        let event = ClientSubOrUnsubMsg::sub(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtLeastOnce, false);
        let bytes = inbound_bytes(&codec, 1, event);

        agent.handle_inbound(&bytes).await;

        assert!(persistent.cache().unwrap().matching_records(&Topic::new("a")).is_empty());
    }

    #[tokio::test]
    async fn test_remote_durable_sub_event_populates_cache() {
        let (agent, _ephemeral, persistent) = build_agent();
        let codec = JsonCodec;
        let event = ClientSubOrUnsubMsg::sub(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtLeastOnce, false);
        let bytes = inbound_bytes(&codec, 2, event);

        agent.handle_inbound(&bytes).await;

        assert_eq!(persistent.cache().unwrap().matching_records(&Topic::new("a")).len(), 1);
    }

    #[tokio::test]
    async fn test_remote_ephemeral_sub_event_populates_ephemeral_index_not_cache() {
        let (agent, ephemeral, persistent) = build_agent();
        let codec = JsonCodec;
        let event = ClientSubOrUnsubMsg::sub(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtMostOnce, true);
        let bytes = inbound_bytes(&codec, 2, event);

        agent.handle_inbound(&bytes).await;

        assert_eq!(ephemeral.matching_records(&Topic::new("a")).len(), 1);
        assert!(persistent.cache().unwrap().matching_records(&Topic::new("a")).is_empty());
    }

    #[tokio::test]
    async fn test_remote_unsub_event_with_multiple_topics() {
        let (agent, ephemeral, _persistent) = build_agent();
        let codec = JsonCodec;
        ephemeral.subscribe(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtMostOnce);
        ephemeral.subscribe(ClientId::new("c1"), TopicFilter::new("b"), Qos::AtMostOnce);

        let event = ClientSubOrUnsubMsg::unsub(
            ClientId::new("c1"),
            vec![TopicFilter::new("a"), TopicFilter::new("b")],
            true,
        );
        let bytes = inbound_bytes(&codec, 2, event);
        agent.handle_inbound(&bytes).await;

        assert!(ephemeral.client_topics(ClientId::new("c1")).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sub_delivery_is_idempotent() {
        let (agent, _ephemeral, persistent) = build_agent();
        let codec = JsonCodec;
        let event = ClientSubOrUnsubMsg::sub(ClientId::new("c1"), TopicFilter::new("a"), Qos::AtLeastOnce, false);
        let bytes = inbound_bytes(&codec, 2, event);

        agent.handle_inbound(&bytes).await;
        agent.handle_inbound(&bytes).await;

        assert_eq!(persistent.cache().unwrap().matching_records(&Topic::new("a")).len(), 1);
    }

    #[tokio::test]
    async fn test_del_topic_removes_every_subscriber_from_both_indices() {
        let (agent, ephemeral, persistent) = build_agent();
        ephemeral.subscribe(ClientId::new("c1"), TopicFilter::new("a/#"), Qos::AtMostOnce);
        persistent
            .add(ClientId::new("c2"), TopicFilter::new("a/#"), Qos::AtMostOnce)
            .await
            .unwrap();

        let codec = JsonCodec;
        // A client_id carried on a DEL_TOPIC event must not be trusted as "the"
        // subscriber to clean up; the fix discovers every subscriber from each index's
        // own subscriber list regardless of what (if anything) this field names.
        let event = ClientSubOrUnsubMsg::del_topic(ClientId::new("c1"), TopicFilter::new("a/#"));
        let bytes = inbound_bytes(&codec, 2, event);

        agent.handle_inbound(&bytes).await;

        assert!(ephemeral.matching_records(&Topic::new("a/b")).is_empty());
        assert!(persistent.cache().unwrap().matching_records(&Topic::new("a/b")).is_empty());
        assert!(ephemeral.client_topics(ClientId::new("c1")).is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped_not_panicked() {
        let (agent, _ephemeral, _persistent) = build_agent();
        agent.handle_inbound(b"not json").await;
    }
}
