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

//! The subscription record and its quality-of-service metadata.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::identifiers::{ClientId, TopicFilter};

/// MQTT quality-of-service level.
///
/// Serializes and deserializes as its raw numeric byte (`0`/`1`/`2`), not its variant
/// name, so the wire format matches across independently-written codecs rather than
/// only round-tripping against this crate's own `serde_json::to_string`/`from_str`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl From<Qos> for u8 {
    fn from(value: Qos) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Qos {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => anyhow::bail!("invalid QoS byte: {other}"),
        }
    }
}

/// A single client's subscription to a topic filter.
///
/// Identity is `(client_id, topic_filter)`: [`PartialEq`], [`Eq`] and [`Hash`] consider
/// only those two fields, so a set keyed on this type naturally de-duplicates repeat
/// subscribes from the same client to the same filter. The QoS is mutable metadata on
/// top of that identity, held in an atomic so it can be updated through a shared
/// reference (e.g. a `dashmap::DashSet::get` guard) without requiring a fresh insert.
#[derive(Debug)]
pub struct SubscriptionRecord {
    client_id: ClientId,
    topic_filter: TopicFilter,
    qos: AtomicU8,
}

impl SubscriptionRecord {
    /// Creates a new [`SubscriptionRecord`].
    #[must_use]
    pub fn new(client_id: ClientId, topic_filter: TopicFilter, qos: Qos) -> Self {
        Self {
            client_id,
            topic_filter,
            qos: AtomicU8::new(qos as u8),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[must_use]
    pub fn topic_filter(&self) -> &TopicFilter {
        &self.topic_filter
    }

    #[must_use]
    pub fn qos(&self) -> Qos {
        Qos::try_from(self.qos.load(Ordering::Relaxed)).unwrap_or(Qos::AtMostOnce)
    }

    pub fn set_qos(&self, qos: Qos) {
        self.qos.store(qos as u8, Ordering::Relaxed);
    }
}

impl Clone for SubscriptionRecord {
    fn clone(&self) -> Self {
        Self::new(self.client_id, self.topic_filter.clone(), self.qos())
    }
}

impl PartialEq for SubscriptionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id && self.topic_filter == other.topic_filter
    }
}

impl Eq for SubscriptionRecord {}

impl std::hash::Hash for SubscriptionRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.client_id.hash(state);
        self.topic_filter.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_qos() {
        let a = SubscriptionRecord::new(ClientId::new("c1"), TopicFilter::new("a/b"), Qos::AtMostOnce);
        let b = SubscriptionRecord::new(ClientId::new("c1"), TopicFilter::new("a/b"), Qos::ExactlyOnce);
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_qos_mutates_in_place() {
        let r = SubscriptionRecord::new(ClientId::new("c1"), TopicFilter::new("a/b"), Qos::AtMostOnce);
        assert_eq!(r.qos(), Qos::AtMostOnce);
        r.set_qos(Qos::ExactlyOnce);
        assert_eq!(r.qos(), Qos::ExactlyOnce);
    }

    #[test]
    fn test_qos_serializes_as_numeric_byte_not_variant_name() {
        assert_eq!(serde_json::to_string(&Qos::ExactlyOnce).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Qos>("1").unwrap(), Qos::AtLeastOnce);
        assert!(serde_json::from_str::<Qos>("9").is_err());
    }

    #[test]
    fn test_qos_roundtrip() {
        for raw in 0u8..=2 {
            assert_eq!(Qos::try_from(raw).unwrap() as u8, raw);
        }
        assert!(Qos::try_from(3).is_err());
    }
}
