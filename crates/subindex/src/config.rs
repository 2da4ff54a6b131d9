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

//! Configuration for [`crate::service::SubscriptionService`].
//!
//! This crate only owns the config struct and its defaults; layering environment
//! variables or a config file on top is the embedding broker's responsibility. A plain
//! config bag is passed in rather than parsed from a file here.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::service::SubscriptionService`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubIndexConfig {
    /// Maintain an in-memory mirror of the persistent index, kept warm by cluster
    /// gossip, so publish-time matching never needs a remote round trip.
    pub enable_inner_cache: bool,

    /// Gossip subscription lifecycle events to other broker nodes over [`crate::bus::Bus`].
    pub enable_cluster: bool,

    /// The bus channel name subscription events are gossiped over.
    pub cluster_channel: String,

    /// This node's identifier, unique per cluster member, carried on every gossiped
    /// envelope so a node can recognise and skip its own echo.
    pub broker_id: u64,

    /// The remote store key naming the global set of persistent topic filters.
    pub topic_set_key: String,

    /// The remote store key prefix for a topic filter's `clientId -> qos` hash.
    pub topic_prefix: String,

    /// The remote store key prefix for a client's set of persistent topic filters.
    pub client_topics_prefix: String,
}

impl Default for SubIndexConfig {
    fn default() -> Self {
        Self {
            enable_inner_cache: false,
            enable_cluster: false,
            cluster_channel: "subindex.cluster.subscriptions".to_owned(),
            broker_id: 0,
            topic_set_key: "subindex:topics".to_owned(),
            topic_prefix: "subindex:topic:".to_owned(),
            client_topics_prefix: "subindex:client:".to_owned(),
        }
    }
}
