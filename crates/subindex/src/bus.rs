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

//! The abstract named pub/sub bus [`crate::cluster::ClusterAgent`] gossips subscription
//! events over, plus an in-memory implementation for tests and single-process
//! multi-"node" simulation. A production deployment supplies its own [`Bus`]
//! implementation (e.g. over a message broker's own internal topic, or Redis pub/sub);
//! wiring one up is outside this crate's scope.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use crate::error::BusError;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An abstract named publish/subscribe channel.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publishes an opaque payload to `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribes to `channel`, returning a handle to receive subsequent payloads.
    fn subscribe(&self, channel: &str) -> BusSubscription;
}

/// A live subscription to a [`Bus`] channel.
pub struct BusSubscription {
    stream: BroadcastStream<Vec<u8>>,
}

impl BusSubscription {
    /// Awaits the next payload published to this channel, skipping over any messages
    /// missed due to receiver lag rather than treating lag as a hard error.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.stream.next().await {
                Some(Ok(payload)) => return Some(payload),
                Some(Err(_lagged)) => continue,
                None => return None,
            }
        }
    }
}

/// An in-memory [`Bus`] over `tokio::sync::broadcast`, one channel per distinct name.
pub struct InMemoryBus {
    channels: DashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // No subscribers is not an error: a fresh node with nothing listening yet should
        // not make every publish on an established cluster fail.
        let _ = self.sender_for(channel).send(payload);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> BusSubscription {
        BusSubscription {
            stream: BroadcastStream::new(self.sender_for(channel).subscribe()),
        }
    }
}
