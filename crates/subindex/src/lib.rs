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

//! A subscription index for an MQTT-style broker: topic-filter matching, ephemeral and
//! durable subscription storage, a `$SYS` sub-index, and cross-node gossip of
//! subscription lifecycle events.
//!
//! [`service::SubscriptionService`] is the composed entry point most embedders want; the
//! other modules are exposed so a broker can wire its own store, bus or codec
//! implementations against [`store::RemoteStore`], [`bus::Bus`] and [`cluster::Codec`].

pub mod bus;
pub mod cluster;
pub mod config;
pub mod error;
pub mod ephemeral;
pub(crate) mod local_index;
pub mod matching;
pub mod identifiers;
pub mod persistent;
pub mod record;
pub mod service;
pub mod store;
pub mod sys;

pub use config::SubIndexConfig;
pub use error::SubscriptionError;
pub use identifiers::{ClientId, Topic, TopicFilter};
pub use record::{Qos, SubscriptionRecord};
pub use service::SubscriptionService;
