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

//! Error types.
//!
//! [`StoreError`] surfaces to callers verbatim: a partial failure across the remote
//! store's three writes in a persistent subscribe names the failed sub-operations in its
//! `reason` rather than getting a distinct type, since per §7 it "is surfaced as a
//! StoreError" and the caller's remedy, retrying the whole operation, is idempotent and
//! the same either way. [`BusError`], [`DecodeError`] and [`ProtocolError`] never
//! surface: cluster-gossip code logs them and moves on, since the remote store remains
//! the authoritative source of truth for persistent subscriptions regardless of gossip
//! health.

use thiserror::Error;

/// An error from the abstract remote key/value store backing [`crate::persistent::PersistentIndex`].
#[derive(Debug, Error)]
#[error("remote store operation '{operation}' failed: {reason}")]
pub struct StoreError {
    pub operation: String,
    pub reason: String,
}

/// An error publishing to or reading from the abstract cluster gossip bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus publish to channel '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },

    #[error("bus subscribe to channel '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },
}

/// An inbound cluster message could not be decoded by the configured codec.
#[derive(Debug, Error)]
#[error("failed to decode inbound cluster message: {0}")]
pub struct DecodeError(pub String);

/// An inbound cluster message decoded successfully but violated the gossip protocol
/// (e.g. an unrecognised event type byte).
#[derive(Debug, Error)]
#[error("protocol violation in inbound cluster message: {0}")]
pub struct ProtocolError(pub String);

/// The error type returned by [`crate::service::SubscriptionService`]'s public methods.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid identifier or topic: {0}")]
    Validation(String),
}

impl From<anyhow::Error> for SubscriptionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
