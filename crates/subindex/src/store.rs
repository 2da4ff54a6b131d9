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

//! The abstract remote key/value store [`crate::persistent::PersistentIndex`] is backed
//! by, plus an in-memory implementation for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;

/// The set of logical operations [`crate::persistent::PersistentIndex`] needs from a
/// remote store: string sets and string hashes, keyed by an opaque string the caller
/// constructs (this crate never assumes a particular key-naming scheme beyond what it
/// generates for its own three structures).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn set_delete(&self, key: &str) -> Result<(), StoreError>;

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hash_remove(&self, key: &str, field: &str) -> Result<(), StoreError>;
    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// An in-memory [`RemoteStore`], for tests and for single-process deployments that do
/// not need durability across restarts.
#[derive(Default)]
pub struct InMemoryStore {
    sets: DashMap<String, std::collections::HashSet<String>>,
    hashes: DashMap<String, HashMap<String, String>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_delete(&self, key: &str) -> Result<(), StoreError> {
        self.sets.remove(key);
        Ok(())
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hashes
            .entry(key.to_owned())
            .or_default()
            .insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    async fn hash_remove(&self, key: &str, field: &str) -> Result<(), StoreError> {
        if let Some(mut map) = self.hashes.get_mut(key) {
            map.remove(field);
        }
        Ok(())
    }

    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .hashes
            .get(key)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_add_remove() {
        let store = InMemoryStore::new();
        store.set_add("k", "a").await.unwrap();
        store.set_add("k", "b").await.unwrap();
        let mut members = store.set_members("k").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        store.set_remove("k", "a").await.unwrap();
        assert_eq!(store.set_members("k").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_hash_put_remove() {
        let store = InMemoryStore::new();
        store.hash_put("k", "f1", "v1").await.unwrap();
        store.hash_put("k", "f2", "v2").await.unwrap();
        assert_eq!(store.hash_entries("k").await.unwrap().len(), 2);

        store.hash_remove("k", "f1").await.unwrap();
        let entries = store.hash_entries("k").await.unwrap();
        assert_eq!(entries, vec![("f2".to_string(), "v2".to_string())]);
    }
}
