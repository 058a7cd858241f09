//! In-process cache store.
//!
//! Keys are laid out exactly as in the persistent backends, in one ordered
//! map behind a single lock. Every operation holds the lock for its whole
//! namespace read or mutation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chime_core::{CacheError, MemberId, ScenarioId};
use tokio::sync::RwLock;

use super::keys::{CacheCollection, NamespaceKey};
use super::traits::{CacheStore, EntryLookup, NamespaceSnapshot};
use super::version::VersionToken;

/// Cache store backed by an in-memory ordered map.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, tokens included.
    pub async fn key_count(&self) -> usize {
        self.data.read().await.len()
    }

    fn prefixed<'a>(
        data: &'a BTreeMap<String, String>,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
        data.range(prefix.to_string()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let data = self.data.read().await;

        let Some(version) = data.get(&ns.etag_key()) else {
            return Ok(None);
        };
        let prefix = ns.entry_prefix();
        let entries = Self::prefixed(&data, &prefix)
            .map(|(_, value)| value.clone())
            .collect();

        Ok(Some(NamespaceSnapshot {
            version: VersionToken::from_stored(version.clone()),
            entries,
        }))
    }

    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let data = self.data.read().await;
        Ok(data.get(&ns.etag_key()).cloned().map(VersionToken::from_stored))
    }

    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let data = self.data.read().await;

        if !data.contains_key(&ns.etag_key()) {
            return Ok(EntryLookup::NoNamespace);
        }
        Ok(match data.get(&ns.entry_key(scenario_id)) {
            Some(value) => EntryLookup::Found(value.clone()),
            None => EntryLookup::Missing,
        })
    }

    async fn write_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        value: String,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut data = self.data.write().await;

        let etag_key = ns.etag_key();
        if !data.contains_key(&etag_key) {
            return Ok(false);
        }
        data.insert(ns.entry_key(scenario_id), value);
        data.insert(etag_key, version.as_str().to_string());
        Ok(true)
    }

    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut data = self.data.write().await;

        let etag_key = ns.etag_key();
        if !data.contains_key(&etag_key) {
            return Ok(false);
        }
        data.remove(&ns.entry_key(scenario_id));
        data.insert(etag_key, version.as_str().to_string());
        Ok(true)
    }

    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut data = self.data.write().await;

        let prefix = ns.entry_prefix();
        let stale: Vec<String> = Self::prefixed(&data, &prefix)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            data.remove(&key);
        }
        for (scenario_id, value) in entries {
            data.insert(ns.entry_key(scenario_id), value);
        }
        data.insert(ns.etag_key(), version.as_str().to_string());
        Ok(())
    }

    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut data = self.data.write().await;

        let prefix = ns.entry_prefix();
        let keys: Vec<String> = Self::prefixed(&data, &prefix)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            data.remove(&key);
        }
        Ok(data.remove(&ns.etag_key()).is_some())
    }

    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        let prefix = collection.prefix();
        let mut data = self.data.write().await;

        let keys: Vec<String> = Self::prefixed(&data, &prefix)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            data.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
