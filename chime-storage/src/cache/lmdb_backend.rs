//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep the notification
//! cache in a memory-mapped key-value file.
//!
//! # Consistency
//!
//! - Every namespace read runs inside one read transaction, so the token and
//!   the entries come from the same MVCC snapshot.
//! - Every mutation (entries plus token) commits in one write transaction.
//!   LMDB allows a single writer at a time, which makes the
//!   "only if the namespace exists" checks atomic.

use std::path::Path;

use async_trait::async_trait;
use chime_core::{CacheError, MemberId, ScenarioId};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};

use super::keys::{CacheCollection, NamespaceKey};
use super::traits::{CacheStore, EntryLookup, NamespaceSnapshot};
use super::version::VersionToken;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes were not valid UTF-8.
    #[error("Invalid UTF-8 value under key {key}")]
    InvalidUtf8 { key: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed cache store.
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbCacheStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // The directory must not be opened twice within one process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self { env, db })
    }

    fn get_string(&self, txn: &RoTxn<'_>, key: &str) -> Result<Option<String>, LmdbCacheError> {
        match self.db.get(txn, key.as_bytes()).map_err(txn_err)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| LmdbCacheError::InvalidUtf8 {
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn collect_with_prefix(
        &self,
        txn: &RoTxn<'_>,
        prefix: &str,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, LmdbCacheError> {
        let iter = self.db.prefix_iter(txn, prefix.as_bytes()).map_err(txn_err)?;
        let mut pairs = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(txn_err)?;
            pairs.push((key.to_vec(), value.to_vec()));
        }
        Ok(pairs)
    }

    fn read_namespace_sync(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, LmdbCacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let rtxn = self.env.read_txn().map_err(txn_err)?;

        let Some(version) = self.get_string(&rtxn, &ns.etag_key())? else {
            return Ok(None);
        };
        let entries = self
            .collect_with_prefix(&rtxn, &ns.entry_prefix())?
            .into_iter()
            .map(|(key, value)| {
                String::from_utf8(value).map_err(|_| LmdbCacheError::InvalidUtf8 {
                    key: String::from_utf8_lossy(&key).into_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(NamespaceSnapshot {
            version: VersionToken::from_stored(version),
            entries,
        }))
    }

    fn read_version_sync(&self, member_id: MemberId) -> Result<Option<VersionToken>, LmdbCacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        Ok(self
            .get_string(&rtxn, &ns.etag_key())?
            .map(VersionToken::from_stored))
    }

    fn read_entry_sync(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, LmdbCacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let rtxn = self.env.read_txn().map_err(txn_err)?;

        if self.get_string(&rtxn, &ns.etag_key())?.is_none() {
            return Ok(EntryLookup::NoNamespace);
        }
        Ok(match self.get_string(&rtxn, &ns.entry_key(scenario_id))? {
            Some(value) => EntryLookup::Found(value),
            None => EntryLookup::Missing,
        })
    }

    /// Apply `change` to an existing namespace and write the new token.
    ///
    /// Aborts without writing when the namespace does not exist.
    fn mutate_existing<F>(
        &self,
        member_id: MemberId,
        version: &VersionToken,
        change: F,
    ) -> Result<bool, LmdbCacheError>
    where
        F: FnOnce(&Database<Bytes, Bytes>, &mut heed::RwTxn<'_>, &NamespaceKey) -> heed::Result<()>,
    {
        let ns = NamespaceKey::notifications(member_id);
        let etag_key = ns.etag_key();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        if self.db.get(&wtxn, etag_key.as_bytes()).map_err(txn_err)?.is_none() {
            wtxn.abort();
            return Ok(false);
        }
        change(&self.db, &mut wtxn, &ns).map_err(txn_err)?;
        self.db
            .put(&mut wtxn, etag_key.as_bytes(), version.as_str().as_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(true)
    }

    fn delete_prefix(&self, wtxn: &mut heed::RwTxn<'_>, prefix: &str) -> Result<u64, LmdbCacheError> {
        let keys: Vec<Vec<u8>> = self
            .collect_with_prefix(wtxn, prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let mut deleted = 0u64;
        for key in &keys {
            if self.db.delete(wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn replace_namespace_sync(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), LmdbCacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        self.delete_prefix(&mut wtxn, &ns.entry_prefix())?;
        for (scenario_id, value) in &entries {
            self.db
                .put(&mut wtxn, ns.entry_key(*scenario_id).as_bytes(), value.as_bytes())
                .map_err(txn_err)?;
        }
        self.db
            .put(&mut wtxn, ns.etag_key().as_bytes(), version.as_str().as_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn drop_namespace_sync(&self, member_id: MemberId) -> Result<bool, LmdbCacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        self.delete_prefix(&mut wtxn, &ns.entry_prefix())?;
        let existed = self
            .db
            .delete(&mut wtxn, ns.etag_key().as_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(existed)
    }

    fn evict_collection_sync(&self, collection: CacheCollection) -> Result<u64, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.delete_prefix(&mut wtxn, &collection.prefix())?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }
}

fn store_err(operation: &'static str) -> impl Fn(LmdbCacheError) -> CacheError {
    move |e| CacheError::store(operation, e)
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    fn backend_name(&self) -> &'static str {
        "lmdb"
    }

    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError> {
        self.read_namespace_sync(member_id)
            .map_err(store_err("read_namespace"))
    }

    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError> {
        self.read_version_sync(member_id)
            .map_err(store_err("read_version"))
    }

    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError> {
        self.read_entry_sync(member_id, scenario_id)
            .map_err(store_err("read_entry"))
    }

    async fn write_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        value: String,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.mutate_existing(member_id, version, |db, wtxn, ns| {
            db.put(wtxn, ns.entry_key(scenario_id).as_bytes(), value.as_bytes())
        })
        .map_err(store_err("write_entry"))
    }

    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.mutate_existing(member_id, version, |db, wtxn, ns| {
            db.delete(wtxn, ns.entry_key(scenario_id).as_bytes())
                .map(|_| ())
        })
        .map_err(store_err("remove_entry"))
    }

    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError> {
        self.replace_namespace_sync(member_id, entries, version)
            .map_err(store_err("replace_namespace"))
    }

    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError> {
        self.drop_namespace_sync(member_id)
            .map_err(store_err("drop_namespace"))
    }

    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        self.evict_collection_sync(collection)
            .map_err(store_err("evict_collection"))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.env
            .read_txn()
            .map(|_| ())
            .map_err(|e| CacheError::store("ping", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("store open should succeed");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_replace_and_read_namespace() {
        let (store, _dir) = create_test_store();
        let member = MemberId::new(1);
        let version = VersionToken::generate();

        store
            .replace_namespace(
                member,
                vec![(ScenarioId::new(10), "ten".into()), (ScenarioId::new(11), "eleven".into())],
                &version,
            )
            .await
            .unwrap();

        let snapshot = store.read_namespace(member).await.unwrap().unwrap();
        assert_eq!(snapshot.version, version);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(store.read_version(member).await.unwrap(), Some(version));
        assert_eq!(
            store.read_entry(member, ScenarioId::new(10)).await.unwrap(),
            EntryLookup::Found("ten".into())
        );
    }

    #[tokio::test]
    async fn test_mutations_skip_absent_namespace() {
        let (store, _dir) = create_test_store();
        let member = MemberId::new(2);
        let version = VersionToken::generate();

        assert!(!store
            .write_entry(member, ScenarioId::new(1), "x".into(), &version)
            .await
            .unwrap());
        assert!(!store.remove_entry(member, ScenarioId::new(1), &version).await.unwrap());
        assert!(store.read_namespace(member).await.unwrap().is_none());
        assert_eq!(
            store.read_entry(member, ScenarioId::new(1)).await.unwrap(),
            EntryLookup::NoNamespace
        );
    }

    #[tokio::test]
    async fn test_members_are_isolated() {
        let (store, _dir) = create_test_store();
        for id in [1, 10] {
            store
                .replace_namespace(
                    MemberId::new(id),
                    vec![(ScenarioId::new(id), format!("m{}", id))],
                    &VersionToken::generate(),
                )
                .await
                .unwrap();
        }

        assert!(store.drop_namespace(MemberId::new(1)).await.unwrap());
        assert!(store.read_namespace(MemberId::new(1)).await.unwrap().is_none());

        let other = store.read_namespace(MemberId::new(10)).await.unwrap().unwrap();
        assert_eq!(other.entries, vec!["m10".to_string()]);
    }

    #[tokio::test]
    async fn test_evict_collection() {
        let (store, _dir) = create_test_store();
        store
            .replace_namespace(
                MemberId::new(1),
                vec![(ScenarioId::new(1), "a".into()), (ScenarioId::new(2), "b".into())],
                &VersionToken::generate(),
            )
            .await
            .unwrap();

        // Two entries and the token.
        assert_eq!(
            store.evict_collection(CacheCollection::Notifications).await.unwrap(),
            3
        );
        assert!(store.read_namespace(MemberId::new(1)).await.unwrap().is_none());
        store.ping().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reader_never_sees_skewed_namespace() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let member = MemberId::new(7);

        let writer = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || {
                for round in 0..100 {
                    let version = VersionToken::generate();
                    let entries = (0..(round % 4) + 1)
                        .map(|i| (ScenarioId::new(i), version.as_str().to_string()))
                        .collect();
                    store.replace_namespace_sync(member, entries, &version).unwrap();
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..300 {
                    if let Some(snapshot) = store.read_namespace_sync(member).unwrap() {
                        assert!(!snapshot.entries.is_empty());
                        assert!(snapshot
                            .entries
                            .iter()
                            .all(|e| e == snapshot.version.as_str()));
                    }
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }
}
