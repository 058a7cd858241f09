//! Redis-backed cache store.
//!
//! Layout per member:
//! - `chime:notification:member:{id}`: hash of scenario id -> entry JSON
//! - `chime:notification:etag:{id}`: version token string
//!
//! Conditional mutations run as Lua scripts and reads run as `MULTI`
//! pipelines, so the token and the entries it describes always change and
//! are always observed together.

use std::collections::HashMap;

use async_trait::async_trait;
use chime_core::{CacheError, MemberId, ScenarioId};
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::debug;

use super::keys::{CacheCollection, NamespaceKey};
use super::traits::{CacheStore, EntryLookup, NamespaceSnapshot};
use super::version::VersionToken;

/// Writes one hash field and the token, only when the token exists.
const WRITE_ENTRY_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
redis.call('SET', KEYS[1], ARGV[3])
return 1
"#;

/// Removes one hash field and writes the token, only when the token exists.
const REMOVE_ENTRY_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('SET', KEYS[1], ARGV[2])
return 1
"#;

/// Keys deleted per `DEL` during collection eviction.
const SCAN_BATCH: usize = 200;

/// Redis-backed cache store.
pub struct RedisCacheStore {
    conn: ConnectionManager,
    write_script: Script,
    remove_script: Script,
}

impl RedisCacheStore {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|e| CacheError::store("connect", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::store("connect", e))?;

        debug!(url = %url, "Connected to Redis cache store");
        Ok(Self {
            conn,
            write_script: Script::new(WRITE_ENTRY_SCRIPT),
            remove_script: Script::new(REMOVE_ENTRY_SCRIPT),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let (version, entries): (Option<String>, HashMap<String, String>) = redis::pipe()
            .atomic()
            .get(ns.etag_key())
            .hgetall(ns.member_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("read_namespace", e))?;

        Ok(version.map(|version| NamespaceSnapshot {
            version: VersionToken::from_stored(version),
            entries: entries.into_values().collect(),
        }))
    }

    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let version: Option<String> = redis::cmd("GET")
            .arg(ns.etag_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("read_version", e))?;
        Ok(version.map(VersionToken::from_stored))
    }

    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let (exists, value): (bool, Option<String>) = redis::pipe()
            .atomic()
            .exists(ns.etag_key())
            .hget(ns.member_key(), scenario_id.get())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("read_entry", e))?;

        Ok(match (exists, value) {
            (false, _) => EntryLookup::NoNamespace,
            (true, None) => EntryLookup::Missing,
            (true, Some(value)) => EntryLookup::Found(value),
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
        let mut conn = self.conn.clone();

        let written: i64 = self
            .write_script
            .key(ns.etag_key())
            .key(ns.member_key())
            .arg(scenario_id.get())
            .arg(value)
            .arg(version.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("write_entry", e))?;
        Ok(written == 1)
    }

    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let removed: i64 = self
            .remove_script
            .key(ns.etag_key())
            .key(ns.member_key())
            .arg(scenario_id.get())
            .arg(version.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("remove_entry", e))?;
        Ok(removed == 1)
    }

    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let fields: Vec<(i64, String)> = entries
            .into_iter()
            .map(|(scenario_id, value)| (scenario_id.get(), value))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic().del(ns.member_key()).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(ns.member_key(), &fields).ignore();
        }
        pipe.set(ns.etag_key(), version.as_str()).ignore();

        let () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("replace_namespace", e))?;
        Ok(())
    }

    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError> {
        let ns = NamespaceKey::notifications(member_id);
        let mut conn = self.conn.clone();

        let (etag_deleted, _entries_deleted): (i64, i64) = redis::pipe()
            .atomic()
            .del(ns.etag_key())
            .del(ns.member_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("drop_namespace", e))?;
        Ok(etag_deleted > 0)
    }

    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = collection.pattern();
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::store("evict_collection", e))?;

            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| CacheError::store("evict_collection", e))?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern = %pattern, deleted, "Evicted cache collection");
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store("ping", e))?;
        Ok(())
    }
}
