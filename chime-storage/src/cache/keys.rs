//! Namespaced cache keys.
//!
//! Every key of one logical collection starts with the collection prefix, so a
//! whole collection can be evicted by prefix or pattern. Member scoping is
//! structural: a [`NamespaceKey`] cannot be built without a member id, and
//! entry keys are derived from it.

use chime_core::{MemberId, ScenarioId};

/// Root prefix shared by every key this service writes.
const ROOT: &str = "chime";

/// A logical cache collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCollection {
    /// Scenario notification entries and their version tokens.
    Notifications,
    /// Mission entries. Only bulk eviction is supported for this collection.
    Missions,
}

impl CacheCollection {
    fn segment(&self) -> &'static str {
        match self {
            CacheCollection::Notifications => "notification",
            CacheCollection::Missions => "mission",
        }
    }

    /// Prefix shared by every key in this collection, e.g. `chime:notification:`.
    pub fn prefix(&self) -> String {
        format!("{}:{}:", ROOT, self.segment())
    }

    /// Glob pattern matching every key in this collection.
    pub fn pattern(&self) -> String {
        format!("{}*", self.prefix())
    }

    /// Parse a collection name (`notifications` / `missions`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "notification" | "notifications" => Some(CacheCollection::Notifications),
            "mission" | "missions" => Some(CacheCollection::Missions),
            _ => None,
        }
    }
}

/// Key namespace of one member's notification cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceKey {
    inner: NamespaceKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NamespaceKeyInner {
    collection: CacheCollection,
    member_id: MemberId,
}

impl NamespaceKey {
    /// Namespace of a member's scenario notifications.
    pub fn notifications(member_id: MemberId) -> Self {
        Self {
            inner: NamespaceKeyInner {
                collection: CacheCollection::Notifications,
                member_id,
            },
        }
    }

    pub fn member_id(&self) -> MemberId {
        self.inner.member_id
    }

    pub fn collection(&self) -> CacheCollection {
        self.inner.collection
    }

    /// Key of the member's entry container, e.g. `chime:notification:member:1`.
    pub fn member_key(&self) -> String {
        format!("{}member:{}", self.inner.collection.prefix(), self.inner.member_id)
    }

    /// Key of a single entry, e.g. `chime:notification:member:1:scenario:10`.
    pub fn entry_key(&self, scenario_id: ScenarioId) -> String {
        format!("{}{}", self.entry_prefix(), scenario_id)
    }

    /// Prefix shared by all entry keys of this member.
    ///
    /// Ends with a separator so member 1 never matches member 10.
    pub fn entry_prefix(&self) -> String {
        format!("{}:scenario:", self.member_key())
    }

    /// Key holding the member's version token, e.g. `chime:notification:etag:1`.
    pub fn etag_key(&self) -> String {
        format!("{}etag:{}", self.inner.collection.prefix(), self.inner.member_id)
    }
}

/// Key of a member's entry container.
pub fn member_key(member_id: MemberId) -> String {
    NamespaceKey::notifications(member_id).member_key()
}

/// Key of one member's cached entry for a scenario.
pub fn entry_key(member_id: MemberId, scenario_id: ScenarioId) -> String {
    NamespaceKey::notifications(member_id).entry_key(scenario_id)
}

/// Key of a member's version token.
pub fn etag_key(member_id: MemberId) -> String {
    NamespaceKey::notifications(member_id).etag_key()
}
