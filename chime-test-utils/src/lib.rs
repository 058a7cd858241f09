//! Chime Test Utilities
//!
//! Shared test infrastructure for the Chime workspace:
//! - Proptest generators for domain types
//! - Cache store doubles that count writes or inject failures
//! - Fixtures for common scenarios
//! - Assertions for cache-specific results

pub use chime_core::{
    CacheError, DayOfWeek, DeliveryMethod, LocationCondition, LocationTrigger, MemberId,
    NotificationCondition, NotificationId, NotificationSnapshot, NotificationType, ScenarioId,
    ScenarioSnapshot, TimeCondition,
};
pub use chime_storage::{
    CacheCollection, CacheStore, EntryLookup, InMemoryCacheStore, InMemoryNotificationSource,
    NamespaceSnapshot, NotificationCacheService, VersionToken,
};

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// STORE DOUBLES
// ============================================================================

/// Counts of mutating calls seen by a [`RecordingCacheStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub write_entry: u64,
    pub remove_entry: u64,
    pub replace_namespace: u64,
    pub drop_namespace: u64,
}

impl WriteCounts {
    pub fn total(&self) -> u64 {
        self.write_entry + self.remove_entry + self.replace_namespace + self.drop_namespace
    }
}

/// In-memory store that records every mutating call.
#[derive(Debug, Default)]
pub struct RecordingCacheStore {
    inner: InMemoryCacheStore,
    write_entry: AtomicU64,
    remove_entry: AtomicU64,
    replace_namespace: AtomicU64,
    drop_namespace: AtomicU64,
}

impl RecordingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> WriteCounts {
        WriteCounts {
            write_entry: self.write_entry.load(Ordering::SeqCst),
            remove_entry: self.remove_entry.load(Ordering::SeqCst),
            replace_namespace: self.replace_namespace.load(Ordering::SeqCst),
            drop_namespace: self.drop_namespace.load(Ordering::SeqCst),
        }
    }

    pub fn inner(&self) -> &InMemoryCacheStore {
        &self.inner
    }
}

#[async_trait]
impl CacheStore for RecordingCacheStore {
    fn backend_name(&self) -> &'static str {
        "recording"
    }

    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError> {
        self.inner.read_namespace(member_id).await
    }

    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError> {
        self.inner.read_version(member_id).await
    }

    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError> {
        self.inner.read_entry(member_id, scenario_id).await
    }

    async fn write_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        value: String,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.write_entry.fetch_add(1, Ordering::SeqCst);
        self.inner
            .write_entry(member_id, scenario_id, value, version)
            .await
    }

    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.remove_entry.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_entry(member_id, scenario_id, version).await
    }

    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError> {
        self.replace_namespace.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_namespace(member_id, entries, version).await
    }

    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError> {
        self.drop_namespace.fetch_add(1, Ordering::SeqCst);
        self.inner.drop_namespace(member_id).await
    }

    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        self.inner.evict_collection(collection).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.inner.ping().await
    }
}

/// How a [`FaultyCacheStore`] misbehaves on entry writes and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Fault {
    None = 0,
    /// Return a store error.
    Fail = 1,
    /// Panic inside the call.
    Panic = 2,
}

impl Fault {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Fault::Fail,
            2 => Fault::Panic,
            _ => Fault::None,
        }
    }
}

/// In-memory store whose incremental writes can be made to fail.
///
/// Reads, rebuilds and namespace drops always work, so fail-safe
/// invalidation can be observed.
#[derive(Debug, Default)]
pub struct FaultyCacheStore {
    inner: InMemoryCacheStore,
    fault: AtomicU8,
}

impl FaultyCacheStore {
    pub fn new(fault: Fault) -> Self {
        let store = Self::default();
        store.set_fault(fault);
        store
    }

    pub fn set_fault(&self, fault: Fault) {
        self.fault.store(fault as u8, Ordering::SeqCst);
    }

    fn check(&self, operation: &'static str) -> Result<(), CacheError> {
        match Fault::from_u8(self.fault.load(Ordering::SeqCst)) {
            Fault::None => Ok(()),
            Fault::Fail => Err(CacheError::store(operation, "injected failure")),
            Fault::Panic => panic!("injected panic in {}", operation),
        }
    }
}

#[async_trait]
impl CacheStore for FaultyCacheStore {
    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError> {
        self.inner.read_namespace(member_id).await
    }

    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError> {
        self.inner.read_version(member_id).await
    }

    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError> {
        self.inner.read_entry(member_id, scenario_id).await
    }

    async fn write_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        value: String,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.check("write_entry")?;
        self.inner
            .write_entry(member_id, scenario_id, value, version)
            .await
    }

    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError> {
        self.check("remove_entry")?;
        self.inner.remove_entry(member_id, scenario_id, version).await
    }

    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError> {
        self.inner.replace_namespace(member_id, entries, version).await
    }

    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError> {
        self.inner.drop_namespace(member_id).await
    }

    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        self.inner.evict_collection(collection).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.inner.ping().await
    }
}

/// A cache service over the given store and source with a generous timeout.
pub fn cache_service(
    store: Arc<dyn CacheStore>,
    source: Arc<InMemoryNotificationSource>,
) -> Arc<NotificationCacheService> {
    Arc::new(NotificationCacheService::new(
        store,
        source,
        Duration::from_secs(2),
    ))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Chime domain types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_member_id() -> impl Strategy<Value = MemberId> {
        (1i64..10_000).prop_map(MemberId::new)
    }

    pub fn arb_scenario_id() -> impl Strategy<Value = ScenarioId> {
        (1i64..10_000).prop_map(ScenarioId::new)
    }

    pub fn arb_delivery_method() -> impl Strategy<Value = DeliveryMethod> {
        prop_oneof![Just(DeliveryMethod::Push), Just(DeliveryMethod::Alarm)]
    }

    pub fn arb_days() -> impl Strategy<Value = Vec<DayOfWeek>> {
        proptest::sample::subsequence(DayOfWeek::ALL.to_vec(), 1..=7)
    }

    pub fn arb_time_condition() -> impl Strategy<Value = NotificationCondition> {
        (0u8..24, 0u8..60).prop_map(|(h, m)| NotificationCondition::time(h, m))
    }

    pub fn arb_location_condition() -> impl Strategy<Value = NotificationCondition> {
        (
            -90.0f64..90.0,
            -180.0f64..180.0,
            1u32..5_000,
            prop_oneof![Just(LocationTrigger::Arrive), Just(LocationTrigger::Leave)],
        )
            .prop_map(|(latitude, longitude, radius_meters, trigger)| {
                NotificationCondition::Location(LocationCondition {
                    latitude,
                    longitude,
                    radius_meters,
                    trigger,
                })
            })
    }

    pub fn arb_condition() -> impl Strategy<Value = NotificationCondition> {
        prop_oneof![arb_time_condition(), arb_location_condition()]
    }

    /// A scenario of `member_id` with an active notification.
    pub fn arb_active_scenario(member_id: MemberId) -> impl Strategy<Value = ScenarioSnapshot> {
        (
            arb_scenario_id(),
            "[a-zA-Z ]{1,24}",
            proptest::option::of("[a-z ]{0,40}"),
            0i32..50,
            arb_delivery_method(),
            arb_days(),
            arb_condition(),
        )
            .prop_map(
                move |(scenario_id, name, memo, position, method, days, condition)| {
                    let notification = NotificationSnapshot::active(
                        NotificationId::new(scenario_id.get()),
                        method,
                        days,
                        condition,
                    );
                    let scenario = ScenarioSnapshot::new(member_id, scenario_id, name, position)
                        .with_notification(notification);
                    match memo {
                        Some(memo) => scenario.with_memo(memo),
                        None => scenario,
                    }
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common cache scenarios.

    use super::*;

    /// An active time notification at `hour:minute` on weekdays.
    pub fn time_scenario(member_id: i64, scenario_id: i64, hour: u8, minute: u8) -> ScenarioSnapshot {
        ScenarioSnapshot::new(
            MemberId::new(member_id),
            ScenarioId::new(scenario_id),
            format!("Scenario {}", scenario_id),
            scenario_id as i32,
        )
        .with_notification(NotificationSnapshot::active(
            NotificationId::new(scenario_id * 10),
            DeliveryMethod::Push,
            vec![
                DayOfWeek::Monday,
                DayOfWeek::Tuesday,
                DayOfWeek::Wednesday,
                DayOfWeek::Thursday,
                DayOfWeek::Friday,
            ],
            NotificationCondition::time(hour, minute),
        ))
    }

    /// An active location notification triggered on arrival.
    pub fn location_scenario(member_id: i64, scenario_id: i64) -> ScenarioSnapshot {
        ScenarioSnapshot::new(
            MemberId::new(member_id),
            ScenarioId::new(scenario_id),
            format!("Scenario {}", scenario_id),
            scenario_id as i32,
        )
        .with_notification(NotificationSnapshot::active(
            NotificationId::new(scenario_id * 10),
            DeliveryMethod::Alarm,
            DayOfWeek::ALL.to_vec(),
            NotificationCondition::Location(LocationCondition {
                latitude: 37.5665,
                longitude: 126.978,
                radius_meters: 150,
                trigger: LocationTrigger::Arrive,
            }),
        ))
    }

    /// The same scenario with its notification switched off.
    pub fn deactivated(scenario: &ScenarioSnapshot) -> ScenarioSnapshot {
        let mut scenario = scenario.clone();
        scenario.notification = scenario.notification.take().map(|n| n.deactivated());
        scenario
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache results.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_cache_error_kind<T: std::fmt::Debug>(
        result: &Result<T, CacheError>,
        kind: &'static str,
    ) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "Wrong error kind: {:?}", e),
            Ok(v) => panic!("Expected {} error, got Ok: {:?}", kind, v),
        }
    }

    /// Assert that a member has no cached namespace.
    pub async fn assert_namespace_absent(store: &dyn CacheStore, member_id: MemberId) {
        let version = store.read_version(member_id).await;
        assert!(
            matches!(version, Ok(None)),
            "Expected no namespace for member {}, got {:?}",
            member_id,
            version
        );
    }

    /// Assert that a member has a cached namespace and return its token.
    pub async fn assert_namespace_present(
        store: &dyn CacheStore,
        member_id: MemberId,
    ) -> VersionToken {
        match store.read_version(member_id).await {
            Ok(Some(version)) => version,
            other => panic!("Expected namespace for member {}, got {:?}", member_id, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_scenario_fixture() {
        let scenario = fixtures::time_scenario(1, 2, 9, 30);
        assert!(scenario.has_active_notification());
        let notification = scenario.notification.as_ref().unwrap();
        assert_eq!(notification.notification_type, NotificationType::Time);
        assert_eq!(notification.condition, Some(NotificationCondition::time(9, 30)));
    }

    #[test]
    fn test_deactivated_fixture() {
        let scenario = fixtures::deactivated(&fixtures::location_scenario(1, 3));
        assert!(!scenario.has_active_notification());
        assert!(scenario.notification.is_some());
    }

    #[tokio::test]
    async fn test_recording_store_counts_writes() {
        let store = RecordingCacheStore::new();
        let member = MemberId::new(1);
        let version = VersionToken::generate();
        store.replace_namespace(member, Vec::new(), &version).await.unwrap();
        store
            .remove_entry(member, ScenarioId::new(1), &VersionToken::generate())
            .await
            .unwrap();
        store.read_namespace(member).await.unwrap();

        let counts = store.counts();
        assert_eq!(counts.replace_namespace, 1);
        assert_eq!(counts.remove_entry, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_faulty_store_fails_writes_only() {
        let store = FaultyCacheStore::new(Fault::Fail);
        let member = MemberId::new(1);
        store
            .replace_namespace(member, Vec::new(), &VersionToken::generate())
            .await
            .unwrap();

        let removed = store
            .remove_entry(member, ScenarioId::new(1), &VersionToken::generate())
            .await;
        assertions::assert_cache_error_kind(&removed, "STORE_FAILED");

        assert!(store.drop_namespace(member).await.unwrap());
        assertions::assert_namespace_absent(&store, member).await;
    }

    proptest! {
        #[test]
        fn prop_generated_scenarios_are_active(
            scenario in generators::arb_active_scenario(MemberId::new(7))
        ) {
            prop_assert!(scenario.has_active_notification());
            prop_assert_eq!(scenario.member_id, MemberId::new(7));
            let notification = scenario.notification.unwrap();
            prop_assert!(notification.condition.unwrap().validate().is_ok());
        }
    }
}
