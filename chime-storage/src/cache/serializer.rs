//! Wire encoding of cache entries and condition payloads.
//!
//! Values are UTF-8 JSON. The condition blob carries its own `type` tag, and
//! the tag is checked against the entry's notification type before the
//! payload is interpreted. Field ranges are checked in both directions.

use chime_core::{CacheError, NotificationCondition, NotificationType};
use serde_json::Value;

use super::entry::CacheEntry;

/// Encode an entry for the store.
pub fn serialize_entry(entry: &CacheEntry) -> Result<String, CacheError> {
    serde_json::to_string(entry).map_err(|e| CacheError::SerializeFailed {
        reason: e.to_string(),
    })
}

/// Decode an entry read from the store.
///
/// Fails with `ConditionParseFailed` when the condition blob does not decode
/// into the variant named by the entry's own type tag.
pub fn deserialize_entry(raw: &str) -> Result<CacheEntry, CacheError> {
    let entry: CacheEntry =
        serde_json::from_str(raw).map_err(|e| CacheError::DeserializeFailed {
            reason: e.to_string(),
        })?;
    parse_condition(entry.notification_type, &entry.condition)?;
    Ok(entry)
}

/// Encode a condition for an entry of the given type.
///
/// Rejects a condition whose variant or field ranges do not fit the type.
pub fn serialize_condition(
    notification_type: NotificationType,
    condition: &NotificationCondition,
) -> Result<String, CacheError> {
    if !condition.matches_type(notification_type) {
        return Err(CacheError::ConditionSerializeFailed {
            reason: format!(
                "condition of type {} attached to {} notification",
                condition.notification_type(),
                notification_type
            ),
        });
    }
    condition
        .validate()
        .map_err(|e| CacheError::ConditionSerializeFailed {
            reason: e.to_string(),
        })?;
    serde_json::to_string(condition).map_err(|e| CacheError::ConditionSerializeFailed {
        reason: e.to_string(),
    })
}

/// Decode a condition blob, validating its tag first and its ranges last.
pub fn parse_condition(
    notification_type: NotificationType,
    raw: &str,
) -> Result<NotificationCondition, CacheError> {
    let parse_failed = |reason: String| CacheError::ConditionParseFailed { reason };

    let value: Value = serde_json::from_str(raw).map_err(|e| parse_failed(e.to_string()))?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| parse_failed("condition has no type tag".to_string()))?;
    let tag = NotificationType::from_db_str(tag).map_err(|e| parse_failed(e.to_string()))?;
    if tag != notification_type {
        return Err(parse_failed(format!(
            "condition tagged {} on {} notification",
            tag, notification_type
        )));
    }

    let condition: NotificationCondition =
        serde_json::from_value(value).map_err(|e| parse_failed(e.to_string()))?;
    condition.validate().map_err(|e| parse_failed(e.to_string()))?;
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{
        DayOfWeek, DeliveryMethod, LocationCondition, LocationTrigger, NotificationId, ScenarioId,
    };
    use proptest::prelude::*;

    fn entry(condition: &NotificationCondition) -> CacheEntry {
        CacheEntry {
            scenario_id: ScenarioId::new(10),
            name: "Commute".to_string(),
            memo: Some("bring umbrella".to_string()),
            position: 2,
            notification_id: NotificationId::new(100),
            notification_type: condition.notification_type(),
            delivery_method: DeliveryMethod::Push,
            days: vec![DayOfWeek::Tuesday, DayOfWeek::Thursday],
            condition: serialize_condition(condition.notification_type(), condition).unwrap(),
        }
    }

    #[test]
    fn test_entry_round_trip() {
        let original = entry(&NotificationCondition::time(9, 30));
        let raw = serialize_entry(&original).unwrap();
        assert_eq!(deserialize_entry(&raw).unwrap(), original);
    }

    #[test]
    fn test_condition_blob_keeps_type_tag() {
        let raw = serialize_condition(NotificationType::Time, &NotificationCondition::time(7, 5))
            .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "TIME");
    }

    #[test]
    fn test_serialize_condition_rejects_mismatched_type() {
        let err = serialize_condition(NotificationType::Location, &NotificationCondition::time(7, 5))
            .unwrap_err();
        assert_eq!(err.kind(), "CONDITION_SERIALIZE_FAILED");
    }

    #[test]
    fn test_parse_condition_rejects_mismatched_tag() {
        let raw = r#"{"type":"TIME","start_hour":9,"start_minute":30}"#;
        let err = parse_condition(NotificationType::Location, raw).unwrap_err();
        assert_eq!(err.kind(), "CONDITION_PARSE_FAILED");
    }

    #[test]
    fn test_parse_condition_rejects_missing_or_unknown_tag() {
        let missing = r#"{"start_hour":9,"start_minute":30}"#;
        assert!(parse_condition(NotificationType::Time, missing).is_err());

        let unknown = r#"{"type":"WEATHER","start_hour":9}"#;
        assert!(parse_condition(NotificationType::Time, unknown).is_err());

        assert!(parse_condition(NotificationType::Time, "not json").is_err());
    }

    #[test]
    fn test_out_of_range_condition_rejected_both_ways() {
        let err = serialize_condition(NotificationType::Time, &NotificationCondition::time(25, 0))
            .unwrap_err();
        assert_eq!(err.kind(), "CONDITION_SERIALIZE_FAILED");
        assert!(err.to_string().contains("start_hour 25"));

        let raw = r#"{"type":"TIME","start_hour":25,"start_minute":0}"#;
        let err = parse_condition(NotificationType::Time, raw).unwrap_err();
        assert_eq!(err.kind(), "CONDITION_PARSE_FAILED");

        let raw = r#"{"type":"LOCATION","latitude":91.0,"longitude":0.0,"radius_meters":10,"trigger":"ARRIVE"}"#;
        let err = parse_condition(NotificationType::Location, raw).unwrap_err();
        assert!(err.to_string().contains("latitude 91"));
    }

    #[test]
    fn test_deserialize_entry_validates_condition() {
        let mut bad = entry(&NotificationCondition::time(9, 30));
        bad.notification_type = NotificationType::Location;
        let raw = serde_json::to_string(&bad).unwrap();
        assert_eq!(
            deserialize_entry(&raw).unwrap_err().kind(),
            "CONDITION_PARSE_FAILED"
        );
        assert_eq!(
            deserialize_entry("{\"scenario_id\":1}").unwrap_err().kind(),
            "DESERIALIZE_FAILED"
        );
    }

    fn arb_condition() -> impl Strategy<Value = NotificationCondition> {
        prop_oneof![
            (0u8..24, 0u8..60).prop_map(|(h, m)| NotificationCondition::time(h, m)),
            (-90.0f64..90.0, -180.0f64..180.0, 1u32..10_000).prop_map(|(lat, lng, r)| {
                NotificationCondition::Location(LocationCondition {
                    latitude: lat,
                    longitude: lng,
                    radius_meters: r,
                    trigger: LocationTrigger::Leave,
                })
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_entry_round_trip(
            condition in arb_condition(),
            name in "[a-zA-Z ]{1,24}",
            position in 0i32..100,
        ) {
            let mut original = entry(&condition);
            original.name = name;
            original.position = position;

            let raw = serialize_entry(&original).unwrap();
            let back = deserialize_entry(&raw).unwrap();
            prop_assert_eq!(&back, &original);
            prop_assert!(back.decode_condition().unwrap().matches_type(back.notification_type));
        }
    }
}
