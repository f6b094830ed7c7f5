use chrono::{DateTime, Utc};
use serde_json::Value;

use sunrelay_util::json::lenient_i64;

use crate::feed::{FeedRecord, Fields, RawFeed};

const MISSING: &str = "0";

/// Normalize a provider feed entry into a complete record.
///
/// Missing, `null` or empty field values become `"0"` and a missing or
/// unparseable `created_at` is replaced with the current time.
pub fn sanitize(raw: &RawFeed) -> FeedRecord {
    sanitize_at(raw, Utc::now())
}

/// Same as [`sanitize`] using `now` as the fallback creation time
pub fn sanitize_at(raw: &RawFeed, now: DateTime<Utc>) -> FeedRecord {
    let fields = Fields::from_fn(|n| field_value(raw.get(&n.key())));

    let created_at = raw
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now);

    let entry_id = raw
        .get("entry_id")
        .and_then(lenient_i64)
        .and_then(|id| u64::try_from(id).ok());

    FeedRecord {
        created_at,
        entry_id,
        fields,
    }
}

fn field_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "1".to_owned(),
        _ => MISSING.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawFeed {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_fills_missing_fields_and_timestamp() {
        let now: DateTime<Utc> = "2025-03-01T10:00:00Z".parse().unwrap();
        let record = sanitize_at(
            &raw(json!({
                "entry_id": 101,
                "field1": "12.5",
                "field2": null,
                "field4": ""
            })),
            now,
        );

        assert_eq!(record.entry_id, Some(101));
        assert_eq!(record.created_at, now);
        assert_eq!(record.fields.field1, "12.5");
        assert_eq!(record.fields.field2, "0");
        assert_eq!(record.fields.field3, "0");
        assert_eq!(record.fields.field4, "0");
        assert_eq!(record.fields.field8, "0");
    }

    #[test]
    fn test_keeps_provider_timestamps() {
        let now: DateTime<Utc> = "2025-03-01T10:00:00Z".parse().unwrap();
        let record = sanitize_at(
            &raw(json!({"created_at": "2025-02-28T23:59:00+01:00"})),
            now,
        );

        let expected: DateTime<Utc> = "2025-02-28T22:59:00Z".parse().unwrap();
        assert_eq!(record.created_at, expected);
        assert_eq!(record.entry_id, None);
    }

    #[test]
    fn test_treats_garbage_timestamps_as_missing() {
        let now: DateTime<Utc> = "2025-03-01T10:00:00Z".parse().unwrap();
        let record = sanitize_at(&raw(json!({"created_at": "yesterday"})), now);
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn test_normalizes_non_string_values() {
        let record = sanitize(&raw(json!({
            "entry_id": "77",
            "field1": 3,
            "field2": 1.25,
            "field5": true,
            "field6": false,
            "field7": {"nested": 1},
            "field8": [1, 2]
        })));

        assert_eq!(record.entry_id, Some(77));
        assert_eq!(record.fields.field1, "3");
        assert_eq!(record.fields.field2, "1.25");
        assert_eq!(record.fields.field5, "1");
        assert_eq!(record.fields.field6, "0");
        assert_eq!(record.fields.field7, "0");
        assert_eq!(record.fields.field8, "0");
    }

    #[test]
    fn test_ignores_negative_entry_ids() {
        let record = sanitize(&raw(json!({"entry_id": -1})));
        assert_eq!(record.entry_id, None);
    }
}
