use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read an integer from a JSON value that may be a number or a numeric
/// string, e.g. `5`, `"5"` or `" 5 "`.
///
/// Returns `None` for anything else, including non integral numbers.
pub fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize an optional integer that may be encoded as a number or as
/// a numeric string. Values that are neither deserialize as `None`.
pub fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "deserialize_lenient_i64")]
        field: Option<i64>,
    }

    #[test]
    fn test_reads_numbers_and_numeric_strings() {
        assert_eq!(lenient_i64(&json!(5)), Some(5));
        assert_eq!(lenient_i64(&json!("7")), Some(7));
        assert_eq!(lenient_i64(&json!(" 8 ")), Some(8));
        assert_eq!(lenient_i64(&json!(1.5)), None);
        assert_eq!(lenient_i64(&json!("on")), None);
        assert_eq!(lenient_i64(&json!(null)), None);
    }

    #[test]
    fn test_deserializes_missing_or_invalid_values_as_none() {
        let p: Payload = serde_json::from_value(json!({"field": "6"})).unwrap();
        assert_eq!(p.field, Some(6));

        let p: Payload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.field, None);

        let p: Payload = serde_json::from_value(json!({"field": [1]})).unwrap();
        assert_eq!(p.field, None);
    }
}
