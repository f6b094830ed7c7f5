use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display};
use thiserror::Error;

/// Provider assigned identifier of a feed entry
pub type EntryId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid field number {0}, expected a value between 1 and 8")]
pub struct InvalidFieldNumber(pub i64);

/// One of the eight value slots of a feed entry (`field1` to `field8`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldNumber(u8);

impl FieldNumber {
    pub const ALL: [FieldNumber; 8] = [
        FieldNumber(1),
        FieldNumber(2),
        FieldNumber(3),
        FieldNumber(4),
        FieldNumber(5),
        FieldNumber(6),
        FieldNumber(7),
        FieldNumber(8),
    ];

    pub fn get(&self) -> u8 {
        self.0
    }

    /// The key used for this field on the wire, e.g. `field5`
    pub fn key(&self) -> String {
        format!("field{}", self.0)
    }
}

impl TryFrom<i64> for FieldNumber {
    type Error = InvalidFieldNumber;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1..=8 => Ok(FieldNumber(value as u8)),
            _ => Err(InvalidFieldNumber(value)),
        }
    }
}

impl Display for FieldNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field{}", self.0)
    }
}

/// The eight string values carried by every feed entry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Fields {
    pub field1: String,
    pub field2: String,
    pub field3: String,
    pub field4: String,
    pub field5: String,
    pub field6: String,
    pub field7: String,
    pub field8: String,
}

impl Default for Fields {
    fn default() -> Self {
        Self::from_fn(|_| "0".to_owned())
    }
}

impl Fields {
    /// Build a complete set of fields calling `f` once per field number
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(FieldNumber) -> String,
    {
        let [f1, f2, f3, f4, f5, f6, f7, f8] = FieldNumber::ALL;
        Self {
            field1: f(f1),
            field2: f(f2),
            field3: f(f3),
            field4: f(f4),
            field5: f(f5),
            field6: f(f6),
            field7: f(f7),
            field8: f(f8),
        }
    }

    pub fn get(&self, field: FieldNumber) -> &str {
        match field.0 {
            1 => &self.field1,
            2 => &self.field2,
            3 => &self.field3,
            4 => &self.field4,
            5 => &self.field5,
            6 => &self.field6,
            7 => &self.field7,
            _ => &self.field8,
        }
    }

    pub fn set(&mut self, field: FieldNumber, value: impl Into<String>) {
        let slot = match field.0 {
            1 => &mut self.field1,
            2 => &mut self.field2,
            3 => &mut self.field3,
            4 => &mut self.field4,
            5 => &mut self.field5,
            6 => &mut self.field6,
            7 => &mut self.field7,
            _ => &mut self.field8,
        };
        *slot = value.into();
    }

    /// Iterate over `(field, value)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (FieldNumber, &str)> {
        FieldNumber::ALL.into_iter().map(|n| (n, self.get(n)))
    }
}

/// A complete, typed feed entry as persisted by the store
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FeedRecord {
    pub created_at: DateTime<Utc>,

    /// Absent for entries synthesized locally
    pub entry_id: Option<EntryId>,

    #[serde(flatten)]
    pub fields: Fields,
}

/// A feed entry as received from the provider.
///
/// Any key may be missing, `null`, empty or of an unexpected type. Use
/// [`crate::sanitize`] to get a [`FeedRecord`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RawFeed(Map<String, Value>);

impl RawFeed {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_accepts_field_numbers_one_to_eight() {
        assert_eq!(FieldNumber::try_from(1).map(|f| f.get()), Ok(1));
        assert_eq!(FieldNumber::try_from(8).map(|f| f.key()), Ok("field8".to_owned()));
        assert_eq!(FieldNumber::try_from(0), Err(InvalidFieldNumber(0)));
        assert_eq!(FieldNumber::try_from(9), Err(InvalidFieldNumber(9)));
    }

    #[test]
    fn test_gets_and_sets_fields_by_number() {
        let mut fields = Fields::default();
        let field6 = FieldNumber::try_from(6).unwrap();
        fields.set(field6, "1");

        assert_eq!(fields.get(field6), "1");
        assert_eq!(fields.field6, "1");
        assert_eq!(
            fields.iter().filter(|(_, value)| *value == "0").count(),
            7
        );
    }

    #[test]
    fn test_serializes_fields_flat_on_the_record() {
        let record = FeedRecord {
            created_at: "2025-03-01T10:00:00Z".parse().unwrap(),
            entry_id: Some(101),
            fields: Fields::default(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["entry_id"], json!(101));
        assert_eq!(value["field8"], json!("0"));

        let back: FeedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
