use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::{EntryId, FeedRecord, RawFeed};

/// Numeric identifier of a channel, stable per physical device
pub type ChannelId = u64;

/// Channel metadata as reported by the provider.
///
/// Only `id` is required, the rest is informational and replaced
/// wholesale on every successful poll or command.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChannelMetadata {
    pub id: ChannelId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub elevation: Option<String>,

    // Field labels, e.g. "Battery voltage"
    pub field1: Option<String>,
    pub field2: Option<String>,
    pub field3: Option<String>,
    pub field4: Option<String>,
    pub field5: Option<String>,
    pub field6: Option<String>,
    pub field7: Option<String>,
    pub field8: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_entry_id: Option<EntryId>,
}

impl ChannelMetadata {
    /// Metadata for a channel the provider told us nothing about
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            name: None,
            description: None,
            latitude: None,
            longitude: None,
            elevation: None,
            field1: None,
            field2: None,
            field3: None,
            field4: None,
            field5: None,
            field6: None,
            field7: None,
            field8: None,
            created_at: None,
            updated_at: None,
            last_entry_id: None,
        }
    }
}

/// Response body of the provider's channel feed endpoint
#[derive(Deserialize, Clone, Debug)]
pub struct ChannelFeed {
    pub channel: ChannelMetadata,
    pub feeds: Vec<RawFeed>,
}

/// Persisted state of one channel: its metadata and the feed history in
/// the order records were merged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChannelState {
    pub channel: ChannelMetadata,
    pub feeds: Vec<FeedRecord>,
}

impl ChannelState {
    /// The most recently appended feed record
    pub fn latest(&self) -> Option<&FeedRecord> {
        self.feeds.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_a_provider_response() {
        let feed: ChannelFeed = serde_json::from_value(json!({
            "channel": {
                "id": 2480953,
                "name": "Solar bench",
                "latitude": "0.0",
                "longitude": "0.0",
                "field1": "Panel voltage",
                "field5": "Relay 1",
                "created_at": "2024-03-25T12:00:00Z",
                "updated_at": "2025-01-10T08:30:00Z",
                "last_entry_id": 512,
                "public_flag": false
            },
            "feeds": [
                {"created_at": "2025-01-10T08:30:00Z", "entry_id": 512, "field1": "12.8", "field5": null}
            ]
        }))
        .unwrap();

        assert_eq!(feed.channel.id, 2480953);
        assert_eq!(feed.channel.field5.as_deref(), Some("Relay 1"));
        assert_eq!(feed.channel.description, None);
        assert_eq!(feed.channel.last_entry_id, Some(512));
        assert_eq!(feed.feeds.len(), 1);
        assert_eq!(feed.feeds[0].get("field1"), Some(&json!("12.8")));
    }

    #[test]
    fn test_requires_a_channel_id() {
        let res = serde_json::from_value::<ChannelFeed>(json!({
            "channel": {"name": "no id"},
            "feeds": []
        }));
        assert!(res.is_err());
    }
}
