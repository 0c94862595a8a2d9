//! Stored record types
//!
//! Wire names are camelCase. Timestamps are written as RFC 3339 with
//! nanosecond precision and a `Z` suffix, so string order is time order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page::PostCard;
use crate::posts::{preview, reading_time, PostDraft};

/// Collection holding one record per account, keyed by uid
pub const USERS: &str = "users";

/// Collection holding posts
pub const POSTS: &str = "posts";

/// Field posts are ordered by
pub const UPLOAD_DATE: &str = "uploadDate";

/// Per-account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Account email
    pub email: String,
    /// Number of posts authored
    #[serde(default)]
    pub posts: u32,
    /// When the record was created
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Record for a brand new account
    pub fn new(email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { email: email.into(), posts: 0, created_at }
    }
}

/// A published post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    /// Title
    pub title: String,
    /// Body text
    pub content: String,
    /// Free-form category label
    #[serde(default)]
    pub category: String,
    /// Author email
    pub author: String,
    /// Estimated reading time in minutes
    pub reading_time: u32,
    /// First two lines of the body
    pub preview: String,
    /// Creation time
    #[serde(with = "timestamp")]
    pub upload_date: DateTime<Utc>,
}

impl PostRecord {
    /// Build a record from a draft, computing the derived fields
    pub fn compose(draft: &PostDraft, author: impl Into<String>, upload_date: DateTime<Utc>) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            category: draft.category.clone(),
            author: author.into(),
            reading_time: reading_time(&draft.content),
            preview: preview(&draft.content),
            upload_date,
        }
    }
}

impl From<&PostRecord> for PostCard {
    fn from(record: &PostRecord) -> Self {
        Self {
            title: record.title.clone(),
            preview: record.preview.clone(),
            reading_time: record.reading_time,
            author: record.author.clone(),
        }
    }
}

mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_client::documents::to_fields;
    use chrono::TimeZone;

    #[test]
    fn test_user_record_wire_format() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let fields = to_fields(&UserRecord::new("a@x.com", created)).unwrap();

        assert_eq!(fields["email"], "a@x.com");
        assert_eq!(fields["posts"], 0);
        assert_eq!(fields["createdAt"], "2024-03-01T12:00:00.000000000Z");
    }

    #[test]
    fn test_user_record_accepts_service_timestamps() {
        let json = serde_json::json!({"email": "a@x.com", "createdAt": "2024-03-01T12:00:00Z"});
        let record: UserRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.posts, 0);
    }

    #[test]
    fn test_timestamps_sort_as_strings() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 9).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap();
        let draft = PostDraft::new("T", "body", "");

        let a = to_fields(&PostRecord::compose(&draft, "a@x.com", early)).unwrap();
        let b = to_fields(&PostRecord::compose(&draft, "a@x.com", late)).unwrap();

        assert!(a[UPLOAD_DATE].as_str().unwrap() < b[UPLOAD_DATE].as_str().unwrap());
    }

    #[test]
    fn test_compose_scenario_post() {
        let draft = PostDraft::new("T", "line1\nline2\nline3", "news");
        let record = PostRecord::compose(&draft, "a@x.com", Utc::now());

        assert_eq!(record.title, "T");
        assert_eq!(record.reading_time, 1);
        assert_eq!(record.preview, "line1 line2");
        assert_eq!(record.author, "a@x.com");
        assert_eq!(record.category, "news");

        let card = PostCard::from(&record);
        assert_eq!(card.preview, "line1 line2");
    }
}
