//! Document store boundary
//!
//! Schema-flexible records grouped in collections. Fields travel as a JSON
//! object; typed records convert through serde with [`Document::decode`]
//! and [`to_fields`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Field map of a document
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id within its collection
    pub id: String,
    /// Document fields
    pub fields: Fields,
}

impl Document {
    /// Create a new document
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    /// Decode the fields into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(self.fields.clone()))?)
    }
}

/// Encode a typed record as document fields
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(Error::Json(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        )))),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl OrderDirection {
    /// Wire name of the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASCENDING",
            OrderDirection::Descending => "DESCENDING",
        }
    }
}

/// Ordered, limited collection query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Collection to read
    pub collection: String,
    /// Field to order by
    pub order_by: String,
    /// Sort direction
    pub direction: OrderDirection,
    /// Maximum number of documents
    pub limit: usize,
}

impl Query {
    /// Query a collection ordered by `order_by`, ascending, unlimited
    pub fn collection(collection: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: order_by.into(),
            direction: OrderDirection::Ascending,
            limit: usize::MAX,
        }
    }

    /// Order descending
    pub fn descending(mut self) -> Self {
        self.direction = OrderDirection::Descending;
        self
    }

    /// Limit the result size
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Hosted document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document, `None` if it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or overwrite a document with a known id
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Create a document with a store-assigned id, returning the id
    async fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Run an ordered, limited query
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        title: String,
        reading_time: u32,
    }

    #[test]
    fn test_fields_and_decode() {
        let sample = Sample { title: "T".to_string(), reading_time: 2 };
        let fields = to_fields(&sample).unwrap();
        assert_eq!(fields["readingTime"], 2);

        let doc = Document::new("abc", fields);
        assert_eq!(doc.decode::<Sample>().unwrap(), sample);
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(to_fields(&42).is_err());
    }

    #[test]
    fn test_query_builder() {
        let query = Query::collection("posts", "uploadDate").descending().limit(5);
        assert_eq!(query.collection, "posts");
        assert_eq!(query.direction, OrderDirection::Descending);
        assert_eq!(query.limit, 5);
        assert_eq!(query.direction.as_str(), "DESCENDING");
    }
}
