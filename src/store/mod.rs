//! Storage seam for toys and gallery items
//!
//! Route handlers talk to [`ToyStore`] and [`GalleryStore`]. The MongoDB
//! implementation is used in production; the in-memory one backs tests and
//! `--in-memory` development runs.

pub mod memory;
pub mod mongo;

use bson::oid::ObjectId;
use mongodb::results::{DeleteResult, UpdateResult};
use serde::Serialize;
use serde_json::Value;

use crate::db::schemas::{ToyData, ToyDoc, ToyUpdate};
use crate::types::Result;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Toy collection operations
#[async_trait::async_trait]
pub trait ToyStore: Send + Sync {
    /// Case-insensitive literal substring match on the toy name
    async fn search_by_name(&self, text: &str) -> Result<Vec<ToyDoc>>;

    /// Toys whose seller email equals `email` exactly
    async fn list_by_seller(&self, email: &str) -> Result<Vec<ToyDoc>>;

    /// All toys in natural order, at most `limit` when given
    async fn list(&self, limit: Option<u64>) -> Result<Vec<ToyDoc>>;

    /// Single toy by identifier
    async fn get(&self, id: ObjectId) -> Result<Option<ToyDoc>>;

    /// Insert a new toy
    async fn insert(&self, data: ToyData) -> Result<InsertAck>;

    /// Replace price, quantity and description of one toy
    async fn update(&self, id: ObjectId, update: &ToyUpdate) -> Result<UpdateAck>;

    /// Remove one toy
    async fn delete(&self, id: ObjectId) -> Result<DeleteAck>;
}

/// Gallery collection operations
#[async_trait::async_trait]
pub trait GalleryStore: Send + Sync {
    /// Every gallery item, unfiltered
    async fn list_all(&self) -> Result<Vec<Value>>;
}

/// Backend lifecycle hook, called once when the server stops
#[async_trait::async_trait]
pub trait Shutdown: Send + Sync {
    async fn shutdown(&self);
}

/// Insert acknowledgment
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertAck {
    pub fn new(id: ObjectId) -> Self {
        Self {
            acknowledged: true,
            inserted_id: id.to_hex(),
        }
    }
}

/// Update acknowledgment
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAck {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

impl UpdateAck {
    pub fn counts(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
        }
    }
}

impl From<UpdateResult> for UpdateAck {
    fn from(result: UpdateResult) -> Self {
        let upserted_id = result.upserted_id.map(|id| match id.as_object_id() {
            Some(oid) => oid.to_hex(),
            None => id.to_string(),
        });

        Self {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(upserted_id.is_some()),
            upserted_id,
        }
    }
}

/// Delete acknowledgment
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteAck {
    pub fn count(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

impl From<DeleteResult> for DeleteAck {
    fn from(result: DeleteResult) -> Self {
        Self::count(result.deleted_count)
    }
}

/// Direction for price sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Anything other than `desc` sorts ascending
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("desc") => Self::Descending,
            _ => Self::Ascending,
        }
    }
}

/// Stable sort by price; equal prices keep store order
pub fn sort_by_price(toys: &mut [ToyDoc], order: SortOrder) {
    match order {
        SortOrder::Ascending => toys.sort_by(|a, b| a.data.price.cmp(&b.data.price)),
        SortOrder::Descending => toys.sort_by(|a, b| b.data.price.cmp(&a.data.price)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(name: &str, price: i64) -> ToyDoc {
        ToyDoc::new(ToyData {
            name: name.to_string(),
            price,
            quantity: 1,
            description: String::new(),
            seller_email: "s@x.com".to_string(),
        })
    }

    fn names(toys: &[ToyDoc]) -> Vec<&str> {
        toys.iter().map(|t| t.data.name.as_str()).collect()
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Descending);
        assert_eq!(SortOrder::parse(Some("DESC")), SortOrder::Descending);
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Ascending);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Ascending);
        assert_eq!(SortOrder::parse(None), SortOrder::Ascending);
    }

    #[test]
    fn test_sort_by_price_is_stable() {
        let mut toys = vec![toy("a", 30), toy("b", 10), toy("c", 30), toy("d", 5)];

        sort_by_price(&mut toys, SortOrder::Ascending);
        assert_eq!(names(&toys), vec!["d", "b", "a", "c"]);

        sort_by_price(&mut toys, SortOrder::Descending);
        assert_eq!(names(&toys), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_ack_serialization() {
        let id = ObjectId::new();
        let insert = serde_json::to_value(InsertAck::new(id)).unwrap();
        assert_eq!(insert["insertedId"], id.to_hex());
        assert_eq!(insert["acknowledged"], true);

        let update = serde_json::to_value(UpdateAck::counts(0, 0)).unwrap();
        assert_eq!(update["matchedCount"], 0);
        assert!(update["upsertedId"].is_null());

        let delete = serde_json::to_value(DeleteAck::count(1)).unwrap();
        assert_eq!(delete["deletedCount"], 1);
    }
}
