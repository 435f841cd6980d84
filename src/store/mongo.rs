//! MongoDB-backed stores

use bson::{doc, oid::ObjectId, Document};
use mongodb::{options::FindOptions, Collection};
use serde_json::Value;
use tracing::debug;

use crate::db::schemas::{gallery_to_json, ToyData, ToyDoc, ToyUpdate};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{DeleteAck, GalleryStore, InsertAck, Shutdown, ToyStore, UpdateAck};
use crate::types::{Result, ToyshopError};

/// Toys and gallery items in one MongoDB database
pub struct MongoStore {
    mongo: MongoClient,
    toys: MongoCollection<ToyDoc>,
    gallery: Collection<Document>,
}

impl MongoStore {
    /// Open both collections; ensures the toy indexes as a side effect
    pub async fn open(
        mongo: MongoClient,
        toy_collection: &str,
        gallery_collection: &str,
    ) -> Result<Self> {
        let toys = mongo.collection::<ToyDoc>(toy_collection).await?;
        let gallery = mongo.raw_collection::<Document>(gallery_collection);

        Ok(Self {
            mongo,
            toys,
            gallery,
        })
    }
}

/// Filter for a literal, case-insensitive substring of the toy name
pub fn name_search_filter(text: &str) -> Document {
    doc! { "data.name": { "$regex": regex::escape(text), "$options": "i" } }
}

/// Filter for an exact seller email match
pub fn seller_filter(email: &str) -> Document {
    doc! { "data.sellerEmail": email }
}

/// Find options for the bounded listing; zero means no limit to the driver
pub fn limit_options(limit: Option<u64>) -> Option<FindOptions> {
    let limit = i64::try_from(limit?).ok().filter(|n| *n > 0)?;
    Some(FindOptions::builder().limit(limit).build())
}

#[async_trait::async_trait]
impl ToyStore for MongoStore {
    async fn search_by_name(&self, text: &str) -> Result<Vec<ToyDoc>> {
        self.toys.find_many(name_search_filter(text), None).await
    }

    async fn list_by_seller(&self, email: &str) -> Result<Vec<ToyDoc>> {
        self.toys.find_many(seller_filter(email), None).await
    }

    async fn list(&self, limit: Option<u64>) -> Result<Vec<ToyDoc>> {
        self.toys.find_many(doc! {}, limit_options(limit)).await
    }

    async fn get(&self, id: ObjectId) -> Result<Option<ToyDoc>> {
        self.toys.find_one(doc! { "_id": id }).await
    }

    async fn insert(&self, data: ToyData) -> Result<InsertAck> {
        let id = self.toys.insert_one(ToyDoc::new(data)).await?;
        debug!(id = %id, "Toy inserted");
        Ok(InsertAck::new(id))
    }

    async fn update(&self, id: ObjectId, update: &ToyUpdate) -> Result<UpdateAck> {
        let result = self
            .toys
            .update_one(doc! { "_id": id }, update.to_set_document())
            .await?;
        Ok(result.into())
    }

    async fn delete(&self, id: ObjectId) -> Result<DeleteAck> {
        let result = self.toys.delete_one(doc! { "_id": id }).await?;
        Ok(result.into())
    }
}

#[async_trait::async_trait]
impl GalleryStore for MongoStore {
    async fn list_all(&self) -> Result<Vec<Value>> {
        use futures_util::TryStreamExt;

        let docs: Vec<Document> = self
            .gallery
            .find(doc! {})
            .await
            .map_err(|e| ToyshopError::Database(format!("Find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ToyshopError::Database(format!("Cursor failed: {}", e)))?;

        Ok(docs.into_iter().map(gallery_to_json).collect())
    }
}

#[async_trait::async_trait]
impl Shutdown for MongoStore {
    async fn shutdown(&self) {
        self.mongo.clone().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_search_escapes_metacharacters() {
        let filter = name_search_filter("car (2)");
        let clause = filter.get_document("data.name").unwrap();
        assert_eq!(clause.get_str("$regex").unwrap(), r"car \(2\)");
        assert_eq!(clause.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_seller_filter_is_exact() {
        assert_eq!(
            seller_filter("a@x.com"),
            doc! { "data.sellerEmail": "a@x.com" }
        );
    }

    #[test]
    fn test_limit_options() {
        assert!(limit_options(None).is_none());
        assert!(limit_options(Some(0)).is_none());
        assert_eq!(limit_options(Some(20)).unwrap().limit, Some(20));
        assert!(limit_options(Some(u64::MAX)).is_none());
    }
}
