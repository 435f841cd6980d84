//! Process-local store
//!
//! Keeps toys in insertion order so listings match the natural order a fresh
//! MongoDB collection would return. Nothing survives a restart.

use bson::{oid::ObjectId, Document};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::db::schemas::{gallery_to_json, ToyData, ToyDoc, ToyUpdate};
use crate::store::{DeleteAck, GalleryStore, InsertAck, Shutdown, ToyStore, UpdateAck};
use crate::types::Result;

/// In-memory toys and gallery items
#[derive(Default)]
pub struct MemoryStore {
    toys: RwLock<Vec<ToyDoc>>,
    gallery: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed gallery items (the API exposes no write path for them)
    pub fn with_gallery(gallery: Vec<Document>) -> Self {
        Self {
            toys: RwLock::new(Vec::new()),
            gallery: RwLock::new(gallery),
        }
    }
}

#[async_trait::async_trait]
impl ToyStore for MemoryStore {
    async fn search_by_name(&self, text: &str) -> Result<Vec<ToyDoc>> {
        let needle = text.to_lowercase();
        let toys = self.toys.read().await;
        Ok(toys
            .iter()
            .filter(|t| t.data.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn list_by_seller(&self, email: &str) -> Result<Vec<ToyDoc>> {
        let toys = self.toys.read().await;
        Ok(toys
            .iter()
            .filter(|t| t.data.seller_email == email)
            .cloned()
            .collect())
    }

    async fn list(&self, limit: Option<u64>) -> Result<Vec<ToyDoc>> {
        let toys = self.toys.read().await;
        let take = match limit {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => usize::MAX,
        };
        Ok(toys.iter().take(take).cloned().collect())
    }

    async fn get(&self, id: ObjectId) -> Result<Option<ToyDoc>> {
        let toys = self.toys.read().await;
        Ok(toys.iter().find(|t| t._id == Some(id)).cloned())
    }

    async fn insert(&self, data: ToyData) -> Result<InsertAck> {
        let id = ObjectId::new();
        let mut toy = ToyDoc::new(data);
        toy._id = Some(id);

        self.toys.write().await.push(toy);
        Ok(InsertAck::new(id))
    }

    async fn update(&self, id: ObjectId, update: &ToyUpdate) -> Result<UpdateAck> {
        let mut toys = self.toys.write().await;
        let Some(toy) = toys.iter_mut().find(|t| t._id == Some(id)) else {
            return Ok(UpdateAck::counts(0, 0));
        };

        // `updated_at` always changes, so a matched document counts as modified
        toy.apply(update);
        Ok(UpdateAck::counts(1, 1))
    }

    async fn delete(&self, id: ObjectId) -> Result<DeleteAck> {
        let mut toys = self.toys.write().await;
        let before = toys.len();
        toys.retain(|t| t._id != Some(id));
        Ok(DeleteAck::count((before - toys.len()) as u64))
    }
}

#[async_trait::async_trait]
impl GalleryStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Value>> {
        let gallery = self.gallery.read().await;
        Ok(gallery.iter().cloned().map(gallery_to_json).collect())
    }
}

#[async_trait::async_trait]
impl Shutdown for MemoryStore {
    async fn shutdown(&self) {}
}
