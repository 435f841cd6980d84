//! MongoDB client and collection wrapper
//!
//! The client is an explicit handle: built once in `main`, cloned into the
//! stores that need it, and shut down when the server stops.

use bson::{doc, oid::ObjectId, Document};
use mongodb::{
    options::{
        ClientOptions, FindOptions, IndexOptions, ServerApi, ServerApiVersion,
        UpdateModifications,
    },
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::ToyshopError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Driver tuning applied on connect
#[derive(Debug, Clone)]
pub struct MongoSettings {
    /// Upper bound for pooled connections (driver default when None)
    pub max_pool_size: Option<u32>,
    /// Server selection and connect timeout
    pub timeout: Duration,
    /// Reported to the server in the handshake
    pub app_name: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            max_pool_size: None,
            timeout: Duration::from_secs(3),
            app_name: "toyshop".to_string(),
        }
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the deployment answers a ping
    pub async fn new(
        uri: &str,
        db_name: &str,
        settings: &MongoSettings,
    ) -> Result<Self, ToyshopError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| ToyshopError::Database(format!("Invalid MongoDB URI: {}", e)))?;

        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build(),
        );
        // Fail fast on an unreachable deployment instead of hanging startup
        options.server_selection_timeout = Some(settings.timeout);
        options.connect_timeout = Some(settings.timeout);
        options.max_pool_size = settings.max_pool_size;
        options.app_name = Some(settings.app_name.clone());

        let client = Client::with_options(options)
            .map_err(|e| ToyshopError::Database(format!("Failed to create MongoDB client: {}", e)))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ToyshopError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Pinged deployment, connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its schema indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, ToyshopError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get a collection without schema handling
    pub fn raw_collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client.database(&self.db_name).collection::<T>(name)
    }

    /// Close pooled connections and end server sessions
    pub async fn shutdown(self) {
        info!("Closing MongoDB client");
        self.client.shutdown().await;
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, ToyshopError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), ToyshopError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        let result = self
            .inner
            .create_indexes(indices)
            .await
            .map_err(|e| ToyshopError::Database(format!("Failed to create indexes: {}", e)))?;

        info!(
            collection = %self.inner.name(),
            indexes = ?result.index_names,
            "Indexes ensured"
        );

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, ToyshopError> {
        *item.mut_metadata() = Metadata::new();

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| ToyshopError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ToyshopError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, ToyshopError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| ToyshopError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter
    ///
    /// Documents that fail to deserialize are logged and skipped.
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, ToyshopError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| ToyshopError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, ToyshopError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| ToyshopError::Database(format!("Update failed: {}", e)))
    }

    /// Delete one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, ToyshopError> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| ToyshopError::Database(format!("Delete failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_fail_fast() {
        let settings = MongoSettings::default();
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert!(settings.max_pool_size.is_none());
    }

    // Connection tests need a running MongoDB instance; the store layer is
    // exercised against the in-memory store instead.
}
