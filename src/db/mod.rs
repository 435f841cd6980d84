//! Database layer for Toyshop

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MongoSettings, MutMetadata};
