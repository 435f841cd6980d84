//! Toyshop - HTTP backend for a toy car marketplace
//!
//! Serves a toy collection (search, per-seller listings, details, create,
//! update, delete) and a read-only gallery, backed by MongoDB or by an
//! in-memory store for local runs.

pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, ToyshopError};
