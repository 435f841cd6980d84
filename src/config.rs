//! Configuration for Toyshop
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};

use crate::db::schemas::{GALLERY_COLLECTION, TOY_COLLECTION};

/// Fallback when no credentials and no explicit URI are configured
const LOCAL_MONGODB_URI: &str = "mongodb://localhost:27017";

/// Toyshop - toy car marketplace backend
#[derive(Parser, Debug, Clone)]
#[command(name = "toyshop")]
#[command(about = "HTTP backend for toys and gallery items stored in MongoDB")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// MongoDB username
    #[arg(long, env = "DB_NAME")]
    pub db_user: Option<String>,

    /// MongoDB password
    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// Atlas cluster host used together with DB_NAME / DB_PASS
    #[arg(long, env = "MONGODB_CLUSTER", default_value = "cluster0.uetnypa.mongodb.net")]
    pub mongodb_cluster: String,

    /// Full MongoDB connection URI (takes precedence over credentials)
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "carToysDB")]
    pub database: String,

    /// Collection holding toys
    #[arg(long, env = "TOY_COLLECTION", default_value = TOY_COLLECTION)]
    pub toy_collection: String,

    /// Collection holding gallery items
    #[arg(long, env = "GALLERY_COLLECTION", default_value = GALLERY_COLLECTION)]
    pub gallery_collection: String,

    /// Upper bound for the driver connection pool
    #[arg(long, env = "MONGODB_MAX_POOL_SIZE")]
    pub max_pool_size: Option<u32>,

    /// Serve from a process-local store instead of MongoDB (development only)
    #[arg(long, env = "IN_MEMORY_STORE", default_value = "false")]
    pub in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Socket address the server binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Resolve the connection URI
    ///
    /// Explicit URI first, then an SRV URI built from credentials, then localhost.
    pub fn mongodb_uri(&self) -> String {
        if let Some(ref uri) = self.mongodb_uri {
            return uri.clone();
        }

        match (&self.db_user, &self.db_pass) {
            (Some(user), Some(pass)) => format!(
                "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.mongodb_cluster
            ),
            _ => LOCAL_MONGODB_URI.to_string(),
        }
    }

    /// Connection target with credentials stripped, safe to log
    pub fn mongodb_target(&self) -> String {
        let uri = self.mongodb_uri();
        match (uri.find("://"), uri.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
            }
            _ => uri,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if self.mongodb_uri.is_none() && self.db_user.is_some() != self.db_pass.is_some() {
            return Err("DB_NAME and DB_PASS must be set together".to_string());
        }

        if self.database.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        if self.toy_collection.trim().is_empty() || self.gallery_collection.trim().is_empty() {
            return Err("collection names must not be empty".to_string());
        }

        Ok(())
    }
}
