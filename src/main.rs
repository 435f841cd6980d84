//! Toyshop - toy car marketplace backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use toyshop::{
    config::Args,
    db::{MongoClient, MongoSettings},
    logging, server,
    store::MongoStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Toyshop - toy car marketplace");
    info!("======================================");
    info!("Listen: {}", args.listen_addr());
    if args.in_memory {
        info!("Store: in-memory (data is lost on exit)");
    } else {
        info!("MongoDB: {}", args.mongodb_target());
        info!("Database: {}", args.database);
        info!(
            "Collections: toys={}, gallery={}",
            args.toy_collection, args.gallery_collection
        );
    }
    info!("======================================");

    let state = if args.in_memory {
        AppState::in_memory(args)
    } else {
        let settings = MongoSettings {
            max_pool_size: args.max_pool_size,
            ..MongoSettings::default()
        };

        let mongo = match MongoClient::new(&args.mongodb_uri(), &args.database, &settings).await {
            Ok(client) => client,
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };

        let store = MongoStore::open(mongo, &args.toy_collection, &args.gallery_collection).await?;
        AppState::new(args, Arc::new(store))
    };

    let state = Arc::new(state);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = server::run(Arc::clone(&state), shutdown).await;

    state.shutdown().await;
    info!("Toyshop stopped");

    result.map_err(Into::into)
}
