//! Fairway settlement server

use clap::Parser;
use fairway::{
    api::ApiServer,
    clock::SystemClock,
    config::ConfigLoader,
    storage::{KvStore, MemoryStorage, RocksStorage},
};
use std::{path::Path, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fairway")]
#[command(about = "Golf tournament settlement engine", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, default_value = "fairway.toml")]
    config: String,

    /// API server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// API server port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Database directory (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Keep everything in memory instead of RocksDB
    #[arg(long)]
    in_memory: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = if Path::new(&args.config).exists() {
        ConfigLoader::new().with_path(&args.config)
    } else {
        ConfigLoader::new()
    };
    let mut config = loader.load()?;
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path;
    }
    if let Some(origins) = args.cors_origins {
        config.api.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    config.validate()?;

    if args.write_config {
        loader.save(&config, &args.config)?;
        println!("✅ Configuration written to {}", args.config);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .init();

    let store: Arc<dyn KvStore> = if args.in_memory {
        info!("🧪 Using in-memory storage; nothing survives a restart");
        Arc::new(MemoryStorage::new())
    } else {
        info!("📂 Opening database: {}", config.storage.data_directory);
        Arc::new(RocksStorage::new_with_config(&config.storage)?)
    };

    ApiServer::new(config, store, Arc::new(SystemClock)).run().await
}
