// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fleet_store::config::{apply_env_overrides, load_config_with_env, ConfigLoader};
use fleet_store::directory::{resolve_server_address, NodeDirectory, ZenohDirectory};
use fleet_store::storage::{PartitionedFileWriter, StorageBackend};
use fleet_store::{
    FleetStoreConfig, RecordPipeline, SubscriptionEngine, SubscriptionSettings, ZenohTransport,
};

const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

/// Fleet Store - Record fleet telemetry from the bus into daily CSV files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults are used when the default path is absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node ID server address (overrides config file)
    #[arg(long)]
    nodesrv: Option<String>,

    /// Local bus server address, bypassing the registered one
    #[arg(long)]
    local: Option<String>,

    /// Log level (overrides config file; RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,
}

fn load_configuration(args: &Args) -> Result<FleetStoreConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_config_with_env(DEFAULT_CONFIG_PATH)?
        }
        None => {
            let mut config = FleetStoreConfig::default();
            apply_env_overrides(&mut config);
            config
        }
    };

    // Apply CLI overrides
    if let Some(nodesrv) = &args.nodesrv {
        config.directory.address = nodesrv.clone();
    }
    if let Some(local) = &args.local {
        if !local.is_empty() {
            config.bus.local_server = Some(local.clone());
        }
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_configuration(&args)?;

    // Initialize tracing with configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Fleet-Store({}) starting", env!("CARGO_PKG_VERSION"));

    // Storage directory is fixed relative to where the process started
    let storage_dir = PathBuf::from(&config.storage.directory);
    if storage_dir.is_relative() {
        let cwd = std::env::current_dir().context("Can't obtain current working directory")?;
        config.storage.directory = cwd.join(storage_dir).to_string_lossy().to_string();
    }
    info!("Storing records under: {}", config.storage.directory);

    // Register with the node directory
    let directory = ZenohDirectory::connect(&config.directory)
        .await
        .context("Can't register node")?;
    let registration = directory
        .register(&config.directory.node_name, &[config.bus.channel_type])
        .await
        .context("Can't register node")?;

    let server_address =
        resolve_server_address(&registration, config.bus.local_server.as_deref());
    info!("Connecting bus server at [{}]", server_address);

    // First connect is the only fatal transport failure
    let transport = Arc::new(ZenohTransport::new(&config.bus));
    let settings =
        SubscriptionSettings::from_config(server_address, &config.bus, &config.subscription);
    let engine = match SubscriptionEngine::connect(transport, settings).await {
        Ok(engine) => engine,
        Err(e) => {
            error!("Can't connect bus server: {}", e);
            if let Err(e) = directory.unregister(&registration).await {
                warn!("Failed to unregister node: {}", e);
            }
            directory.close().await;
            return Err(e).context("Can't connect bus server");
        }
    };

    let pipeline = RecordPipeline::new(PartitionedFileWriter::new(&config.storage));
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(pipeline, shutdown.clone()));

    // Run until Ctrl+C
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received Ctrl+C, shutting down");
    shutdown.cancel();

    // Cleanup
    match engine_task.await {
        Ok(pipeline) => {
            let stats = pipeline.stats();
            info!(
                "Processed {} deliveries: {} written, {} malformed, {} dropped by storage",
                stats.delivered, stats.written, stats.decode_failures, stats.storage_failures
            );
            pipeline.into_storage().close().await;
        }
        Err(e) => error!("Subscription task failed: {}", e),
    }

    if let Err(e) = directory.unregister(&registration).await {
        warn!("Failed to unregister node: {}", e);
    }
    directory.close().await;

    info!("Fleet Store shut down successfully");
    Ok(())
}
