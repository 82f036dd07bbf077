//! # cache-doctor
//!
//! Operator tool for the shared Comunidad cache: probe health, print
//! statistics, and drop keys by pattern or entity type.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comunidad_cache::{keys, CacheClient, CacheHealthCheck, CacheService, InvalidationStrategy};
use comunidad_config::ConfigLoader;
use comunidad_core::{telemetry, EntityType};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cache-doctor", version, about = "Inspect and maintain the Comunidad cache", long_about = None)]
struct Cli {
    /// Directory holding default.toml and environment overrides
    #[arg(long, default_value = "./config", env = "COMUNIDAD_CONFIG_DIR")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe connectivity, latency and memory
    Health,
    /// Print key count, memory and hit rate
    Stats,
    /// Delete every key under the configured prefix
    Clear,
    /// Delete keys matching an unprefixed glob pattern
    Invalidate {
        pattern: String,
        /// Publish the pattern for every listener instead of sweeping here
        #[arg(long)]
        lazy: bool,
    },
    /// Delete every key of one entity type (e.g. `tema`)
    Entity { entity_type: EntityType },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("cache-doctor failed: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loader = ConfigLoader::new(&cli.config_dir).context("loading configuration")?;
    let config = loader.get().await;

    telemetry::init_tracing(&config.observability.log_level, &config.observability.log_format)?;

    let client = Arc::new(CacheClient::new(&config.redis)?);
    client
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.redis.url))?;
    info!(prefix = %config.cache.key_prefix, "Connected to cache");

    let cache = CacheService::new(client.clone(), &config.cache);

    match cli.command {
        Command::Health => {
            let health = CacheHealthCheck::new(client.clone(), &config.cache)
                .check_health()
                .await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats().await)?);
        }
        Command::Clear => {
            let before = cache.stats().await.keys;
            cache.clear().await;
            println!("cleared {} keys under {}", before, cache.prefix());
        }
        Command::Invalidate { pattern, lazy } => {
            if lazy {
                cache.invalidate(&pattern, InvalidationStrategy::Lazy).await;
                println!("published {} on {}", pattern, cache.invalidation_channel());
            } else {
                cache.invalidate(&pattern, InvalidationStrategy::Immediate).await;
                println!("invalidated {}{}", cache.prefix(), pattern);
            }
        }
        Command::Entity { entity_type } => {
            let pattern = keys::pattern(entity_type);
            cache.invalidate(&pattern, InvalidationStrategy::Immediate).await;
            println!("invalidated {}{}", cache.prefix(), pattern);
        }
    }

    client.disconnect().await;
    Ok(())
}
