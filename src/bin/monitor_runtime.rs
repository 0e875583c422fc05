//! Monitor Runtime
//!
//! - Connects to the SQLite store (bounded exponential backoff)
//! - Ensures the schema (fatal on failure)
//! - Spawns block sync, committee refresh, status reconcile and uptime jobs
//!
//! Usage:
//!   cargo run --release --bin monitor_runtime
//!
//! Environment variables: see `MonitorConfig::from_env`. `RUST_LOG`
//! controls log level (default: info).

use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;
use valmon::provider::SpoolProvider;
use valmon::store::connect_with_retry;
use valmon::sync::{spawn_jobs, ChainSync};
use valmon::{IngestionStore, MonitorConfig, SchemaManager, ValidatorStatusEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = MonitorConfig::from_env();

    info!("🚀 Validator monitor starting");
    info!("   ├─ Database: {}", config.db_path.display());
    info!("   ├─ Pool size: {}", config.pool_size);
    info!("   ├─ Spool: {}", config.spool_dir.display());
    info!("   ├─ Block sync: every {}ms (max {} blocks)", config.block_sync_interval_ms, config.block_sync_max_batch);
    info!("   ├─ Committee refresh: every {}ms", config.committee_refresh_interval_ms);
    info!("   ├─ Status reconcile: every {}ms", config.status_reconcile_interval_ms);
    info!("   └─ Uptime: every {}ms over {} rounds", config.uptime_interval_ms, config.uptime_window_rounds);

    let pool = match connect_with_retry(&config.db_path, config.pool_options(), config.connect_backoff()).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };

    let mut schema = SchemaManager::new(pool.clone());
    if let Some(dir) = &config.extra_sql_dir {
        schema = schema.with_extra_sql_dir(dir);
    }
    if let Err(e) = schema.ensure_schema().await {
        error!("❌ Schema migration failed, aborting: {}", e);
        return Err(e.into());
    }
    info!("✅ Schema ready");

    let store = IngestionStore::new(pool.clone());
    let engine = Arc::new(ValidatorStatusEngine::new(pool.clone()));
    let provider = Arc::new(SpoolProvider::new(&config.spool_dir));
    let sync = Arc::new(ChainSync::new(provider, store, engine, &config));

    let handles = spawn_jobs(sync, &config);
    info!("✅ {} jobs running", handles.len());
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
    }

    for handle in handles {
        handle.abort();
    }

    info!("✅ Validator monitor stopped");
    Ok(())
}
