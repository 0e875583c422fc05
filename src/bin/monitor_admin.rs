//! Monitor Admin - one-shot maintenance commands against the store
//!
//! ```bash
//! cargo run --bin monitor_admin -- migrate
//! cargo run --bin monitor_admin -- check-columns <table>
//! cargo run --bin monitor_admin -- reset --yes
//! cargo run --bin monitor_admin -- report <address>
//! cargo run --bin monitor_admin -- summary [--start <height>] [--end <height>]
//! ```
//!
//! Uses the same environment as `monitor_runtime`.

use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use valmon::store::connect_with_retry;
use valmon::{MetricsQuery, MonitorConfig, SchemaManager};

fn usage() -> &'static str {
    "usage: monitor_admin <migrate | check-columns <table> | reset --yes | report <address> | summary [--start N] [--end N]>"
}

/// Value following `flag`, parsed
fn flag_value(args: &[String], flag: &str) -> Result<Option<i64>, Box<dyn std::error::Error>> {
    match args.iter().position(|a| a == flag) {
        Some(idx) => {
            let raw = args
                .get(idx + 1)
                .ok_or_else(|| format!("{} requires a value", flag))?;
            Ok(Some(raw.parse()?))
        }
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).ok_or(usage())?;

    let config = MonitorConfig::from_env();
    let pool = Arc::new(connect_with_retry(&config.db_path, config.pool_options(), config.connect_backoff()).await?);
    let mut schema = SchemaManager::new(pool.clone());
    if let Some(dir) = &config.extra_sql_dir {
        schema = schema.with_extra_sql_dir(dir);
    }

    match command {
        "migrate" => {
            schema.ensure_schema().await?;
            println!("schema ready: {}", config.db_path.display());
        }
        "check-columns" => {
            let table = args.get(2).ok_or(usage())?;
            let added = schema.check_columns(table).await?;
            if added.is_empty() {
                println!("{}: up to date", table);
            } else {
                println!("{}: added {}", table, added.join(", "));
            }
        }
        "reset" => {
            if !args.iter().any(|a| a == "--yes") {
                return Err("reset deletes every row; pass --yes to confirm".into());
            }
            schema.ensure_schema().await?;
            schema.reset_all().await?;
            println!("all tables emptied");
        }
        "report" => {
            let address = args.get(2).ok_or(usage())?;
            let metrics = MetricsQuery::new(pool.clone());

            let member = metrics.get_validator(address).await?;
            let status = metrics.get_validator_status(address).await?;
            let report = serde_json::json!({
                "address": address,
                "member": member,
                "status": status,
                "uptime_24h": metrics.get_validator_uptime(address).await?,
                "rewards_24h": metrics.get_validator_rewards(address, 24 * 60 * 60).await?,
                "total_delegated": metrics.get_total_delegated(address).await?,
                "uptime_history": metrics.get_uptime_history(address, 10).await?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "summary" => {
            let metrics = MetricsQuery::new(pool.clone());
            let latest = metrics.get_latest_block().await?;
            let tip = latest.as_ref().map_or(0, |b| b.height);
            let end = flag_value(&args, "--end")?.unwrap_or(tip);
            let start = flag_value(&args, "--start")?.unwrap_or((end - 99).max(0));

            let committee_size = match &latest {
                Some(b) => metrics.get_committee_size_for_round(b.round).await?,
                None => 0,
            };

            let summary = serde_json::json!({
                "latest_block": latest,
                "range": [start, end],
                "blocks_in_range": metrics.get_block_count_in_height_range(start, end).await?,
                "average_block_time_secs": metrics.average_block_time(start, end).await?,
                "committee_size_latest_round": committee_size,
                "active_validators": metrics.get_active_validators().await?,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        other => {
            return Err(format!("unknown command {:?}\n{}", other, usage()).into());
        }
    }
    Ok(())
}
