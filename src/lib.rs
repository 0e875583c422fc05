//! # valmon: validator monitor persistence core
//!
//! Persists block, committee and batch facts produced by an external
//! consensus network and derives per-validator liveness state from them.
//!
//! ## Module Organization
//!
//! - `store` - owned SQLite connection pool, pragmas, startup retry
//! - `schema` - create-if-missing schema and additive column evolution
//! - `ingest` - idempotent writers (last-write-wins / no-op-on-conflict)
//! - `status` - active/inactive state machine and uptime snapshots
//! - `metrics` - read-only aggregates for API and alerting collaborators
//! - `provider` - upstream chain-data interface and spool reader
//! - `sync` - poll-cycle jobs and the periodic runner
//! - `config` - environment configuration
//!
//! Data flow: chain provider → `ingest` → `status` reconciliation →
//! `metrics` reads.

pub mod amount;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod provider;
pub mod schema;
pub mod status;
pub mod store;
pub mod sync;

pub use amount::RewardAmount;
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use ingest::{IngestionStore, WriteOutcome};
pub use metrics::MetricsQuery;
pub use provider::ChainDataProvider;
pub use schema::SchemaManager;
pub use status::ValidatorStatusEngine;
pub use store::{ConnectionPool, PoolOptions};
