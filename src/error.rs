//! Error taxonomy shared by the store, the status engine and the query layer
//!
//! Every failure that leaves this crate is a `MonitorError`. Append-only
//! writes that hit an existing row are NOT errors: they report
//! `WriteOutcome::ConflictNoop` instead (see `ingest`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Store unreachable (fatal at startup once the retry budget is spent)
    #[error("connection error: {0}")]
    Connection(String),

    /// DDL failure during migration; the caller must abort startup
    #[error("schema error: {0}")]
    Schema(String),

    /// Underlying store failure wrapped with the operation that hit it
    #[error("{op} error: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Record rejected at the write boundary before touching the store
    #[error("validation error: {0}")]
    Validation(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    /// Closure for `map_err` that tags a rusqlite failure with its operation
    pub fn query(op: &'static str) -> impl FnOnce(rusqlite::Error) -> MonitorError {
        move |source| MonitorError::Query { op, source }
    }

    /// Same as [`MonitorError::query`] but keeps validation errors raised
    /// inside a transaction closure intact.
    pub fn context(op: &'static str) -> impl FnOnce(MonitorError) -> MonitorError {
        move |err| match err {
            MonitorError::Query { source, .. } => MonitorError::Query { op, source },
            other => other,
        }
    }

    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, MonitorError::Connection(_) | MonitorError::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_operation_context() {
        let err = MonitorError::query("getValidators")(rusqlite::Error::InvalidQuery);
        let msg = err.to_string();
        assert!(msg.starts_with("getValidators error: "), "got {}", msg);
        assert!(!err.is_fatal_at_startup());
    }

    #[test]
    fn test_context_rewrites_only_query_errors() {
        let inner = MonitorError::query("inner")(rusqlite::Error::InvalidQuery);
        let outer = MonitorError::context("upsertBlocks")(inner);
        assert!(outer.to_string().starts_with("upsertBlocks error: "));

        let validation = MonitorError::Validation("empty hash".to_string());
        let kept = MonitorError::context("upsertBlocks")(validation);
        assert!(matches!(kept, MonitorError::Validation(_)));
    }

    #[test]
    fn test_startup_fatal_classes() {
        assert!(MonitorError::Schema("boom".into()).is_fatal_at_startup());
        assert!(MonitorError::Connection("down".into()).is_fatal_at_startup());
        assert!(!MonitorError::Validation("bad".into()).is_fatal_at_startup());
    }
}
