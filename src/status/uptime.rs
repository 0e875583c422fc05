//! Uptime over a closed round window
//!
//! `total` is the number of distinct rounds in which anyone on the network
//! participated, `participated` the subset in which the address did.

use crate::error::{MonitorError, MonitorResult};
use crate::model::UptimeSnapshot;
use rusqlite::{params, Connection};

/// `participated / total * 100`, or `0.0` for an empty window
pub fn uptime_percentage(participated: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = participated as f64 / total as f64 * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Counts for `[start_round, end_round]`; caller owns the transaction
pub(crate) fn compute_window(
    conn: &Connection,
    address: &str,
    start_round: i64,
    end_round: i64,
    now: i64,
) -> MonitorResult<UptimeSnapshot> {
    if start_round > end_round {
        return Err(MonitorError::Validation(format!(
            "uptime window [{}, {}] is inverted",
            start_round, end_round
        )));
    }

    let total_rounds: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT round) FROM committee_participation
             WHERE round BETWEEN ?1 AND ?2",
            params![start_round, end_round],
            |row| row.get(0),
        )
        .map_err(MonitorError::query("computeUptime"))?;

    let participated_rounds: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT round) FROM committee_participation
             WHERE committee_member_address = ?1 AND round BETWEEN ?2 AND ?3",
            params![address, start_round, end_round],
            |row| row.get(0),
        )
        .map_err(MonitorError::query("computeUptime"))?;

    Ok(UptimeSnapshot {
        address: address.to_string(),
        start_round,
        end_round,
        total_rounds,
        participated_rounds,
        uptime_percentage: uptime_percentage(participated_rounds, total_rounds),
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_percentage() {
        assert_eq!(uptime_percentage(10, 10), 100.0);
        assert_eq!(uptime_percentage(0, 10), 0.0);
        assert_eq!(uptime_percentage(0, 0), 0.0);
        assert_eq!(uptime_percentage(1, 4), 25.0);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = compute_window(&conn, "aleo1a", 10, 5, 0).unwrap_err();
        assert!(matches!(err, MonitorError::Validation(_)));
    }
}
