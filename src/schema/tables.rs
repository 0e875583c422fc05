//! Expected table and index definitions
//!
//! This is the persisted wire contract. Columns may be appended here in
//! later versions (they get added in place by `check_columns`); existing
//! columns are never removed or retyped.

/// One expected column
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    /// Column constraint used at CREATE time (e.g. `NOT NULL`)
    pub constraint: &'static str,
    pub default: Option<&'static str>,
    /// Part of the primary key; cannot be added by ALTER TABLE
    pub key: bool,
}

impl ColumnDef {
    fn fragment(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if !self.constraint.is_empty() {
            sql.push(' ');
            sql.push_str(self.constraint);
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    /// `ADD COLUMN` body, or `None` for key columns
    pub fn add_column_sql(&self) -> Option<String> {
        if self.key || self.constraint.contains("UNIQUE") {
            return None;
        }
        Some(self.fragment())
    }
}

const fn key(name: &'static str, sql_type: &'static str, constraint: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint,
        default: None,
        key: true,
    }
}

const fn col(name: &'static str, sql_type: &'static str, default: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint: "NOT NULL",
        default: Some(default),
        key: false,
    }
}

const fn nullable(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint: "",
        default: None,
        key: false,
    }
}

/// Table definition: columns plus table-level constraints
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub constraints: &'static [&'static str],
}

impl TableSchema {
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.fragment()).collect();
        parts.extend(self.constraints.iter().map(|c| c.to_string()));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }
}

#[derive(Debug)]
pub struct IndexDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static str,
}

impl IndexDef {
    pub fn create_index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            self.name, self.table, self.columns
        )
    }
}

pub const TABLE_SCHEMAS: &[TableSchema] = &[
    TableSchema {
        name: "blocks",
        columns: &[
            key("height", "INTEGER", "PRIMARY KEY"),
            key("hash", "TEXT", "NOT NULL UNIQUE"),
            col("previous_hash", "TEXT", "''"),
            col("round", "INTEGER", "0"),
            col("timestamp", "INTEGER", "0"),
            col("transactions_count", "INTEGER", "0"),
            nullable("block_reward", "TEXT"),
        ],
        constraints: &[],
    },
    TableSchema {
        name: "committee_members",
        columns: &[
            key("address", "TEXT", "PRIMARY KEY"),
            col("first_seen_block", "INTEGER", "0"),
            col("last_seen_block", "INTEGER", "0"),
            col("total_stake", "TEXT", "'0'"),
            col("is_open", "INTEGER", "0"),
            col("commission", "INTEGER", "0"),
            col("is_active", "INTEGER", "1"),
            col("last_updated", "INTEGER", "0"),
        ],
        constraints: &["CHECK (first_seen_block <= last_seen_block)"],
    },
    TableSchema {
        name: "committee_participation",
        columns: &[
            key("id", "INTEGER", "PRIMARY KEY AUTOINCREMENT"),
            key("committee_member_address", "TEXT", "NOT NULL"),
            key("round", "INTEGER", "NOT NULL"),
            col("block_height", "INTEGER", "0"),
            col("timestamp", "INTEGER", "0"),
        ],
        constraints: &["UNIQUE (committee_member_address, round)"],
    },
    TableSchema {
        name: "batches",
        columns: &[
            key("batch_id", "TEXT", "PRIMARY KEY"),
            col("author", "TEXT", "''"),
            col("round", "INTEGER", "0"),
            col("committee_id", "TEXT", "''"),
            col("block_height", "INTEGER", "0"),
        ],
        constraints: &[],
    },
    TableSchema {
        name: "uptime_snapshots",
        columns: &[
            key("id", "INTEGER", "PRIMARY KEY AUTOINCREMENT"),
            key("address", "TEXT", "NOT NULL"),
            key("start_round", "INTEGER", "NOT NULL"),
            key("end_round", "INTEGER", "NOT NULL"),
            col("total_rounds", "INTEGER", "0"),
            col("participated_rounds", "INTEGER", "0"),
            col("uptime_percentage", "REAL", "0"),
            col("timestamp", "INTEGER", "0"),
        ],
        constraints: &["UNIQUE (address, start_round, end_round)"],
    },
    TableSchema {
        name: "validator_rewards",
        columns: &[
            key("address", "TEXT", "NOT NULL"),
            key("block_height", "INTEGER", "NOT NULL"),
            col("reward", "TEXT", "'0'"),
            col("timestamp", "INTEGER", "0"),
        ],
        constraints: &["PRIMARY KEY (address, block_height)"],
    },
    TableSchema {
        name: "delegator_rewards",
        columns: &[
            key("address", "TEXT", "NOT NULL"),
            key("block_height", "INTEGER", "NOT NULL"),
            col("reward", "TEXT", "'0'"),
            col("timestamp", "INTEGER", "0"),
        ],
        constraints: &["PRIMARY KEY (address, block_height)"],
    },
    TableSchema {
        name: "delegations",
        columns: &[
            key("delegator", "TEXT", "NOT NULL"),
            key("validator", "TEXT", "NOT NULL"),
            col("amount", "TEXT", "'0'"),
            col("last_updated", "INTEGER", "0"),
        ],
        constraints: &["PRIMARY KEY (delegator, validator)"],
    },
    TableSchema {
        name: "validator_status",
        columns: &[
            key("address", "TEXT", "PRIMARY KEY"),
            col("last_active_round", "INTEGER", "0"),
            col("consecutive_inactive_rounds", "INTEGER", "0"),
            col("is_active", "INTEGER", "1"),
            col("last_updated", "INTEGER", "0"),
            nullable("last_evaluated_round", "INTEGER"),
        ],
        constraints: &[],
    },
];

pub const INDEXES: &[IndexDef] = &[
    IndexDef { name: "idx_blocks_round", table: "blocks", columns: "round" },
    IndexDef { name: "idx_blocks_timestamp", table: "blocks", columns: "timestamp" },
    IndexDef { name: "idx_participation_round", table: "committee_participation", columns: "round" },
    IndexDef {
        name: "idx_participation_block_height",
        table: "committee_participation",
        columns: "block_height",
    },
    IndexDef { name: "idx_batches_round", table: "batches", columns: "round" },
    IndexDef { name: "idx_batches_author", table: "batches", columns: "author" },
    IndexDef {
        name: "idx_uptime_snapshots_address_timestamp",
        table: "uptime_snapshots",
        columns: "address, timestamp DESC",
    },
    IndexDef {
        name: "idx_validator_rewards_timestamp",
        table: "validator_rewards",
        columns: "address, timestamp",
    },
];
