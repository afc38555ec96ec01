//! Remote query bridge
//!
//! All remote database access goes through a [`QueryBridge`]. The production
//! implementation, [`WranglerBridge`], shells out to the `wrangler d1` CLI
//! once per call; anything able to run literal SQL can stand in for it
//! without touching the bulk store.
//!
//! A multi-statement call is not atomic: a failure midway can leave an
//! arbitrary prefix applied. Callers account per statement and treat a
//! failed call as "nothing applied".

mod statement;
mod wrangler;

pub use statement::{render_batch, SqlValue, Statement, STATEMENT_SEPARATOR};
pub use wrangler::WranglerBridge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Row-count metadata reported for one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementMeta {
    pub duration: f64,
    pub changes: u64,
    pub last_row_id: i64,
    pub rows_read: u64,
    pub rows_written: u64,
}

/// Outcome of one statement within a bridge call
#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub success: bool,
    pub meta: StatementMeta,
    pub rows: Vec<Value>,
    pub error: Option<String>,
}

impl StatementResult {
    /// Success reported without per-statement detail
    pub fn opaque_success() -> Self {
        Self {
            success: true,
            meta: StatementMeta {
                changes: 1,
                rows_written: 1,
                ..StatementMeta::default()
            },
            rows: Vec::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            meta: StatementMeta::default(),
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Read one element of the bridge's JSON output
    pub fn from_json(value: &Value) -> Self {
        let success = value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let meta = value
            .get("meta")
            .cloned()
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();

        let rows = value
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let error = value.get("error").and_then(|e| match e {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });

        Self {
            success,
            meta,
            rows,
            error: if success { error } else { error.or_else(|| Some("Unknown error".to_string())) },
        }
    }

    /// Read a text column from every returned row
    pub fn column_text(&self, column: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| match row.get(column)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Read an integer column from the first returned row
    pub fn first_integer(&self, column: &str) -> Option<u64> {
        let value = self.rows.first()?.get(column)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

/// Raw output of a successful bridge invocation
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Json(Value),
    Opaque(String),
}

impl RawOutput {
    /// Parse stdout as JSON when it looks like a JSON value
    pub fn parse(stdout: &str) -> Self {
        let trimmed = stdout.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(trimmed) {
                return RawOutput::Json(value);
            }
        }
        RawOutput::Opaque(stdout.to_string())
    }

    /// Per-statement results, index-aligned with the submitted statements.
    ///
    /// Falls back to reporting every statement successful when the output
    /// does not carry one entry per statement.
    pub fn statement_results(&self, expected: usize) -> Vec<StatementResult> {
        match self {
            RawOutput::Json(Value::Array(items)) if items.len() == expected => {
                items.iter().map(StatementResult::from_json).collect()
            },
            _ => vec![StatementResult::opaque_success(); expected],
        }
    }

    /// Result of the first statement, used for row-returning queries
    pub fn first_result(&self) -> StatementResult {
        match self {
            RawOutput::Json(Value::Array(items)) => items
                .first()
                .map(StatementResult::from_json)
                .unwrap_or_else(StatementResult::opaque_success),
            RawOutput::Json(value @ Value::Object(_)) => StatementResult::from_json(value),
            _ => StatementResult::opaque_success(),
        }
    }
}

/// Narrow interface to the remote relational store
#[async_trait]
pub trait QueryBridge: Send + Sync {
    /// Execute literal SQL in one invocation
    async fn execute(&self, sql: &str) -> Result<RawOutput>;

    /// Execute several statements in one invocation.
    ///
    /// Results are index-aligned with `statements`. An `Err` means the
    /// status of every statement is unknown.
    async fn execute_many(&self, statements: &[Statement]) -> Result<Vec<StatementResult>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.execute(&render_batch(statements)).await?;
        Ok(output.statement_results(statements.len()))
    }

    /// Execute one row-returning statement
    async fn query(&self, statement: &Statement) -> Result<StatementResult> {
        let output = self.execute(&statement.render()).await?;
        Ok(output.first_result())
    }
}
