//! `wrangler d1 execute` subprocess bridge

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{QueryBridge, RawOutput};
use crate::config::BridgeConfig;
use crate::error::{IngestError, Result};

/// Locally installed wrangler, preferred over `npx wrangler`
const LOCAL_WRANGLER: &str = "node_modules/.bin/wrangler";

/// Maximum characters of SQL echoed into debug logs
const SQL_PREVIEW_CHARS: usize = 200;

/// Bridge that spawns one `wrangler d1 execute` process per call
pub struct WranglerBridge {
    program: String,
    base_args: Vec<String>,
    database_name: String,
    remote: bool,
    timeout: Duration,
}

impl WranglerBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        let (program, base_args) = match &config.program {
            Some(program) => (program.clone(), config.program_args.clone()),
            None if Path::new(LOCAL_WRANGLER).exists() => {
                (LOCAL_WRANGLER.to_string(), vec!["d1".to_string()])
            },
            None => (
                "npx".to_string(),
                vec!["wrangler".to_string(), "d1".to_string()],
            ),
        };

        Self {
            program,
            base_args,
            database_name: config.database_name.clone(),
            remote: config.remote,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Full argument list for one invocation
    pub fn command_args(&self, sql: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "execute".to_string(),
            self.database_name.clone(),
            "--command".to_string(),
            sql.to_string(),
            "--json".to_string(),
        ]);
        if self.remote {
            args.push("--remote".to_string());
        }
        args
    }
}

fn preview(sql: &str) -> &str {
    match sql.char_indices().nth(SQL_PREVIEW_CHARS) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

#[async_trait]
impl QueryBridge for WranglerBridge {
    async fn execute(&self, sql: &str) -> Result<RawOutput> {
        debug!(
            program = %self.program,
            database = %self.database_name,
            sql = %preview(sql),
            "Invoking bridge"
        );

        let child = Command::new(&self.program)
            .args(self.command_args(sql))
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IngestError::BridgeExecution(format!("Failed to spawn {}: {}", self.program, e))
            })?;

        // Dropping the pending future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                IngestError::BridgeExecution(format!("Failed to collect bridge output: {}", e))
            })?,
            Err(_) => return Err(IngestError::BridgeTimeout(self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);

        if output.status.success() {
            return Ok(RawOutput::parse(&stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let details = if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else if !stdout.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            "No error details available".to_string()
        };
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        Err(IngestError::BridgeExecution(format!(
            "wrangler command failed (exit code {}): {}",
            code, details
        )))
    }
}
