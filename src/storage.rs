//! Storage boundary -- the engine consumes materialized collections.
//!
//! The dashboard's database lives behind this trait. Fetches return whole
//! `Vec`s (no lazy cursors); failures propagate unchanged and the engine
//! never retries -- retry policy belongs to the caller. The bundled
//! [`MemoryStore`] backs the CLI and the test suite.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::{CatalogSnapshot, RuleGroup};
use crate::model::{AuthLogRecord, LogRecord, TelemetrySample};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// The storage collaborator contract.
pub trait Storage {
    fn fetch_logs(&self) -> Result<Vec<LogRecord>, StorageError>;

    fn fetch_auth_logs(&self) -> Result<Vec<AuthLogRecord>, StorageError>;

    /// Load the group -> rule -> command tree, optionally narrowed to the
    /// given ids. Called once per query so rule edits are visible on the
    /// next call; no cross-request caching is permitted.
    fn fetch_rule_catalog(
        &self,
        group_ids: &[i64],
        rule_ids: &[i64],
    ) -> Result<CatalogSnapshot, StorageError>;

    /// Telemetry at or after `since`, optionally narrowed to one metric
    /// name. `None` fetches every metric.
    fn fetch_telemetry(
        &self,
        metric: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<TelemetrySample>, StorageError>;
}

/// In-memory storage: record collections loaded wholesale (e.g. from JSON
/// files by the CLI) and served back on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    logs: Vec<LogRecord>,
    auth_logs: Vec<AuthLogRecord>,
    groups: Vec<RuleGroup>,
    telemetry: Vec<TelemetrySample>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(mut self, logs: Vec<LogRecord>) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_auth_logs(mut self, auth_logs: Vec<AuthLogRecord>) -> Self {
        self.auth_logs = auth_logs;
        self
    }

    pub fn with_catalog(mut self, groups: Vec<RuleGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Vec<TelemetrySample>) -> Self {
        self.telemetry = telemetry;
        self
    }
}

impl Storage for MemoryStore {
    fn fetch_logs(&self) -> Result<Vec<LogRecord>, StorageError> {
        Ok(self.logs.clone())
    }

    fn fetch_auth_logs(&self) -> Result<Vec<AuthLogRecord>, StorageError> {
        Ok(self.auth_logs.clone())
    }

    fn fetch_rule_catalog(
        &self,
        group_ids: &[i64],
        rule_ids: &[i64],
    ) -> Result<CatalogSnapshot, StorageError> {
        Ok(CatalogSnapshot::new(self.groups.clone()).filtered(group_ids, rule_ids))
    }

    fn fetch_telemetry(
        &self,
        metric: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<TelemetrySample>, StorageError> {
        Ok(self
            .telemetry
            .iter()
            .filter(|s| s.timestamp >= since)
            .filter(|s| metric.map_or(true, |m| s.metric == m))
            .cloned()
            .collect())
    }
}
