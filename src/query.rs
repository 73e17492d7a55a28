//! Query facade: filtering, pagination, and composition of the matcher,
//! session pairing, and telemetry aggregation.
//!
//! Filter semantics are explicit here instead of the open-ended predicate
//! object the dashboard used to accumulate: categories combine with AND,
//! values within a category with OR. Rule-resolved command patterns are
//! their own category -- they do not widen the free-text search.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matcher::{self, CommandMatch};
use crate::model::{AuthLogRecord, LogRecord};
use crate::series::{self, SeriesKeying, TimeBucket, TimeRange, UsageBucket};
use crate::sessions::{self, PairedEvent};
use crate::storage::Storage;

/// Admission control: the O(n^2) pairing pass is bounded by page size, so
/// page size itself is bounded here.
pub const MAX_PAGE_SIZE: usize = 5000;

/// Filter over system logs. Empty collections and `None` fields mean "no
/// constraint"; present categories are ANDed together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    /// Free-text search over name, user, and command.
    pub search: Option<String>,
    pub hosts: Vec<String>,
    /// Matches the action field exactly, or the name field by containment.
    pub actions: Vec<String>,
    /// Rule-group ids resolved to command patterns at query time.
    pub rule_groups: Vec<i64>,
    /// Rule ids resolved to command patterns at query time.
    pub rules: Vec<i64>,
    pub cpu_threshold: Option<f64>,
    pub mem_threshold: Option<f64>,
}

impl LogFilter {
    fn wants_rule_patterns(&self) -> bool {
        !self.rule_groups.is_empty() || !self.rules.is_empty()
    }
}

/// Filter over auth logs. Hosts are matched by containment against the raw
/// entry -- the host is embedded positionally, not stored in a column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthLogFilter {
    /// Free-text search over username and the raw entry.
    pub search: Option<String>,
    pub hosts: Vec<String>,
}

/// 1-based page request with a clamped page size.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> usize {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// One page of system logs, session-paired, newest first.
#[derive(Debug, Serialize)]
pub struct LogPage {
    pub records: Vec<PairedEvent>,
    pub total_count: usize,
    pub page_count: usize,
    /// The command patterns the rule filters resolved to, so a caller can
    /// display which rule text drove the filter.
    pub matched_commands: Vec<String>,
}

/// One page of auth logs, newest first.
#[derive(Debug, Serialize)]
pub struct AuthLogPage {
    pub records: Vec<AuthLogRecord>,
    pub total_count: usize,
    pub page_count: usize,
}

/// Request-scoped engine over a storage collaborator. Stateless between
/// calls: every operation loads what it needs and returns a derived value,
/// so concurrent use needs no locking.
pub struct QueryEngine<S: Storage> {
    storage: S,
}

impl<S: Storage> QueryEngine<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Filtered, paginated system logs with login/logout pairing applied to
    /// the returned page.
    pub fn logs(&self, filter: &LogFilter, page: PageRequest) -> Result<LogPage> {
        // Rule filters resolve to command patterns through a fresh catalog
        // snapshot, so edits made since the last query are already visible.
        let patterns = if filter.wants_rule_patterns() {
            self.storage
                .fetch_rule_catalog(&filter.rule_groups, &filter.rules)
                .context("loading rule catalog")?
                .flatten_commands(&[], &[])
        } else {
            Vec::new()
        };

        let mut records = self.storage.fetch_logs().context("fetching logs")?;
        records.retain(|r| log_matches(r, filter, &patterns));
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total_count = records.len();
        let page_count = total_count.div_ceil(page.page_size());
        let page_records: Vec<LogRecord> = records
            .into_iter()
            .skip(page.skip())
            .take(page.page_size())
            .collect();

        debug!(
            total_count,
            page = page.page(),
            patterns = patterns.len(),
            "log query resolved"
        );

        Ok(LogPage {
            records: sessions::pair_sessions(&page_records),
            total_count,
            page_count,
            matched_commands: patterns,
        })
    }

    /// Filtered, paginated auth logs.
    pub fn auth_logs(&self, filter: &AuthLogFilter, page: PageRequest) -> Result<AuthLogPage> {
        let mut records = self
            .storage
            .fetch_auth_logs()
            .context("fetching auth logs")?;
        records.retain(|r| auth_log_matches(r, filter));
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total_count = records.len();
        let page_count = total_count.div_ceil(page.page_size());
        let records = records
            .into_iter()
            .skip(page.skip())
            .take(page.page_size())
            .collect();

        Ok(AuthLogPage {
            records,
            total_count,
            page_count,
        })
    }

    /// Run the command matcher over one filtered page of system logs, using
    /// the full catalog. Matching cost is bounded by page size.
    pub fn command_matches(&self, filter: &LogFilter, page: PageRequest) -> Result<Vec<CommandMatch>> {
        let catalog = self
            .storage
            .fetch_rule_catalog(&[], &[])
            .context("loading rule catalog")?;
        let page = self.logs(filter, page)?;
        let records: Vec<LogRecord> = page.records.into_iter().map(|p| p.record).collect();
        Ok(matcher::match_batch(&records, &catalog))
    }

    /// Auth-log counterpart of [`Self::command_matches`].
    pub fn auth_command_matches(
        &self,
        filter: &AuthLogFilter,
        page: PageRequest,
    ) -> Result<Vec<CommandMatch>> {
        let catalog = self
            .storage
            .fetch_rule_catalog(&[], &[])
            .context("loading rule catalog")?;
        let page = self.auth_logs(filter, page)?;
        Ok(matcher::match_auth_batch(&page.records, &catalog))
    }

    /// Per-host CPU/memory chart series over the requested window.
    pub fn usage_series(&self, range: TimeRange) -> Result<Vec<UsageBucket>> {
        let since = Utc::now() - range.window();
        let mut records = self.storage.fetch_logs().context("fetching logs")?;
        records.retain(|r| r.timestamp >= since);
        records.sort_by_key(|r| r.timestamp);
        Ok(series::aggregate_usage(&records, range))
    }

    /// Generic telemetry chart series over the requested window.
    pub fn telemetry_series(
        &self,
        metric: Option<&str>,
        range: TimeRange,
        keying: SeriesKeying,
    ) -> Result<Vec<TimeBucket>> {
        let since = Utc::now() - range.window();
        let mut samples = self
            .storage
            .fetch_telemetry(metric, since)
            .context("fetching telemetry")?;
        samples.sort_by_key(|s| s.timestamp);
        Ok(series::aggregate_samples(&samples, range, keying))
    }
}

/// AND across categories, OR within. Documented here because the dashboard's
/// original predicate folded several categories into one OR set; this
/// function is the single place the combination rule lives.
fn log_matches(record: &LogRecord, filter: &LogFilter, patterns: &[String]) -> bool {
    if let Some(search) = filter.search.as_deref() {
        if !search.is_empty() {
            let hit = record.name.contains(search)
                || record.user.as_deref().is_some_and(|u| u.contains(search))
                || record
                    .command
                    .as_deref()
                    .is_some_and(|c| c.contains(search));
            if !hit {
                return false;
            }
        }
    }

    if !filter.hosts.is_empty() {
        let hit = record
            .host
            .as_deref()
            .is_some_and(|h| filter.hosts.iter().any(|f| f == h));
        if !hit {
            return false;
        }
    }

    if !filter.actions.is_empty() {
        let action_hit = record
            .action
            .as_deref()
            .is_some_and(|a| filter.actions.iter().any(|f| f == a));
        let name_hit = filter.actions.iter().any(|f| record.name.contains(f.as_str()));
        if !action_hit && !name_hit {
            return false;
        }
    }

    // Rule filters were requested but resolved to patterns; a record must
    // contain at least one of them in its command field.
    if !patterns.is_empty() {
        let hit = record
            .command
            .as_deref()
            .is_some_and(|c| patterns.iter().any(|p| c.contains(p.as_str())));
        if !hit {
            return false;
        }
    }

    if let Some(threshold) = filter.cpu_threshold {
        if !record.cpu.is_some_and(|c| c >= threshold) {
            return false;
        }
    }

    if let Some(threshold) = filter.mem_threshold {
        if !record.mem.is_some_and(|m| m >= threshold) {
            return false;
        }
    }

    true
}

fn auth_log_matches(record: &AuthLogRecord, filter: &AuthLogFilter) -> bool {
    if let Some(search) = filter.search.as_deref() {
        if !search.is_empty()
            && !record.username.contains(search)
            && !record.log_entry.contains(search)
        {
            return false;
        }
    }

    if !filter.hosts.is_empty() {
        let hit = filter.hosts.iter().any(|h| record.log_entry.contains(h.as_str()));
        if !hit {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CommandPattern, Rule, RuleGroup};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn log(id: i64, minute: u32) -> LogRecord {
        LogRecord {
            id,
            name: format!("event {id}"),
            host: Some("pi1".into()),
            user: Some("alice".into()),
            pid: None,
            action: None,
            cpu: None,
            mem: None,
            command: None,
            timestamp: chrono::Utc
                .with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
                .unwrap(),
        }
    }

    fn engine_with_logs(logs: Vec<LogRecord>) -> QueryEngine<MemoryStore> {
        QueryEngine::new(MemoryStore::new().with_logs(logs))
    }

    #[test]
    fn pagination_arithmetic() {
        let logs: Vec<LogRecord> = (0..25).map(|i| log(i, (i % 60) as u32)).collect();
        let engine = engine_with_logs(logs);

        let page1 = engine
            .logs(&LogFilter::default(), PageRequest::new(1, 10))
            .unwrap();
        assert_eq!(page1.total_count, 25);
        assert_eq!(page1.page_count, 3);
        assert_eq!(page1.records.len(), 10);

        let page3 = engine
            .logs(&LogFilter::default(), PageRequest::new(3, 10))
            .unwrap();
        assert_eq!(page3.records.len(), 5);
    }

    #[test]
    fn results_are_newest_first() {
        let engine = engine_with_logs(vec![log(1, 5), log(2, 30), log(3, 10)]);
        let page = engine
            .logs(&LogFilter::default(), PageRequest::default())
            .unwrap();
        let ids: Vec<i64> = page.records.iter().map(|p| p.record.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn page_size_is_clamped() {
        let req = PageRequest::new(1, 100_000);
        assert_eq!(req.page_size(), MAX_PAGE_SIZE);
        let req = PageRequest::new(0, 0);
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), 1);
    }

    #[test]
    fn categories_combine_with_and() {
        let mut a = log(1, 1);
        a.command = Some("sudo rm -rf /tmp".into());
        a.cpu = Some(80.0);
        let mut b = log(2, 2);
        b.command = Some("sudo rm -rf /var".into());
        b.cpu = Some(10.0);

        let engine = engine_with_logs(vec![a, b]);
        let filter = LogFilter {
            search: Some("sudo".into()),
            cpu_threshold: Some(50.0),
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        // Both match the search; only one clears the CPU threshold.
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].record.id, 1);
    }

    #[test]
    fn values_within_a_category_combine_with_or() {
        let mut a = log(1, 1);
        a.host = Some("pi1".into());
        let mut b = log(2, 2);
        b.host = Some("pi2".into());
        let mut c = log(3, 3);
        c.host = Some("pi3".into());

        let engine = engine_with_logs(vec![a, b, c]);
        let filter = LogFilter {
            hosts: vec!["pi1".into(), "pi3".into()],
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn action_filter_accepts_action_field_or_name_containment() {
        let mut a = log(1, 1);
        a.action = Some("start".into());
        let mut b = log(2, 2);
        b.name = "process start notice".into();
        let c = log(3, 3);

        let engine = engine_with_logs(vec![a, b, c]);
        let filter = LogFilter {
            actions: vec!["start".into()],
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn rule_filter_resolves_patterns_and_ands_with_search() {
        let mut a = log(1, 1);
        a.command = Some("sudo rm -rf /tmp".into());
        let mut b = log(2, 2);
        b.command = Some("sudo apt update".into());
        let mut c = log(3, 3);
        c.command = Some("rm -rf /var".into());

        let store = MemoryStore::new()
            .with_logs(vec![a, b, c])
            .with_catalog(vec![RuleGroup {
                id: 1,
                name: "Destructive".into(),
                template_id: None,
                rules: vec![Rule {
                    id: 10,
                    name: "File removal".into(),
                    description: None,
                    template_id: None,
                    commands: vec![CommandPattern {
                        id: 100,
                        pattern: "rm -rf".into(),
                        template_id: None,
                    }],
                }],
            }]);
        let engine = QueryEngine::new(store);

        // Rule filter alone: both rm -rf records.
        let filter = LogFilter {
            rule_groups: vec![1],
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.matched_commands, vec!["rm -rf"]);

        // Search AND rule filter: only the sudo'd rm -rf survives.
        let filter = LogFilter {
            search: Some("sudo".into()),
            rule_groups: vec![1],
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].record.id, 1);
    }

    #[test]
    fn unknown_rule_ids_match_nothing() {
        let mut a = log(1, 1);
        a.command = Some("rm -rf /tmp".into());
        let engine = engine_with_logs(vec![a]);
        let filter = LogFilter {
            rule_groups: vec![99],
            ..Default::default()
        };
        let page = engine.logs(&filter, PageRequest::default()).unwrap();
        // Unknown ids resolve to zero patterns. Absence of rules is a valid
        // steady state: the category imposes no constraint rather than
        // failing or filtering everything out.
        assert_eq!(page.total_count, 1);
        assert!(page.matched_commands.is_empty());
    }

    #[test]
    fn auth_host_filter_substring_matches_raw_entry() {
        let t = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mk = |id: i64, entry: &str| AuthLogRecord {
            id,
            timestamp: t,
            username: "collector".into(),
            log_entry: entry.into(),
        };
        let store = MemoryStore::new().with_auth_logs(vec![
            mk(1, "2024-05-01T10:00:00.000001+00:00 raspi5 sudo: ..."),
            mk(2, "2024-05-01T10:00:00.000001+00:00 nas1 sshd: ..."),
        ]);
        let engine = QueryEngine::new(store);
        let filter = AuthLogFilter {
            hosts: vec!["raspi5".into()],
            ..Default::default()
        };
        let page = engine.auth_logs(&filter, PageRequest::default()).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].id, 1);
    }
}
