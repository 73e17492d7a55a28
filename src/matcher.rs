//! Substring matching of log text against the rule catalog.
//!
//! Matching is intentionally simple: a pattern matches when the record's
//! searchable text contains it, case-sensitively, with no trimming and no
//! wildcard semantics. A record may satisfy several rules at once; every
//! match is returned, not just the first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::authlog;
use crate::catalog::CatalogSnapshot;
use crate::model::{AuthLogRecord, LogKind, LogRecord};

/// One rule/pattern a log record satisfied. Ephemeral -- recomputed per
/// query, never persisted by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct CommandMatch {
    pub id: Uuid,
    pub log_id: i64,
    pub log_kind: LogKind,
    pub command_id: i64,
    pub rule_id: i64,
    pub rule_name: String,
    pub group_id: i64,
    pub group_name: String,
    pub pattern: String,
    /// The text the pattern was found in.
    pub matched_text: String,
    /// Notification template to dispatch, resolved pattern -> rule -> group.
    /// The caller owns delivery; the engine only surfaces the binding.
    pub template_id: Option<i64>,
    pub matched_at: DateTime<Utc>,
}

/// Evaluate one piece of searchable text against the catalog. An empty
/// catalog yields an empty vec, never an error.
pub fn match_text(
    text: &str,
    log_id: i64,
    log_kind: LogKind,
    catalog: &CatalogSnapshot,
) -> Vec<CommandMatch> {
    let mut matches = Vec::new();
    for cmd in catalog.commands() {
        if text.contains(&cmd.command.pattern) {
            matches.push(CommandMatch {
                id: Uuid::new_v4(),
                log_id,
                log_kind,
                command_id: cmd.command.id,
                rule_id: cmd.rule.id,
                rule_name: cmd.rule.name.clone(),
                group_id: cmd.group.id,
                group_name: cmd.group.name.clone(),
                pattern: cmd.command.pattern.clone(),
                matched_text: text.to_string(),
                template_id: cmd.template_id(),
                matched_at: Utc::now(),
            });
        }
    }
    matches
}

/// Match a system log record. Records with no command field match nothing.
pub fn match_log(record: &LogRecord, catalog: &CatalogSnapshot) -> Vec<CommandMatch> {
    match record.searchable_text() {
        Some(text) => match_text(text, record.id, LogKind::System, catalog),
        None => Vec::new(),
    }
}

/// Match an auth log record against its decoded `COMMAND=` payload (or the
/// raw entry when no command field is present).
pub fn match_auth(record: &AuthLogRecord, catalog: &CatalogSnapshot) -> Vec<CommandMatch> {
    let text = authlog::searchable_text(&record.log_entry);
    match_text(text, record.id, LogKind::Auth, catalog)
}

/// Match a fetched page of system logs. Applied once per page, not per
/// record insertion, so matching cost is bounded by page size.
pub fn match_batch(records: &[LogRecord], catalog: &CatalogSnapshot) -> Vec<CommandMatch> {
    records
        .iter()
        .flat_map(|r| match_log(r, catalog))
        .collect()
}

/// Batch variant for auth logs.
pub fn match_auth_batch(records: &[AuthLogRecord], catalog: &CatalogSnapshot) -> Vec<CommandMatch> {
    records
        .iter()
        .flat_map(|r| match_auth(r, catalog))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CommandPattern, Rule, RuleGroup};
    use chrono::TimeZone;

    fn catalog_with(patterns: &[&str]) -> CatalogSnapshot {
        CatalogSnapshot::new(vec![RuleGroup {
            id: 1,
            name: "g".into(),
            template_id: None,
            rules: vec![Rule {
                id: 10,
                name: "r".into(),
                description: None,
                template_id: Some(42),
                commands: patterns
                    .iter()
                    .enumerate()
                    .map(|(i, p)| CommandPattern {
                        id: i as i64,
                        pattern: (*p).into(),
                        template_id: None,
                    })
                    .collect(),
            }],
        }])
    }

    fn log(id: i64, command: Option<&str>) -> LogRecord {
        LogRecord {
            id,
            name: "proc".into(),
            host: Some("pi1".into()),
            user: None,
            pid: None,
            action: None,
            cpu: None,
            mem: None,
            command: command.map(String::from),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn substring_match_is_exact_and_untrimmed() {
        let cat = catalog_with(&["rm -rf"]);
        let rec = log(1, Some("sudo rm -rf /tmp/x"));
        assert_eq!(match_log(&rec, &cat).len(), 1);

        // Trailing space in the pattern must be present in the text too.
        let cat = catalog_with(&["rm -rf "]);
        let rec = log(2, Some("rm -rf"));
        assert!(match_log(&rec, &cat).is_empty());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let cat = catalog_with(&["RM -RF"]);
        let rec = log(1, Some("sudo rm -rf /tmp/x"));
        assert!(match_log(&rec, &cat).is_empty());
    }

    #[test]
    fn all_matching_rules_are_returned() {
        let cat = catalog_with(&["rm", "rm -rf", "/tmp"]);
        let rec = log(1, Some("sudo rm -rf /tmp/x"));
        let matches = match_log(&rec, &cat);
        assert_eq!(matches.len(), 3);
        // Every match surfaces the rule-level template binding.
        assert!(matches.iter().all(|m| m.template_id == Some(42)));
    }

    #[test]
    fn empty_catalog_and_missing_command_are_silent() {
        let rec = log(1, Some("anything"));
        assert!(match_log(&rec, &CatalogSnapshot::default()).is_empty());

        let cat = catalog_with(&["rm"]);
        assert!(match_log(&log(2, None), &cat).is_empty());
    }

    #[test]
    fn auth_match_uses_decoded_command() {
        let cat = catalog_with(&["apt "]);
        let rec = AuthLogRecord {
            id: 5,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            username: "raspi5".into(),
            log_entry:
                "2024-05-01T10:15:42.123456+00:00 raspi5 sudo: admin : USER=root ; COMMAND=/usr/bin/apt update"
                    .into(),
        };
        let matches = match_auth(&rec, &cat);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_text, "/usr/bin/apt update");
        assert_eq!(matches[0].log_kind, LogKind::Auth);
    }

    #[test]
    fn batch_is_the_concatenation_of_per_record_matches() {
        let cat = catalog_with(&["rm"]);
        let records = vec![
            log(1, Some("rm a")),
            log(2, Some("ls")),
            log(3, Some("rm b")),
        ];
        let matches = match_batch(&records, &cat);
        let ids: Vec<i64> = matches.iter().map(|m| m.log_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
