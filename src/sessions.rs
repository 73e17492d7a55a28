//! Login/logout session pairing over a batch of log records.
//!
//! Pairing is bounded to the batch it is given -- it never reaches back into
//! unfetched history. Callers paginate; the O(n^2) scans below are acceptable
//! because page size is capped at the query facade.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::model::LogRecord;

/// A log record annotated with its correlated counterpart. Annotations are
/// additive: a record can carry both a login and a logout pairing.
#[derive(Debug, Clone, Serialize)]
pub struct PairedEvent {
    #[serde(flatten)]
    pub record: LogRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_with_login: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_with_logout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_time: Option<DateTime<Utc>>,
}

impl From<LogRecord> for PairedEvent {
    fn from(record: LogRecord) -> Self {
        Self {
            record,
            paired_with_login: None,
            login_time: None,
            paired_with_logout: None,
            logout_time: None,
        }
    }
}

fn classified_as(record: &LogRecord, marker: &str) -> bool {
    record.name.to_lowercase().contains(marker)
        || record
            .action
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(marker))
}

/// A record is a login when its name contains "login" (case-insensitive) or
/// its action equals "login".
pub fn is_login(record: &LogRecord) -> bool {
    classified_as(record, "login")
}

/// Symmetric classification for logouts.
pub fn is_logout(record: &LogRecord) -> bool {
    classified_as(record, "logout")
}

/// Correlation key: records pair only within the same host/user. Missing
/// fields collapse onto the literal "unknown" so host-less collectors still
/// pair among themselves.
fn session_key(record: &LogRecord) -> String {
    format!(
        "{}|{}",
        record.host.as_deref().unwrap_or("unknown"),
        record.user.as_deref().unwrap_or("unknown")
    )
}

/// Pair login/logout events within one batch.
///
/// Each logout is annotated with the most recent login strictly before it
/// for the same key; each login with the first logout (in input order)
/// strictly after it for the same host/user. Equal timestamps never pair.
/// Records that are neither pass through unchanged.
pub fn pair_sessions(records: &[LogRecord]) -> Vec<PairedEvent> {
    // Index logins by key, preserving input order.
    let mut logins: HashMap<String, Vec<&LogRecord>> = HashMap::new();
    for record in records {
        if is_login(record) {
            logins.entry(session_key(record)).or_default().push(record);
        }
    }

    records
        .iter()
        .map(|record| {
            let mut event = PairedEvent::from(record.clone());

            if is_logout(record) {
                if let Some(candidates) = logins.get(&session_key(record)) {
                    // Latest prior login, not first-available. A single login
                    // may pair with several logouts this way.
                    let best = candidates
                        .iter()
                        .filter(|login| login.timestamp < record.timestamp)
                        .max_by_key(|login| login.timestamp);
                    if let Some(login) = best {
                        event.paired_with_login = Some(login.id);
                        event.login_time = Some(login.timestamp);
                    }
                }
            }

            if is_login(record) {
                // Whole-batch scan, first strictly-later logout in input
                // order for the same host and user.
                let logout = records.iter().find(|other| {
                    other.host == record.host
                        && other.user == record.user
                        && is_logout(other)
                        && other.timestamp > record.timestamp
                });
                if let Some(logout) = logout {
                    event.paired_with_logout = Some(logout.id);
                    event.logout_time = Some(logout.timestamp);
                }
            }

            event
        })
        .collect()
}
