//! Field extraction for raw auth-subsystem lines.
//!
//! Collectors ship `/var/log/auth.log` lines verbatim; host, service, and
//! command are positional, the rest are `KEY=value` pairs. A typical sudo
//! line:
//!
//! ```text
//! 2024-05-01T10:15:42.123456+00:00 raspi5 sudo:  admin : TTY=pts/0 ;
//!     PWD=/home/admin ; USER=root ; COMMAND=/usr/bin/apt update
//! ```

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Session lifecycle marker found in PAM lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Opened,
    Closed,
}

/// Structured view of one auth-log line. Every field is best-effort; a line
/// that matches nothing decodes to all-`None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedAuthEntry {
    pub timestamp: Option<String>,
    pub host: Option<String>,
    pub service: Option<String>,
    pub user: Option<String>,
    pub command: Option<String>,
    pub tty: Option<String>,
    pub pwd: Option<String>,
    pub session: Option<SessionStatus>,
    pub session_user: Option<String>,
}

static TS_RE: OnceLock<Option<Regex>> = OnceLock::new();
static USER_RE: OnceLock<Option<Regex>> = OnceLock::new();
static COMMAND_RE: OnceLock<Option<Regex>> = OnceLock::new();
static TTY_RE: OnceLock<Option<Regex>> = OnceLock::new();
static PWD_RE: OnceLock<Option<Regex>> = OnceLock::new();
static SESSION_USER_RE: OnceLock<Option<Regex>> = OnceLock::new();

// A pattern that fails to compile is treated as matching nothing.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn capture_field(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
    haystack: &str,
) -> Option<String> {
    compiled(cell, pattern)?
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode the positional and `KEY=value` fields of a raw auth-log line.
pub fn parse_log_entry(log_entry: &str) -> ParsedAuthEntry {
    let mut parsed = ParsedAuthEntry::default();

    parsed.timestamp = capture_field(
        &TS_RE,
        r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+\+\d{2}:\d{2})",
        log_entry,
    );

    // Host and service ride in fixed positions after the timestamp.
    let parts: Vec<&str> = log_entry.split(' ').collect();
    if parts.len() >= 2 {
        parsed.host = Some(parts[1].to_string());
    }
    if parts.len() >= 3 {
        parsed.service = Some(parts[2].trim_end_matches(':').to_string());
    }

    parsed.user = capture_field(&USER_RE, r"USER=(\w+)", log_entry);
    parsed.command = capture_field(&COMMAND_RE, r"COMMAND=(.+)$", log_entry);
    parsed.tty = capture_field(&TTY_RE, r"TTY=(\S+)", log_entry);
    parsed.pwd = capture_field(&PWD_RE, r"PWD=(\S+)", log_entry);

    if log_entry.contains("session opened") {
        parsed.session = Some(SessionStatus::Opened);
    } else if log_entry.contains("session closed") {
        parsed.session = Some(SessionStatus::Closed);
    }
    if parsed.session.is_some() {
        parsed.session_user = capture_field(&SESSION_USER_RE, r"for user (\w+)", log_entry);
    }

    parsed
}

/// The text the command matcher evaluates for an auth-log line: the decoded
/// `COMMAND=` payload when present, otherwise the whole raw entry.
pub fn searchable_text(log_entry: &str) -> &str {
    let capture = compiled(&COMMAND_RE, r"COMMAND=(.+)$")
        .and_then(|re| re.captures(log_entry))
        .and_then(|c| c.get(1));
    match capture {
        Some(m) => &log_entry[m.start()..m.end()],
        None => log_entry,
    }
}
