//! Routing of command matches to the notification collaborator.
//!
//! The engine never sends anything itself. A match carrying a bound
//! template is handed to the caller's [`NotificationSink`]; matches without
//! a binding are only logged. Delivery failures are logged and skipped --
//! retry policy belongs to the collaborator.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::matcher::CommandMatch;

/// A dispatch request for one matched rule with a bound template.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub template_id: i64,
    pub matched: CommandMatch,
}

/// The notification collaborator contract.
pub trait NotificationSink {
    fn deliver(&mut self, notification: &Notification) -> Result<()>;
}

/// Log every match and hand those with a template binding to the sink.
/// Returns how many notifications were delivered.
pub fn route_matches(matches: &[CommandMatch], sink: &mut dyn NotificationSink) -> usize {
    let mut delivered = 0;
    for m in matches {
        warn!(
            rule = %m.rule_name,
            group = %m.group_name,
            pattern = %m.pattern,
            log_id = m.log_id,
            kind = %m.log_kind,
            "command match detected"
        );
        let Some(template_id) = m.template_id else {
            continue;
        };
        let notification = Notification {
            template_id,
            matched: m.clone(),
        };
        match sink.deliver(&notification) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(template_id, error = %e, "notification delivery failed"),
        }
    }
    delivered
}

/// Sink that prints notifications as JSON lines; used by the CLI.
#[derive(Debug, Default)]
pub struct JsonStdoutSink;

impl NotificationSink for JsonStdoutSink {
    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        println!("{}", serde_json::to_string(notification)?);
        Ok(())
    }
}
