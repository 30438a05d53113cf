//! Failure diagnostics for a resource that did not converge.

use crate::resource::{Event, ObjectKey, ResourceClient, ResourceKind};
use std::fmt::Write as _;

/// Number of most recent events included in a report.
pub const MAX_EVENTS: usize = 5;

const RULE_WIDTH: usize = 60;

/// Render the resource as it is now plus its most recent events.
///
/// Each section degrades to a one-line note if its lookup fails, so this never errors. The
/// report is also logged at `error` level.
pub async fn collect_diagnostics<C>(client: &C, kind: &ResourceKind, key: &ObjectKey) -> String
where
    C: ResourceClient + ?Sized,
{
    let rule = "=".repeat(RULE_WIDTH);
    let mut report = String::new();
    let _ = writeln!(report, "{rule}");
    let _ = writeln!(report, "DIAGNOSTIC INFORMATION FOR {} in {}", key.name, key.namespace);
    let _ = writeln!(report, "{rule}");

    let _ = writeln!(report, "\n--- {} ---", kind.kind);
    match client.get(kind, key).await {
        Ok(resource) => match serde_json::to_string_pretty(&resource) {
            Ok(pretty) => {
                let _ = writeln!(report, "{pretty}");
            }
            Err(e) => {
                let _ = writeln!(report, "Failed to render {}: {e}", kind.kind);
            }
        },
        Err(e) => {
            let _ = writeln!(report, "Failed to get {}: {e}", kind.kind);
        }
    }

    let _ = writeln!(report, "\n--- Events ---");
    match client.events(key).await {
        Ok(events) if events.is_empty() => {
            let _ = writeln!(report, "  No events found");
        }
        Ok(events) => {
            for event in recent(events, MAX_EVENTS) {
                let _ = writeln!(report, "  {}: {} - {}", event.type_, event.reason, event.message);
                let _ = writeln!(
                    report,
                    "    Time: {}",
                    event.timestamp.as_deref().unwrap_or("<unknown>")
                );
            }
        }
        Err(e) => {
            let _ = writeln!(report, "Failed to list events: {e}");
        }
    }
    let _ = writeln!(report, "\n{rule}");

    tracing::error!(%kind, %key, "{report}");
    report
}

/// Newest `limit` events, newest first. Events without a timestamp sort last.
pub fn recent(mut events: Vec<Event>, limit: usize) -> Vec<Event> {
    // RFC 3339 timestamps in a single zone order lexicographically.
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}
