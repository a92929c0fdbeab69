//! Report rendering for the CLI: `modgate:`-prefixed text lines or a JSON
//! envelope.

use crate::core::suite::{CheckStatus, SuiteReport};
use colored::Colorize;
use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// Collapse whitespace and bound length for one-line terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}

/// First `max_items` messages joined with ` | `, plus a count of the rest.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    match messages.len().checked_sub(max_items) {
        Some(rest) if rest > 0 => format!("{shown} (+{rest} more)"),
        _ => shown,
    }
}

/// Unix-epoch seconds with a `Z` suffix.
pub fn now_epoch_z() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{secs}Z")
}

pub fn report_envelope(cmd: &str, report: &SuiteReport) -> Result<JsonValue, serde_json::Error> {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "run_id": Ulid::new().to_string(),
        "cmd": cmd,
        "status": if report.all_passed() { "ok" } else { "fail" },
    });
    if let (Some(base_obj), JsonValue::Object(extra)) =
        (base.as_object_mut(), serde_json::to_value(report)?)
    {
        base_obj.extend(extra);
    }
    Ok(base)
}

/// Text lines for `report`, without colors applied to anything but the tags.
pub fn render_text(cmd: &str, report: &SuiteReport, verbose: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "modgate: {cmd} module={}",
        report.module_root.display()
    )];
    if let Some(state) = &report.bootstrap {
        lines.push(format!("modgate: bootstrap {state}"));
    }
    for result in &report.results {
        let tag = match result.status {
            CheckStatus::Pass => "PASS".green().bold(),
            CheckStatus::Fail => "FAIL".red().bold(),
            CheckStatus::Skip => "SKIP".yellow(),
        };
        lines.push(format!(
            "  {tag} {} - {}",
            result.name,
            compact_line(&result.message, 160)
        ));
        let show_diag = verbose || result.status == CheckStatus::Fail;
        if let (true, Some(diag)) = (show_diag, &result.diagnostic) {
            for line in diag.lines() {
                lines.push(format!("       | {line}"));
            }
        }
    }
    let s = report.summary;
    lines.push(format!(
        "modgate: summary pass={} fail={} skip={}",
        s.pass, s.fail, s.skip
    ));
    let failures = report.failures();
    if !failures.is_empty() {
        lines.push(format!(
            "modgate: failures {}: {}",
            failures.len(),
            preview_messages(&failures, 2, 110)
        ));
    }
    lines
}
