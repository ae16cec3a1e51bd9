//! Simple line-based CLI output.
//!
//! Formatting is kept separate from printing so the exact lines can be
//! tested.

use crate::sse::{LogLevel, LogLine, TerminalResult};
use crate::websocket::Event;

/// Line width for separators.
const LINE_WIDTH: usize = 60;

/// Format one session log line.
///
/// ```text
///   ✓ [unit] Starting phase 1/3: unit
///   ✗ [lint] Phase lint failed in 2.5s: 3 warnings
/// ```
pub fn format_log_line(line: &LogLine) -> String {
    let icon = match line.level {
        LogLevel::Info => "✓",
        LogLevel::Error => "✗",
    };
    match &line.phase_tag {
        Some(phase) => format!("  {} [{}] {}", icon, phase, line.message),
        None => format!("  {} {}", icon, line.message),
    }
}

/// Summary block printed when a scenario completes.
pub fn format_result(result: &TerminalResult) -> Vec<String> {
    let summary = &result.phase_summary;
    let mut lines = vec![
        "─".repeat(LINE_WIDTH),
        format!(
            "{} {}",
            result.scenario,
            if result.success { "PASSED" } else { "FAILED" }
        ),
        format!(
            "Phases: {} total, {} passed, {} failed ({:.1}s)",
            summary.total, summary.passed, summary.failed, summary.duration_seconds
        ),
    ];
    if let Some(preset) = &result.preset {
        lines.push(format!("Preset: {}", preset));
    }
    if summary.observation_count > 0 {
        lines.push(format!("Observations: {}", summary.observation_count));
    }
    lines
}

/// One canonical event as a single line: time, kind, payload JSON.
pub fn format_event(event: &Event) -> String {
    let time = chrono::DateTime::from_timestamp_millis(event.occurred_at_ms)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event.occurred_at_ms.to_string());
    match event
        .payload
        .as_ref()
        .and_then(|payload| serde_json::to_string(payload).ok())
    {
        Some(payload) => format!("{} {} {}", time, event.kind, payload),
        None => format!("{} {}", time, event.kind),
    }
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
