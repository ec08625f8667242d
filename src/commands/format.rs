//! Pure formatting for command output.
//!
//! Everything here returns a string; printing happens in the commands.

use colored::Colorize;
use std::fmt::Write;
use std::time::Duration;

use crate::healing::{ExecutionAttempt, OrchestrationResult, Outcome};
use crate::history::ExecutionRecord;
use crate::intent::Intent;

/// Width of the prompt column in `phoenix history`.
const PROMPT_WIDTH: usize = 48;

pub(crate) fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn outcome_marker(outcome: Outcome) -> String {
    match outcome {
        Outcome::Success => "✓".green().to_string(),
        Outcome::Failure => "✗".red().to_string(),
        Outcome::Timeout => "⏱".yellow().to_string(),
    }
}

/// One line per attempt: marker, number, outcome and duration.
pub(crate) fn format_attempts(attempts: &[ExecutionAttempt]) -> String {
    let mut out = String::new();
    for attempt in attempts {
        writeln!(
            &mut out,
            "  {} attempt {} {:?} ({})",
            outcome_marker(attempt.outcome),
            attempt.number,
            attempt.outcome,
            format_duration(attempt.duration).dimmed()
        )
        .unwrap();
    }
    out
}

/// Full result block for `ask` and `heal`.
pub(crate) fn format_result(
    result: &OrchestrationResult,
    intent: Option<Intent>,
    show_code: bool,
) -> String {
    let mut out = String::new();

    if let Some(intent) = intent {
        writeln!(&mut out, "{} {}", "Intent:".bold(), intent).unwrap();
    }
    let label = result.label();
    let label = if result.succeeded() {
        label.green()
    } else {
        label.red()
    };
    writeln!(&mut out, "{} {}", "Agent:".bold(), label).unwrap();

    if !result.attempts.is_empty() {
        writeln!(&mut out, "{}", "Attempts:".bold()).unwrap();
        out.push_str(&format_attempts(&result.attempts));
    }

    if show_code {
        if let Some(code) = result.final_code() {
            writeln!(&mut out, "\n{}", "Code:".bold()).unwrap();
            writeln!(&mut out, "{}", code.dimmed()).unwrap();
        }
    }

    writeln!(&mut out, "\n{}", result.output).unwrap();
    out
}

fn truncate(text: &str, width: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= width {
        single_line
    } else {
        let cut: String = single_line.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Table of history records, oldest first.
pub(crate) fn format_records(records: &[ExecutionRecord]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        writeln!(&mut out, "{} No executions recorded yet.", "ℹ".blue()).unwrap();
        return out;
    }

    for record in records {
        let agent = if record.final_agent == "FAILED_AGENT" {
            record.final_agent.red()
        } else {
            record.final_agent.green()
        };
        writeln!(
            &mut out,
            "{}  {:<15}  {:<24}  {}",
            record
                .created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            record.detected_intent,
            agent,
            truncate(&record.user_prompt, PROMPT_WIDTH)
        )
        .unwrap();
    }
    out
}
