//! `phoenix exec`: run a script once in the sandbox, no model involved.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use std::time::Instant;

use super::format::format_duration;
use super::{load_project, sandbox_runtime};
use crate::classifier::{OutcomeClassifier, Verdict};
use crate::sandbox::{RunOutput, RunStatus};

/// Runs the exec command.
///
/// Reads the script from `file`, or from stdin when `file` is `-`.
pub async fn run(file: &Path) -> Result<()> {
    let code = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read script from stdin")?
    } else {
        fs::read_to_string(file)
            .with_context(|| format!("Failed to read script: {}", file.display()))?
    };

    let (_, config) = load_project()?;
    let runtime = sandbox_runtime(&config).await?;
    let classifier = OutcomeClassifier::new(&config.healing.failure_signals);

    let started = Instant::now();
    let run = runtime.run(&code).await;
    let elapsed = format_duration(started.elapsed());

    println!("{}", run.output);

    match verdict(&classifier, &run) {
        Verdict::Success => {
            eprintln!("{} finished in {}", "✓".green(), elapsed);
            Ok(())
        }
        Verdict::Failure if run.status == RunStatus::TimedOut => {
            anyhow::bail!("Timed out after {}s", runtime.timeout().as_secs())
        }
        Verdict::Failure => anyhow::bail!("Script failed after {elapsed}"),
    }
}

/// Sandbox faults and timeouts fail without consulting the classifier.
fn verdict(classifier: &OutcomeClassifier, run: &RunOutput) -> Verdict {
    match run.status {
        RunStatus::Completed => classifier.classify(&run.output),
        RunStatus::TimedOut | RunStatus::Faulted => Verdict::Failure,
    }
}
