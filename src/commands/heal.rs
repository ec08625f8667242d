//! `phoenix heal`: skip routing and send a task straight to the healing loop.

use anyhow::Result;

use super::format::format_result;
use super::{healing_loop, load_project};

/// Runs the heal command.
pub async fn run(task: &str, show_code: bool) -> Result<()> {
    let task = task.trim();
    if task.is_empty() {
        anyhow::bail!("Task must not be empty");
    }

    let (_, config) = load_project()?;
    let healing = healing_loop(&config).await?;

    let result = healing.resolve(task).await?;
    print!("{}", format_result(&result, None, show_code));

    if result.succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{}", result.label())
    }
}
