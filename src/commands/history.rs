//! `phoenix history`: list recorded executions.

use anyhow::Result;

use super::format::format_records;
use super::load_project;
use crate::history::JsonlHistory;

/// Runs the history command.
pub fn run(limit: usize) -> Result<()> {
    let (project_dir, config) = load_project()?;
    let history = JsonlHistory::new(config.history_path(&project_dir));

    let records = history.load_recent(limit)?;
    print!("{}", format_records(&records));
    Ok(())
}
