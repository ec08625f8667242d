//! `phoenix clean`: remove sandbox containers a killed process left behind.
//!
//! Normal runs always remove their container; this only matters after the
//! process itself was killed mid-run.

use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;

use super::load_project;
use crate::sandbox::{DockerBackend, SandboxSettings};

/// Format the clean results as a displayable string
fn format_results(removed: u32) -> String {
    let mut out = String::new();
    if removed == 0 {
        writeln!(&mut out, "\n{} No leftover sandboxes found.", "ℹ".blue()).unwrap();
    } else {
        let noun = if removed == 1 { "sandbox" } else { "sandboxes" };
        writeln!(
            &mut out,
            "\n{} Removed {} leftover {}.",
            "✓".green(),
            removed,
            noun
        )
        .unwrap();
    }
    out
}

/// Entry point: removes labelled containers older than any live run
pub async fn run() -> Result<()> {
    let (_, config) = load_project()?;
    let settings = SandboxSettings::from_config(&config.sandbox)?;

    let backend = DockerBackend::connect().await?;
    let removed = backend.remove_orphaned(settings.max_lifetime()).await?;
    print!("{}", format_results(removed));
    Ok(())
}
