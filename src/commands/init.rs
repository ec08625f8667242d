//! `phoenix init`: write the config file and sandbox Dockerfile.
//!
//! File access is passed in as closures so the overwrite rules can be
//! tested without touching the disk.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use tracing::info;

use crate::config::CONFIG_FILE;
use crate::templates;

/// Where `init` writes the sandbox Dockerfile.
pub(crate) const DOCKERFILE_PATH: &str = "sandbox/Dockerfile";

/// Project files: path, content, description.
const INIT_FILES: [(&str, &str, &str); 2] = [
    (CONFIG_FILE, templates::PHOENIX_TOML, "Project configuration"),
    (
        DOCKERFILE_PATH,
        templates::SANDBOX_DOCKERFILE,
        "Sandbox image definition",
    ),
];

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Created,
    Overwritten,
    Skipped,
}

impl WriteResult {
    fn describe(self, description: &str) -> String {
        match self {
            Self::Created => format!("{} {}", "+".green(), description),
            Self::Overwritten => format!("{} overwritten", "↻".blue()),
            Self::Skipped => format!(
                "{} already exists, use --force to overwrite",
                "⊘".yellow()
            ),
        }
    }
}

/// Runs the init command in the current directory.
pub(crate) fn run(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    info!("Initializing phoenix in {}", cwd.display());

    let results = write_files(
        force,
        |path| cwd.join(path).exists(),
        |path, content| {
            let target = cwd.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, content).with_context(|| format!("Failed to write {path}"))
        },
    )?;

    print!("{}", summary(&results));
    Ok(())
}

/// Writes every init file unless it exists and `force` is off.
fn write_files<E, W>(force: bool, exists: E, mut write: W) -> Result<Vec<(&'static str, WriteResult)>>
where
    E: Fn(&str) -> bool,
    W: FnMut(&str, &str) -> Result<()>,
{
    INIT_FILES
        .iter()
        .map(|&(path, content, _)| {
            let existed = exists(path);
            if existed && !force {
                return Ok((path, WriteResult::Skipped));
            }
            write(path, content)?;
            Ok((
                path,
                if existed {
                    WriteResult::Overwritten
                } else {
                    WriteResult::Created
                },
            ))
        })
        .collect()
}

fn summary(results: &[(&str, WriteResult)]) -> String {
    let mut out = String::new();
    writeln!(&mut out, "\n{} phoenix initialized successfully!\n", "✓".green().bold()).unwrap();

    for &(path, result) in results {
        let description = INIT_FILES
            .iter()
            .find(|(p, _, _)| *p == path)
            .map_or("", |(_, _, d)| *d);
        writeln!(&mut out, "  {:<22} {}", path.cyan(), result.describe(description)).unwrap();
    }

    writeln!(
        &mut out,
        "\nThen run {} and {}.",
        "phoenix image build".green(),
        "phoenix ask \"what is 17 * 23?\"".green()
    )
    .unwrap();
    out
}
