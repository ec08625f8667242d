use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod agent;
mod classifier;
mod commands;
mod config;
mod healing;
mod history;
mod intent;
mod llm;
mod orchestrator;
mod sandbox;
mod templates;

#[derive(Parser)]
#[command(name = "phoenix")]
#[command(
    author,
    version,
    about = "Self-healing sandboxed code execution - generate, run, repair, repeat"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PHOENIX_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize phoenix files in the current project
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Answer a prompt, running generated code in the sandbox when needed
    Ask {
        /// The request, e.g. "what is the standard deviation of 1..100?"
        prompt: String,

        /// Print the code that produced the answer
        #[arg(long)]
        show_code: bool,
    },

    /// Generate, run and repair code for a task without intent routing
    Heal {
        /// Task for the code agent
        task: String,

        /// Print the code that produced the answer
        #[arg(long)]
        show_code: bool,
    },

    /// Run a Python script once in the sandbox
    Exec {
        /// Script to run ("-" reads stdin)
        file: PathBuf,
    },

    /// List recorded executions
    History {
        /// Number of most recent records to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Remove sandbox containers left behind by a killed run
    Clean,

    /// Manage the sandbox image
    Image {
        #[command(subcommand)]
        action: commands::image::ImageAction,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "phoenix=debug" } else { "phoenix=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Ask { prompt, show_code } => {
            commands::ask::run(&prompt, show_code).await?;
        }
        Commands::Heal { task, show_code } => {
            commands::heal::run(&task, show_code).await?;
        }
        Commands::Exec { file } => {
            commands::exec::run(&file).await?;
        }
        Commands::History { limit } => {
            commands::history::run(limit)?;
        }
        Commands::Clean => {
            commands::clean::run().await?;
        }
        Commands::Image { action } => {
            commands::image::run(action).await?;
        }
    }

    Ok(())
}
