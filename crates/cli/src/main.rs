//! Compare QA CLI - Main Entry Point
//!
//! Runs the transcript replay and RAG validation scenarios against the
//! Compare web app, plus offline transcript and similarity tooling.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{judge, model_eval, scenario, transcript};

/// Compare QA - transcript-driven browser QA for the Compare app
#[derive(Parser)]
#[command(name = "compare-qa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project configuration file
    #[arg(
        short,
        long,
        default_value = "config/project.yaml",
        env = "COMPARE_QA_CONFIG",
        global = true
    )]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the recorded transcript against the app
    Scenario1(scenario::Scenario1Args),

    /// Ask the app a question and judge the answer against the RAG oracle
    Scenario2(scenario::Scenario2Args),

    /// Transcript utilities
    #[command(subcommand)]
    Transcript(transcript::TranscriptCommands),

    /// Compare two texts by embedding similarity
    Judge(judge::JudgeArgs),

    /// Precision, recall and F1 of a predictions file
    ModelEval(model_eval::ModelEvalArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scenario1(args) => {
            let config = commands::load_config(&cli.config)?;
            scenario::scenario1(args, config, cli.format).await?;
        }
        Commands::Scenario2(args) => {
            let config = commands::load_config(&cli.config)?;
            if !scenario::scenario2(args, config, cli.format).await? {
                output::print_error("RAG validation failed");
                std::process::exit(1);
            }
        }
        Commands::Transcript(cmd) => {
            let config = commands::load_config_or_default(&cli.config)?;
            transcript::execute(cmd, config, cli.format).await?;
        }
        Commands::Judge(args) => {
            let config = commands::load_config_or_default(&cli.config)?;
            judge::execute(args, config, cli.format).await?;
        }
        Commands::ModelEval(args) => {
            model_eval::execute(args, cli.format)?;
        }
        Commands::Version => {
            println!("Compare QA CLI v{}", compare_qa_common::VERSION);
        }
    }

    Ok(())
}
