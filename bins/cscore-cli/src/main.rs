mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cscore-cli")]
#[command(about = "cscore CLI - Run, grade and queue code submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file with the configured strategy
    Run {
        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// Language name (e.g., python, java, cpp)
        #[arg(short, long)]
        language: String,

        /// JSON file with an array of test cases; grades the submission when given
        #[arg(short, long)]
        tests: Option<PathBuf>,

        /// Stdin for a single ungraded run
        #[arg(short, long, default_value = "")]
        input: String,
    },

    /// Show the resolved execution strategy and backend availability
    Info,

    /// Queue a submission for the grading worker
    Submit {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        language: String,

        #[arg(short, long)]
        tests: PathBuf,

        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },

    /// Fetch the graded record of a queued submission
    Result {
        /// Job id printed by `submit`
        job_id: String,

        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            language,
            tests,
            input,
        } => {
            commands::run(&file, &language, tests.as_deref(), &input).await?;
        }
        Commands::Info => {
            commands::info().await?;
        }
        Commands::Submit {
            file,
            language,
            tests,
            redis_url,
        } => {
            commands::submit(&file, &language, &tests, &redis_url).await?;
        }
        Commands::Result { job_id, redis_url } => {
            commands::fetch_result(&job_id, &redis_url).await?;
        }
    }

    Ok(())
}
