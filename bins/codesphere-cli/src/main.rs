mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codesphere_common::types::Language;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codesphere-cli")]
#[command(about = "CodeSphere CLI - Run and judge programs in the local Docker sandbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a program once
    Run {
        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: Language,

        /// Source file
        #[arg(short, long)]
        file: PathBuf,

        /// File fed to the program as stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Time limit in milliseconds
        #[arg(long)]
        time_limit: Option<u64>,

        /// Memory limit in MB
        #[arg(long)]
        memory_limit: Option<u64>,
    },

    /// Judge a program against a JSON file of test cases
    Judge {
        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: Language,

        /// Source file
        #[arg(short, long)]
        file: PathBuf,

        /// JSON array of {"input", "output"} objects
        #[arg(short, long)]
        cases: PathBuf,

        /// Time limit in milliseconds
        #[arg(long)]
        time_limit: Option<u64>,

        /// Memory limit in MB
        #[arg(long)]
        memory_limit: Option<u64>,
    },

    /// List supported languages with their build recipes and images
    Languages,

    /// Check the Docker daemon and pull missing sandbox images
    Check,
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
            language,
            file,
            input,
            time_limit,
            memory_limit,
        } => {
            commands::run(language, &file, input.as_deref(), time_limit, memory_limit).await?;
        }
        Commands::Judge {
            language,
            file,
            cases,
            time_limit,
            memory_limit,
        } => {
            commands::judge(language, &file, &cases, time_limit, memory_limit).await?;
        }
        Commands::Languages => {
            commands::list_languages()?;
        }
        Commands::Check => {
            commands::check().await?;
        }
    }

    Ok(())
}
