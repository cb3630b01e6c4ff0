//! Agrow CLI — the main entry point.
//!
//! Commands:
//! - `onboard`    — Write the default config file
//! - `serve`      — Start the HTTP front door
//! - `ask`        — Answer one question against a context bundle file
//! - `transcribe` — Turn an audio clip into text
//! - `doctor`     — Check configuration and credentials

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "agrow",
    about = "Agrow — grounded crop diagnosis from field context",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question
    Ask {
        /// The farmer's question
        #[arg(short, long)]
        message: String,

        /// JSON file holding the field's context bundle
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Print the reasoning trace as JSON after the answer
        #[arg(long)]
        trace: bool,
    },

    /// Transcribe an audio file
    Transcribe {
        /// Path to the audio clip
        file: PathBuf,

        /// ISO-639-1 language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Diagnose configuration problems
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            message,
            context,
            trace,
        } => commands::ask::run(message, context, trace).await?,
        Commands::Transcribe { file, language } => {
            commands::transcribe::run(file, language).await?
        }
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
