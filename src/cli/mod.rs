//! CLI parser and dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, Settings};

#[derive(Parser)]
#[command(name = "wax")]
#[command(about = "Batch queue engine for the Waxworks music collection platform")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Enqueue one item onto a queue
    Enqueue {
        /// Queue name (albums, stories, social)
        queue: String,
        /// Payload as inline JSON
        #[arg(short, long, conflicts_with = "file")]
        payload: Option<String>,
        /// Payload from a JSON file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Defer processing by this many minutes
        #[arg(long)]
        defer_minutes: Option<u64>,
    },

    /// Process one batch from a queue
    Process {
        /// Queue name (or "all" for every registered queue)
        queue: String,
        /// Items per batch (clamped to the configured maximum)
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Keep polling on an interval instead of exiting after one batch
        #[arg(short, long)]
        watch: bool,
        /// Polling interval in seconds for --watch
        #[arg(long, default_value = "60")]
        interval: u64,
    },

    /// Show queue status
    Status {
        /// Queue name (optional, shows all if not specified)
        queue: Option<String>,
    },

    /// Reset failed items on a queue to pending
    RetryFailed {
        /// Queue name
        queue: String,
    },

    /// Delete terminal items older than a cutoff
    Cleanup {
        /// Age cutoff in days
        #[arg(long, default_value = "30")]
        days: u32,
        /// Skip confirmation prompt
        #[arg(long)]
        confirm: bool,
    },

    /// Manage admin bearer tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Start the batch API server
    Serve {
        /// Address to bind to (defaults to the configured bind address)
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Create a new token (prints the plaintext once)
    Create {
        /// Label identifying the token holder
        #[arg(short, long)]
        label: String,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
    /// List token labels
    List,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings().await;
    if let Some(data_dir) = cli.data_dir {
        settings = Settings::with_data_dir(data_dir);
    }

    match cli.command {
        Commands::Init => commands::init::run(&settings).await,
        Commands::Enqueue {
            queue,
            payload,
            file,
            defer_minutes,
        } => {
            commands::enqueue::run(
                &settings,
                &queue,
                payload.as_deref(),
                file.as_deref(),
                defer_minutes,
            )
            .await
        }
        Commands::Process {
            queue,
            batch_size,
            watch,
            interval,
        } => commands::process::run(&settings, &queue, batch_size, watch, interval).await,
        Commands::Status { queue } => commands::status::run(&settings, queue.as_deref()).await,
        Commands::RetryFailed { queue } => commands::admin::retry_failed(&settings, &queue).await,
        Commands::Cleanup { days, confirm } => {
            commands::admin::cleanup(&settings, days, confirm).await
        }
        Commands::Token { command } => match command {
            TokenCommands::Create { label, admin } => {
                commands::admin::token_create(&settings, &label, admin).await
            }
            TokenCommands::List => commands::admin::token_list(&settings).await,
        },
        Commands::Serve { bind } => commands::serve::run(&settings, bind.as_deref()).await,
    }
}
