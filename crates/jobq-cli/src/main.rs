//! jobq CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod pid;

#[derive(Parser)]
#[command(name = "jobq")]
#[command(about = "Single-node background job queue", long_about = None)]
struct Cli {
    /// Path to the SQLite job database
    #[arg(long, env = "JOBQ_DB", default_value = ".data/jobq.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job
    Enqueue {
        /// Unique job id
        id: String,
        /// Shell command to execute
        command: String,
        /// Attempt ceiling before the job goes dead (configured default when omitted)
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// List jobs
    List {
        /// Filter by job state
        #[arg(long)]
        state: Option<String>,
        /// Show captured stdout/stderr previews instead of the error column
        #[arg(long)]
        output: bool,
    },
    /// Show full details for one job, output included
    Show {
        /// Job id
        id: String,
    },
    /// Job status summary and worker liveness
    Status,
    /// Dead-letter queue operations
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage worker processes
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
}

#[derive(Subcommand)]
enum DlqCommands {
    /// Requeue a dead job as pending
    Retry {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a config key in the persisted config file
    Set { key: String, value: String },
    /// Print one effective config value, or all when no key is given
    Get { key: Option<String> },
    /// Show the effective configuration
    Show,
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Spawn detached worker processes
    Start {
        /// Number of workers to start
        #[arg(long, default_value = "1")]
        count: u32,
    },
    /// Send SIGTERM to all recorded workers
    Stop,
    /// Run a worker loop in the foreground
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue {
            id,
            command,
            max_retries,
        } => {
            commands::jobs::enqueue(&cli.db, id, command, max_retries).await?;
        }
        Commands::List { state, output } => {
            commands::jobs::list(&cli.db, state, output).await?;
        }
        Commands::Show { id } => {
            commands::jobs::show(&cli.db, &id).await?;
        }
        Commands::Status => {
            commands::status::status(&cli.db).await?;
        }
        Commands::Dlq { command } => match command {
            DlqCommands::Retry { id } => {
                commands::jobs::retry_dead(&cli.db, &id).await?;
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Set { key, value } => {
                commands::config::set(&key, &value)?;
            }
            ConfigCommands::Get { key } => {
                commands::config::get(key.as_deref())?;
            }
            ConfigCommands::Show => {
                commands::config::show()?;
            }
        },
        Commands::Worker { command } => match command {
            WorkerCommands::Start { count } => {
                commands::worker::start(&cli.db, count)?;
            }
            WorkerCommands::Stop => {
                commands::worker::stop()?;
            }
            WorkerCommands::Run => {
                commands::worker::run(&cli.db).await?;
            }
        },
    }

    Ok(())
}
