//! coachloop CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config, database, and learner profile
//! - `run`     — Run an agent session for a goal
//! - `resume`  — Resume a session waiting on approval
//! - `digest`  — Generate (or fetch) today's learning digest
//! - `status`  — Show configuration and storage status

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "coachloop",
    about = "coachloop — agentic personal learning coach",
    version
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
    /// Initialize configuration, database, and your learner profile
    Onboard {
        /// Learner identifier
        #[arg(short, long, default_value = "me")]
        user: String,

        /// Current curriculum week
        #[arg(short, long, default_value_t = 1)]
        week: u32,

        /// This week's topics (repeatable)
        #[arg(short, long)]
        topic: Vec<String>,

        /// Difficulty level: beginner, intermediate, or advanced
        #[arg(short, long, default_value = "intermediate")]
        level: String,
    },

    /// Run an agent session for a goal
    Run {
        /// The goal to pursue
        goal: String,

        /// Learner identifier
        #[arg(short, long, default_value = "me")]
        user: String,

        /// Print the full phase log after the run
        #[arg(long)]
        show_log: bool,
    },

    /// Resume a session suspended for approval
    Resume {
        /// The session id printed when the run suspended
        session_id: String,

        /// Approve the pending plan
        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        /// Reject the pending plan
        #[arg(long)]
        reject: bool,

        /// Why the plan was rejected
        #[arg(long, requires = "reject")]
        reason: Option<String>,
    },

    /// Generate (or fetch from cache) today's learning digest
    Digest {
        /// Learner identifier
        #[arg(short, long, default_value = "me")]
        user: String,

        /// Regenerate even if a fresh cached digest exists
        #[arg(short, long)]
        force: bool,

        /// Answer this question instead of the weekly digest
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show configuration and storage status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard {
            user,
            week,
            topic,
            level,
        } => commands::onboard::run(&user, week, topic, &level).await?,
        Commands::Run {
            goal,
            user,
            show_log,
        } => commands::run::run(&goal, &user, show_log).await?,
        Commands::Resume {
            session_id,
            approve,
            reject,
            reason,
        } => commands::resume::run(&session_id, approve, reject, reason).await?,
        Commands::Digest { user, force, query } => {
            commands::digest::run(&user, force, query).await?
        }
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
