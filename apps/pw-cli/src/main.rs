//! # pw-cli
//!
//! Command-line interface for Planward.
//!
//! - `pw serve` — start the MCP governance gateway on stdio
//! - `pw audit verify/tail` — inspect the tamper-evident audit trail
//! - `pw replay <plan-hash>` — read-only replay of a plan's history
//! - `pw secret init` — generate the file-based bootstrap secret

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Planward CLI — plan-governed writes for AI coding agents.
#[derive(Parser)]
#[command(name = "pw", version, about)]
struct Cli {
    /// Workspace root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Launch role: planner or executor. Falls back to PLANWARD_ROLE,
    /// then to executor.
    #[arg(long, global = true)]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP gateway on stdio.
    Serve,
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Manage approved plans.
    Plan {
        #[command(subcommand)]
        command: commands::plan::PlanCommands,
    },
    /// Replay a plan's audit history, read-only.
    Replay {
        /// Plan hash to replay.
        plan: String,
        /// Restrict to one phase.
        #[arg(long)]
        phase: Option<String>,
        /// Restrict to one tool.
        #[arg(long)]
        tool: Option<String>,
    },
    /// Manage the bootstrap secret.
    Secret {
        #[command(subcommand)]
        command: commands::secret::SecretCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr: stdout belongs to the MCP transport when serving.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .project_root
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot resolve project root: {}", e))?;

    match cli.command {
        Commands::Serve => commands::serve::execute(cli.role.as_deref()),
        Commands::Audit { command } => commands::audit::execute(&root, command),
        Commands::Plan { command } => commands::plan::execute(&root, cli.role.as_deref(), command),
        Commands::Replay { plan, phase, tool } => {
            commands::replay::execute(&root, &plan, phase, tool)
        }
        Commands::Secret { command } => commands::secret::execute(&root, command),
    }
}
