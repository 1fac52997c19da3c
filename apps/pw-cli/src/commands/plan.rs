// plan.rs — Planner-side plan management.
//
// Registering a plan is the planner's one mutation: the document is
// parsed, linted with the same content policy writes face, and stored
// content-addressed at docs/plans/<hash>.md. The registry refuses while
// it is still empty — the first plan only enters through bootstrap.

use std::path::Path;
use std::str::FromStr;

use clap::Subcommand;

use pw_plan::PlanRegistry;
use pw_policy::ContentPolicy;
use pw_session::Role;

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Register an approved plan document (planner role only).
    Register {
        /// Path to the plan document.
        file: std::path::PathBuf,
    },
    /// List approved plan identities.
    List,
}

pub fn execute(root: &Path, role_flag: Option<&str>, command: PlanCommands) -> anyhow::Result<()> {
    match command {
        PlanCommands::Register { file } => {
            let role_value = role_flag
                .map(str::to_string)
                .or_else(|| std::env::var(pw_gateway::ROLE_ENV).ok())
                .unwrap_or_else(|| "executor".to_string());
            let role = Role::from_str(&role_value)?;
            if !role.may_register_plans() {
                anyhow::bail!("role '{}' may not register plans (planner only)", role);
            }

            let content = std::fs::read_to_string(&file)?;
            let mut registry = PlanRegistry::load(root)?;
            let plan = registry.register(&content, &ContentPolicy::new())?;
            println!("registered {} ({})", plan.hash, plan.header.purpose);
            Ok(())
        }
        PlanCommands::List => {
            let mut registry = PlanRegistry::load(root)?;
            let report = registry.reconcile()?;
            if !report.is_clean() {
                for hash in &report.mismatched {
                    eprintln!("warning: plan file {} does not match its name", hash);
                }
                for hash in &report.missing {
                    eprintln!("warning: indexed plan {} is missing on disk", hash);
                }
            }
            for hash in registry.approved_hashes() {
                println!("{}", hash);
            }
            Ok(())
        }
    }
}
