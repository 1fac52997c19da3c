// audit.rs — Inspect the tamper-evident audit trail.

use std::path::Path;

use clap::Subcommand;

use pw_audit::AuditLog;
use pw_replay::{verify_workspace_integrity, AUDIT_LOG_FILE};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the hash chain and sequence continuity.
    Verify,
    /// Print the last N records.
    Tail {
        /// How many records to show.
        #[arg(long, default_value_t = 10)]
        lines: usize,
    },
}

pub fn execute(root: &Path, command: AuditCommands) -> anyhow::Result<()> {
    match command {
        AuditCommands::Verify => {
            let report = verify_workspace_integrity(root)?;
            if report.pass {
                println!("OK: {} record(s), chain intact", report.entries);
            } else {
                println!(
                    "FAIL: {} at seq {} ({})",
                    report
                        .first_failing_invariant
                        .as_deref()
                        .unwrap_or("UNKNOWN"),
                    report
                        .offending_seq
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    report.detail.as_deref().unwrap_or(""),
                );
                std::process::exit(1);
            }
            Ok(())
        }
        AuditCommands::Tail { lines } => {
            let log_path = root.join(AUDIT_LOG_FILE);
            if !log_path.exists() {
                anyhow::bail!("no audit log at {}", log_path.display());
            }
            let records = AuditLog::read_all(&log_path)?;
            for record in records.iter().rev().take(lines).rev() {
                println!(
                    "#{:<5} {}  {:<12} {:<14} plan={} {}",
                    record.seq,
                    record.ts.format("%Y-%m-%d %H:%M:%S"),
                    record.tool,
                    record.intent,
                    record
                        .plan_hash
                        .as_deref()
                        .map(|h| &h[..12.min(h.len())])
                        .unwrap_or("-"),
                    record.error_code.as_deref().unwrap_or(""),
                );
            }
            Ok(())
        }
    }
}
