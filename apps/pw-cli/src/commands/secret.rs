// secret.rs — Manage the file-based bootstrap secret.

use std::path::Path;

use clap::Subcommand;

use pw_plan::BootstrapSecret;

#[derive(Subcommand)]
pub enum SecretCommands {
    /// Generate `.planward/bootstrap_secret.json` (no-op if present).
    Init,
}

pub fn execute(root: &Path, command: SecretCommands) -> anyhow::Result<()> {
    match command {
        SecretCommands::Init => {
            let path = BootstrapSecret::generate(root)?;
            println!("bootstrap secret at {}", path.display());
            Ok(())
        }
    }
}
