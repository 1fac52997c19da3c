// error.rs — Error types for the preflight runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading config or launching the command.
///
/// A command that *runs* and fails is not an error here — that outcome is
/// reported in the `PreflightReport` so the pipeline can revert and attach
/// the captured output.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// The workspace config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The workspace config file is not valid TOML.
    #[error("invalid config at {path}: {detail}")]
    ConfigInvalid { path: PathBuf, detail: String },

    /// The configured command could not be spawned at all.
    #[error("failed to spawn preflight command '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },
}
