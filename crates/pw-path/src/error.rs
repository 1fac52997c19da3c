// error.rs — Error types for path authority operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving paths against the locked root.
#[derive(Debug, Error)]
pub enum PathError {
    /// The workspace root handed to `lock` was not an absolute path.
    #[error("workspace root is not absolute: {0}")]
    RootNotAbsolute(PathBuf),

    /// The workspace root does not exist or is not a directory.
    #[error("workspace root is not an existing directory: {0}")]
    RootNotDirectory(PathBuf),

    /// An empty path was supplied.
    #[error("empty path")]
    EmptyPath,

    /// The path contains traversal components that escape the root.
    #[error("path traversal escapes the workspace root: {0}")]
    Traversal(String),

    /// The resolved path lies outside the workspace root.
    #[error("path resolves outside the workspace root: {0}")]
    OutsideRoot(PathBuf),

    /// A symlink along the path resolves outside the workspace root.
    #[error("symlink escapes the workspace root: {0}")]
    SymlinkEscape(PathBuf),

    /// The path does not exist (reads only).
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// An underlying filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
