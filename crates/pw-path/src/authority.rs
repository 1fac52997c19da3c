// authority.rs — The single source of truth for path legality.
//
// A PathAuthority owns the locked workspace root. Every external path —
// from tool calls, plan scopes, or config — is resolved here before any
// filesystem operation touches it. Resolution is lexical first (traversal
// components are collapsed without consulting the filesystem), then the
// nearest existing ancestor is canonicalized to catch symlink escapes.
//
// No operation expands environment variables or `~`. A path that escapes
// the root fails the calling operation outright; there is no partial state.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// The locked workspace root plus resolution rules.
///
/// Constructed once per session via [`PathAuthority::lock`]; the root is
/// immutable afterwards. Cloning is cheap and keeps the same root.
#[derive(Debug, Clone)]
pub struct PathAuthority {
    root: PathBuf,
}

impl PathAuthority {
    /// Lock the workspace root.
    ///
    /// Fails unless `root` is an absolute path naming an existing directory.
    /// The caller (the session) is responsible for calling this exactly once.
    pub fn lock(root: impl AsRef<Path>) -> Result<Self, PathError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            return Err(PathError::RootNotAbsolute(root));
        }
        if !root.is_dir() {
            return Err(PathError::RootNotDirectory(root));
        }
        // Canonicalize once so later prefix checks compare like with like.
        let root = fs::canonicalize(&root).map_err(|source| PathError::Io {
            path: root.clone(),
            source,
        })?;
        tracing::debug!(root = %root.display(), "workspace root locked");
        Ok(Self { root })
    }

    /// The locked workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path for reading.
    ///
    /// Returns the canonical absolute path. The path must exist and must
    /// resolve inside the root. The root itself is a legal read target
    /// (it is a directory).
    pub fn resolve_read(&self, path: &str) -> Result<PathBuf, PathError> {
        let resolved = self.resolve_lexical(path)?;
        self.check_symlinks(&resolved)?;
        if !resolved.exists() {
            return Err(PathError::NotFound(resolved));
        }
        Ok(resolved)
    }

    /// Resolve a path for writing.
    ///
    /// Returns the canonical absolute path. The path need not exist, but it
    /// must be a strict descendant of the root — writing to the root itself
    /// is rejected.
    pub fn resolve_write(&self, path: &str) -> Result<PathBuf, PathError> {
        let resolved = self.resolve_lexical(path)?;
        if resolved == self.root {
            return Err(PathError::OutsideRoot(resolved));
        }
        self.check_symlinks(&resolved)?;
        Ok(resolved)
    }

    /// Create any missing parent directories beneath the root for `path`.
    ///
    /// `path` must already have been resolved by this authority.
    pub fn ensure_dir(&self, path: &Path) -> Result<(), PathError> {
        debug_assert!(path.starts_with(&self.root));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PathError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Lexically resolve `path` to an absolute in-root path.
    ///
    /// Accepts both relative paths and absolute paths that begin with the
    /// root. `..` components are collapsed without touching the filesystem;
    /// collapsing above the root is a traversal error even when the final
    /// result would land back inside.
    fn resolve_lexical(&self, path: &str) -> Result<PathBuf, PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath);
        }

        let candidate = Path::new(path);
        let relative = if candidate.is_absolute() {
            match candidate.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => return Err(PathError::OutsideRoot(candidate.to_path_buf())),
            }
        } else {
            candidate.to_path_buf()
        };

        let mut resolved = self.root.clone();
        let mut depth: usize = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        // Popping above the root is traversal, full stop.
                        return Err(PathError::Traversal(path.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::OutsideRoot(candidate.to_path_buf()));
                }
            }
        }

        Ok(resolved)
    }

    /// Verify that no symlink along `path` escapes the root.
    ///
    /// Canonicalize is unreliable on paths that don't exist yet, so the
    /// check canonicalizes the nearest existing ancestor instead and
    /// verifies it still sits under the root.
    fn check_symlinks(&self, path: &Path) -> Result<(), PathError> {
        let mut probe = path.to_path_buf();
        while !probe.exists() {
            if !probe.pop() {
                return Ok(());
            }
        }
        let canonical = fs::canonicalize(&probe).map_err(|source| PathError::Io {
            path: probe.clone(),
            source,
        })?;
        if !canonical.starts_with(&self.root) {
            return Err(PathError::SymlinkEscape(path.to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn authority() -> (PathAuthority, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let authority = PathAuthority::lock(dir.path()).unwrap();
        (authority, dir)
    }

    #[test]
    fn lock_rejects_relative_root() {
        let err = PathAuthority::lock("relative/dir").unwrap_err();
        assert!(matches!(err, PathError::RootNotAbsolute(_)));
    }

    #[test]
    fn lock_rejects_missing_root() {
        let err = PathAuthority::lock("/definitely/not/a/real/dir").unwrap_err();
        assert!(matches!(err, PathError::RootNotDirectory(_)));
    }

    #[test]
    fn resolve_write_joins_relative_paths() {
        let (authority, dir) = authority();
        let resolved = authority.resolve_write("src/main.rs").unwrap();
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("src/main.rs")
        );
    }

    #[test]
    fn resolve_accepts_paths_prefixed_with_root() {
        let (authority, _dir) = authority();
        let absolute = authority.root().join("file.txt").display().to_string();
        let resolved = authority.resolve_write(&absolute).unwrap();
        assert_eq!(resolved, authority.root().join("file.txt"));
    }

    #[test]
    fn resolve_rejects_empty_path() {
        let (authority, _dir) = authority();
        assert!(matches!(
            authority.resolve_write(""),
            Err(PathError::EmptyPath)
        ));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let (authority, _dir) = authority();
        assert!(matches!(
            authority.resolve_write("../etc/secret"),
            Err(PathError::Traversal(_))
        ));
    }

    #[test]
    fn traversal_that_returns_inside_still_fails() {
        // `a/../../root-name/file` pops above the root before coming back.
        let (authority, _dir) = authority();
        let sneaky = format!(
            "a/../../{}/file.txt",
            authority.root().file_name().unwrap().to_string_lossy()
        );
        assert!(matches!(
            authority.resolve_write(&sneaky),
            Err(PathError::Traversal(_))
        ));
    }

    #[test]
    fn interior_dotdot_collapses_lexically() {
        let (authority, _dir) = authority();
        let resolved = authority.resolve_write("src/../docs/plan.md").unwrap();
        assert_eq!(resolved, authority.root().join("docs/plan.md"));
    }

    #[test]
    fn resolve_rejects_foreign_absolute_path() {
        let (authority, _dir) = authority();
        assert!(matches!(
            authority.resolve_write("/etc/passwd"),
            Err(PathError::OutsideRoot(_))
        ));
    }

    #[test]
    fn read_requires_existence() {
        let (authority, _dir) = authority();
        assert!(matches!(
            authority.resolve_read("missing.txt"),
            Err(PathError::NotFound(_))
        ));
    }

    #[test]
    fn read_accepts_the_root_itself() {
        let (authority, _dir) = authority();
        let root = authority.root().display().to_string();
        let resolved = authority.resolve_read(&root).unwrap();
        assert_eq!(resolved, authority.root());
    }

    #[test]
    fn write_rejects_the_root_itself() {
        let (authority, _dir) = authority();
        let root = authority.root().display().to_string();
        assert!(matches!(
            authority.resolve_write(&root),
            Err(PathError::OutsideRoot(_))
        ));
    }

    #[test]
    fn ensure_dir_creates_parents() {
        let (authority, _dir) = authority();
        let resolved = authority.resolve_write("deep/nested/file.txt").unwrap();
        authority.ensure_dir(&resolved).unwrap();
        assert!(authority.root().join("deep/nested").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let outside = tempdir().unwrap();
        let (authority, _dir) = authority();
        std::os::unix::fs::symlink(outside.path(), authority.root().join("escape")).unwrap();

        let result = authority.resolve_write("escape/file.txt");
        assert!(matches!(result, Err(PathError::SymlinkEscape(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_root_is_fine() {
        let (authority, _dir) = authority();
        std::fs::create_dir_all(authority.root().join("real")).unwrap();
        std::os::unix::fs::symlink(
            authority.root().join("real"),
            authority.root().join("alias"),
        )
        .unwrap();

        assert!(authority.resolve_write("alias/file.txt").is_ok());
    }
}
