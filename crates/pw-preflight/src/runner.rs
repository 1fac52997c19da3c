// runner.rs — Execute the repository's verification command.
//
// The runner proves the post-write tree still satisfies repository-defined
// checks: run the configured command in the workspace root, capture stdout
// and stderr, succeed iff it exits zero within the timeout. The timeout is
// enforced by killing the child process — no cooperative cancellation.
// Partial output is retained regardless of outcome so rejection payloads
// can carry it.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::PreflightConfig;
use crate::error::PreflightError;

/// Captured output is truncated to this many bytes per stream.
const OUTPUT_CAP: usize = 64 * 1024;

/// How the preflight run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreflightStatus {
    /// Exit code zero within the timeout.
    Passed,
    /// Non-zero exit code.
    Failed { exit_code: i32 },
    /// Killed at the deadline.
    TimedOut,
    /// No command configured; nothing was run.
    Skipped,
}

impl PreflightStatus {
    /// Whether the write may proceed to the audit commit.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, PreflightStatus::Passed | PreflightStatus::Skipped)
    }
}

/// Outcome plus captured output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightReport {
    pub status: PreflightStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl PreflightReport {
    fn skipped() -> Self {
        Self {
            status: PreflightStatus::Skipped,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }
}

/// Run the configured verification command against the working root.
///
/// `None` config means no command is configured; the report says so and
/// nothing is executed.
pub fn run(
    workspace_root: &Path,
    config: Option<&PreflightConfig>,
) -> Result<PreflightReport, PreflightError> {
    let Some(config) = config else {
        return Ok(PreflightReport::skipped());
    };
    let Some((program, args)) = config.command.split_first() else {
        return Ok(PreflightReport::skipped());
    };

    let started = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(workspace_root)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| PreflightError::SpawnFailed {
            command: config.command.join(" "),
            source,
        })?;

    // Drain both pipes on threads so a chatty child can't deadlock against
    // a full pipe buffer while we poll for exit.
    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    let deadline = started + Duration::from_secs(config.timeout_secs);
    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    timed_out = true;
                    let _ = child.kill();
                    break child.wait().ok();
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => break None,
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    let duration_ms = started.elapsed().as_millis() as u64;

    let status = if timed_out {
        PreflightStatus::TimedOut
    } else {
        match exit_status {
            Some(status) if status.success() => PreflightStatus::Passed,
            Some(status) => PreflightStatus::Failed {
                exit_code: status.code().unwrap_or(-1),
            },
            None => PreflightStatus::Failed { exit_code: -1 },
        }
    };

    tracing::debug!(?status, duration_ms, "preflight finished");
    Ok(PreflightReport {
        status,
        stdout,
        stderr,
        duration_ms,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let Some(mut source) = source else {
            return String::new();
        };
        let mut buffer = Vec::new();
        let _ = source.read_to_end(&mut buffer);
        buffer.truncate(OUTPUT_CAP);
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn config(command: &[&str], timeout_secs: u64) -> PreflightConfig {
        PreflightConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn no_command_is_skipped() {
        let dir = tempdir().unwrap();
        let report = run(dir.path(), None).unwrap();
        assert_eq!(report.status, PreflightStatus::Skipped);
        assert!(report.status.is_acceptable());
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_passes() {
        let dir = tempdir().unwrap();
        let report = run(dir.path(), Some(&config(&["true"], 30))).unwrap();
        assert_eq!(report.status, PreflightStatus::Passed);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_fails_with_code() {
        let dir = tempdir().unwrap();
        let report = run(dir.path(), Some(&config(&["sh", "-c", "exit 3"], 30))).unwrap();
        assert_eq!(report.status, PreflightStatus::Failed { exit_code: 3 });
        assert!(!report.status.is_acceptable());
    }

    #[cfg(unix)]
    #[test]
    fn output_is_captured_on_failure() {
        let dir = tempdir().unwrap();
        let report = run(
            dir.path(),
            Some(&config(&["sh", "-c", "echo out; echo err >&2; exit 1"], 30)),
        )
        .unwrap();
        assert!(report.stdout.contains("out"));
        assert!(report.stderr.contains("err"));
    }

    #[cfg(unix)]
    #[test]
    fn command_runs_in_the_workspace_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("witness.txt"), "present").unwrap();
        let report = run(
            dir.path(),
            Some(&config(&["sh", "-c", "cat witness.txt"], 30)),
        )
        .unwrap();
        assert_eq!(report.status, PreflightStatus::Passed);
        assert!(report.stdout.contains("present"));
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_the_child() {
        let dir = tempdir().unwrap();
        let started = Instant::now();
        let report = run(dir.path(), Some(&config(&["sleep", "30"], 1))).unwrap();
        assert_eq!(report.status, PreflightStatus::TimedOut);
        // Killed near the 1s deadline, nowhere near 30s.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn env_subset_is_passed_through() {
        let dir = tempdir().unwrap();
        let mut cfg = config(&["sh", "-c", "echo $PW_CHECK"], 30);
        cfg.env.insert("PW_CHECK".into(), "present".into());
        let report = run(dir.path(), Some(&cfg)).unwrap();
        assert!(report.stdout.contains("present"));
    }

    #[test]
    fn unspawnable_command_is_an_error() {
        let dir = tempdir().unwrap();
        let result = run(
            dir.path(),
            Some(&config(&["definitely-not-a-real-binary-pw"], 5)),
        );
        assert!(matches!(result, Err(PreflightError::SpawnFailed { .. })));
    }
}
