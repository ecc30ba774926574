// ABOUTME: Runs the configured build tool for a target with passthrough arguments.
// ABOUTME: Output is captured; the tail of stderr is kept for failure reports.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::error::ErrorClass;

/// Stderr lines kept when a build fails.
const TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build tool '{0}' is not installed or not on PATH")]
    ToolNotFound(String),

    #[error("no build command configured")]
    NoCommand,

    #[error("'{command}' exited with {}", code.map_or("a signal".to_string(), |c| format!("code {c}")))]
    Failed {
        command: String,
        code: Option<i32>,
        tail: Vec<String>,
    },

    #[error("'{command}' did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to run build: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn kind(&self) -> ErrorClass {
        match self {
            BuildError::ToolNotFound(_) | BuildError::NoCommand => ErrorClass::Precondition,
            BuildError::Failed { .. } | BuildError::TimedOut { .. } => ErrorClass::Liveness,
            BuildError::Io(_) => ErrorClass::Io,
        }
    }

    /// Last lines the build wrote to stderr.
    pub fn tail(&self) -> &[String] {
        match self {
            BuildError::Failed { tail, .. } => tail,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildRunner {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
}

impl BuildRunner {
    pub fn new(command: &[String], workdir: &Path) -> Self {
        Self {
            command: command.to_vec(),
            workdir: workdir.to_path_buf(),
            timeout: crate::config::DEFAULT_BUILD_TIMEOUT,
        }
    }

    /// The build is killed once `timeout` has passed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argv: configured command, then target, then passthrough arguments.
    pub fn argv(&self, target: &str, extra: &[String]) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.push(target.to_string());
        argv.extend(extra.iter().cloned());
        argv
    }

    pub async fn run(&self, target: &str, extra: &[String]) -> Result<(), BuildError> {
        let argv = self.argv(target, extra);
        let (program, args) = argv.split_first().ok_or(BuildError::NoCommand)?;
        let cmdline = argv.join(" ");
        tracing::debug!("running build: {}", cmdline);

        let child = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| BuildError::TimedOut {
                command: cmdline.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BuildError::ToolNotFound(program.clone()),
                _ => BuildError::Io(e),
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(target: "shipline::build", "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(TAIL_LINES)..]
                .iter()
                .map(|l| l.to_string())
                .collect();
            return Err(BuildError::Failed {
                command: cmdline,
                code: output.status.code(),
                tail,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn argv_appends_target_then_passthrough() {
        let runner = BuildRunner::new(&argv(&["flutter", "build"]), Path::new("."));
        assert_eq!(
            runner.argv("linux", &argv(&["--release"])),
            argv(&["flutter", "build", "linux", "--release"])
        );
    }

    #[tokio::test]
    async fn missing_tool_is_precondition() {
        let runner = BuildRunner::new(&argv(&["shipline-no-such-tool-xyz"]), Path::new("."));
        let err = runner.run("linux", &[]).await.unwrap_err();
        assert!(matches!(err, BuildError::ToolNotFound(_)));
        assert_eq!(err.kind(), ErrorClass::Precondition);
    }

    #[tokio::test]
    async fn failing_build_keeps_stderr_tail() {
        let runner = BuildRunner::new(&argv(&["sh", "-c", "echo boom >&2; exit 3", "sh"]), Path::new("."));
        let err = runner.run("linux", &[]).await.unwrap_err();
        match &err {
            BuildError::Failed { code, tail, .. } => {
                assert_eq!(*code, Some(3));
                assert_eq!(tail, &vec!["boom".to_string()]);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hanging_build_is_killed_at_its_timeout() {
        let runner = BuildRunner::new(&argv(&["sh", "-c", "sleep 30", "sh"]), Path::new("."))
            .with_timeout(Duration::from_millis(300));
        let started = std::time::Instant::now();

        let err = runner.run("linux", &[]).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, BuildError::TimedOut { timeout, .. } if timeout == Duration::from_millis(300)));
        assert_eq!(err.kind(), ErrorClass::Liveness);
    }
}
