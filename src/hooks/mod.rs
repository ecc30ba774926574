// ABOUTME: Project-local scripts run around a release.
// ABOUTME: Looks up .shipline/hooks/<point> and runs it with the release identity in its environment.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::types::AppName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before any file is stamped. A failure aborts the release.
    PreRelease,
    /// After every stage succeeded.
    PostRelease,
    /// After a stage failed and local state was restored.
    OnError,
}

impl HookPoint {
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreRelease => "pre-release",
            HookPoint::PostRelease => "post-release",
            HookPoint::OnError => "on-error",
        }
    }

    /// Only the pre-release hook can stop a run. The others are reported as warnings.
    pub fn is_fatal(&self) -> bool {
        *self == HookPoint::PreRelease
    }
}

/// What a hook learns about the release it runs for.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub app: AppName,
    pub version: String,
    pub commit: String,
    /// Failing stage, set for on-error hooks only.
    pub stage: Option<String>,
}

impl HookContext {
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("SHIPLINE_APP", self.app.to_string()),
            ("SHIPLINE_VERSION", self.version.clone()),
            ("SHIPLINE_COMMIT", self.commit.clone()),
        ];
        env.extend(self.stage.clone().map(|stage| ("SHIPLINE_STAGE", stage)));
        env
    }
}

#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    /// `None` when the script never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookResult {
    fn from_output(output: Output) -> Self {
        HookResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    fn spawn_failed(err: std::io::Error) -> Self {
        HookResult {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }

    /// One line for error messages: the exit status plus whatever the hook said on stderr.
    pub fn summary(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exited with {code}"),
            None => "did not run to completion".to_string(),
        };
        match self.stderr.trim() {
            "" => status,
            stderr => format!("{status}: {stderr}"),
        }
    }
}

pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Hooks live in `<project>/.shipline/hooks`.
    pub fn new(project_dir: &Path) -> Self {
        HookRunner {
            hooks_dir: project_dir.join(".shipline/hooks"),
        }
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run the hook for `point`. `None` means the project has no such hook.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let path = self.hook_path(point);
        if !path.is_file() {
            return None;
        }

        tracing::info!(hook = point.filename(), path = %path.display(), "running hook");
        let result = match Command::new(&path)
            .envs(context.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(output) => HookResult::from_output(output),
            Err(err) => HookResult::spawn_failed(err),
        };

        if result.success {
            tracing::debug!(hook = point.filename(), "hook finished");
        } else {
            tracing::warn!(hook = point.filename(), "hook {}", result.summary());
        }
        Some(result)
    }
}
