// ABOUTME: Deployment verification report.
// ABOUTME: Ordered pass/fail checks plus remote log lines and an aggregate verdict.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

pub const CHECK_REVISION: &str = "revision match";
pub const CHECK_PROCESS: &str = "process status";
pub const CHECK_HTTP: &str = "http status";

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    checks: Vec<Check>,
    logs: Vec<String>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&mut self, name: &'static str, detail: impl Into<String>) {
        self.record(name, true, detail.into());
    }

    pub fn fail(&mut self, name: &'static str, detail: impl Into<String>) {
        self.record(name, false, detail.into());
    }

    fn record(&mut self, name: &'static str, passed: bool, detail: String) {
        tracing::debug!(check = name, passed, "{}", detail);
        self.checks.push(Check {
            name,
            passed,
            detail,
        });
    }

    pub fn attach_logs(&mut self, logs: Vec<String>) {
        self.logs = logs;
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// True only when every gate was evaluated and passed.
    pub fn passed(&self) -> bool {
        [CHECK_REVISION, CHECK_PROCESS, CHECK_HTTP]
            .iter()
            .all(|name| self.checks.iter().any(|c| c.name == *name && c.passed))
            && self.checks.iter().all(|c| c.passed)
    }
}
