// ABOUTME: User-facing output for the CLI: human text, terse CI lines, or JSON events.
// ABOUTME: Every command reports through Output so the mode is chosen once in main.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::VerificationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress lines plus results.
    Normal,
    /// Final results only, for CI logs.
    Quiet,
    /// One JSON object per line.
    Json,
}

pub struct Output {
    mode: OutputMode,
    started: Option<Instant>,
}

/// JSON lines written in `--json` mode. Failures and warnings go to stderr.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Success {
        message: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_secs: Option<f64>,
    },
    Warning {
        message: &'a str,
    },
    Error {
        message: &'a str,
    },
    StageFailed {
        stage: &'a str,
        message: &'a str,
        #[serde(skip_serializing_if = "no_logs")]
        logs: &'a [String],
    },
    Check {
        name: &'a str,
        passed: bool,
        detail: &'a str,
    },
    Report {
        passed: bool,
        #[serde(skip_serializing_if = "no_logs")]
        logs: &'a [String],
    },
}

fn no_logs(logs: &&[String]) -> bool {
    logs.is_empty()
}

impl Event<'_> {
    fn emit(&self) {
        let Ok(line) = serde_json::to_string(self) else {
            return;
        };
        match self {
            Event::Warning { .. } | Event::Error { .. } | Event::StageFailed { .. } => {
                eprintln!("{line}")
            }
            _ => println!("{line}"),
        }
    }
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Output {
            mode,
            started: None,
        }
    }

    /// Successes printed after this carry the elapsed time.
    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Option<f64> {
        self.started.map(|t| t.elapsed().as_secs_f64())
    }

    /// Shown in normal mode only.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => Event::Warning { message }.emit(),
        }
    }

    pub fn success(&self, message: &str) {
        match (self.mode, self.elapsed()) {
            (OutputMode::Json, duration_secs) => Event::Success {
                message,
                duration_secs,
            }
            .emit(),
            (OutputMode::Normal, Some(secs)) => println!("{message} ({secs:.1}s)"),
            _ => println!("{message}"),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Json => Event::Error { message }.emit(),
            _ => eprintln!("Error: {message}"),
        }
    }

    /// A failure attributed to a pipeline stage, with the subsystem's last log lines.
    pub fn stage_failed(&self, stage: &str, cause: &str, logs: &[String]) {
        if self.mode == OutputMode::Json {
            Event::StageFailed {
                stage,
                message: cause,
                logs,
            }
            .emit();
            return;
        }
        eprintln!("Error: stage '{stage}' failed: {cause}");
        if !logs.is_empty() {
            eprintln!("Last {} log line(s):", logs.len());
            for line in logs {
                eprintln!("  | {line}");
            }
        }
    }

    pub fn report(&self, report: &VerificationReport) {
        let verdict = if report.passed() { "PASS" } else { "FAIL" };
        match self.mode {
            OutputMode::Normal => {
                println!("Verification:");
                for check in report.checks() {
                    let mark = if check.passed { "✓" } else { "✗" };
                    println!("  {mark} {}: {}", check.name, check.detail);
                }
                println!("Overall: {verdict}");
            }
            OutputMode::Quiet => println!("verification: {verdict}"),
            OutputMode::Json => {
                for check in report.checks() {
                    Event::Check {
                        name: check.name,
                        passed: check.passed,
                        detail: &check.detail,
                    }
                    .emit();
                }
                Event::Report {
                    passed: report.passed(),
                    logs: report.logs(),
                }
                .emit();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_snake_case() {
        let logs = vec!["error: linker".to_string()];
        let json = serde_json::to_string(&Event::StageFailed {
            stage: "build",
            message: "exit 1",
            logs: &logs,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"stage_failed","stage":"build","message":"exit 1","logs":["error: linker"]}"#
        );
    }

    #[test]
    fn empty_logs_and_missing_duration_are_omitted() {
        let json = serde_json::to_string(&Event::Report {
            passed: true,
            logs: &[],
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"report","passed":true}"#);

        let json = serde_json::to_string(&Event::Success {
            message: "done",
            duration_secs: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"success","message":"done"}"#);
    }
}
