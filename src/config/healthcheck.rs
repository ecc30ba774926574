// ABOUTME: Post-restart health verification configuration.
// ABOUTME: Process-status polling bounds, HTTP probe target, and log tail size.

use serde::Deserialize;
use std::time::Duration;

use crate::poll::PollPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthcheckConfig {
    /// Plain `http://` endpoint probed once the process is running.
    pub url: String,

    #[serde(default = "default_process_interval", with = "humantime_serde")]
    pub process_interval: Duration,

    #[serde(default = "default_process_timeout", with = "humantime_serde")]
    pub process_timeout: Duration,

    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Remote log lines surfaced when the probe fails.
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,
}

fn default_process_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_process_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_log_lines() -> u32 {
    50
}

impl HealthcheckConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            process_interval: default_process_interval(),
            process_timeout: default_process_timeout(),
            probe_timeout: default_probe_timeout(),
            log_lines: default_log_lines(),
        }
    }

    pub fn process_policy(&self) -> PollPolicy {
        PollPolicy::new(self.process_interval, self.process_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let health: HealthcheckConfig =
            serde_yaml::from_str("url: http://localhost:8080/health").unwrap();
        assert_eq!(health, HealthcheckConfig::new("http://localhost:8080/health"));
        assert_eq!(health.process_policy(), PollPolicy::default());
    }

    #[test]
    fn durations_are_humantime() {
        let health: HealthcheckConfig = serde_yaml::from_str(
            "url: http://h/\nprocess_interval: 500ms\nprocess_timeout: 30s\nlog_lines: 10\n",
        )
        .unwrap();
        assert_eq!(health.process_interval, Duration::from_millis(500));
        assert_eq!(health.process_timeout, Duration::from_secs(30));
        assert_eq!(health.log_lines, 10);
    }
}
