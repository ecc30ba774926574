// ABOUTME: Test support utilities.
// ABOUTME: In-memory fakes for the remote host, local repository and HTTP probe.

use async_trait::async_trait;
use parking_lot::Mutex;
use shipline::config::{DeployConfig, HealthcheckConfig, ServerConfig};
use shipline::deploy::{HttpProbe, ProbeError};
use shipline::ssh::{self, CommandOutput, RemoteCommand, RemoteExec};
use shipline::types::CommitId;
use shipline::vcs::{Vcs, VcsError};
use std::collections::VecDeque;
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("shipline=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[allow(dead_code)]
pub fn fail(exit_code: u32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// A remote host that answers commands from scripted responses.
///
/// Responses are matched by prefix of the rendered command (program and
/// arguments, without the working directory). Each prefix holds a queue; the
/// last entry repeats once the others are used up. Unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct FakeRemote {
    responses: Mutex<Vec<(String, VecDeque<CommandOutput>)>>,
    commands: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, output: CommandOutput) -> &Self {
        let mut responses = self.responses.lock();
        match responses.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(output),
            None => responses.push((prefix.to_string(), VecDeque::from([output]))),
        }
        self
    }

    /// Every command run so far, rendered without the working directory.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands.lock().iter().any(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl RemoteExec for FakeRemote {
    async fn run(&self, command: &RemoteCommand) -> ssh::Result<CommandOutput> {
        let rendered = command.to_string();
        self.commands.lock().push(rendered.clone());

        let mut responses = self.responses.lock();
        let matched = responses
            .iter_mut()
            .filter(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        Ok(match matched {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| ok("")),
            Some((_, queue)) => queue.front().cloned().unwrap_or_else(|| ok("")),
            None => ok(""),
        })
    }

    fn target(&self) -> String {
        "deploy@fake-host:22".to_string()
    }
}

/// A local repository with a fixed head.
pub struct FakeVcs {
    head: String,
    push_error: Option<String>,
    pushes: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl FakeVcs {
    pub fn at(head: &str) -> Self {
        Self {
            head: head.to_string(),
            push_error: None,
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_push(head: &str, stderr: &str) -> Self {
        Self {
            push_error: Some(stderr.to_string()),
            ..Self::at(head)
        }
    }

    pub fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn head_commit(&self) -> Result<CommitId, VcsError> {
        CommitId::new(&self.head).map_err(|e| VcsError::InvalidRevision(e.to_string()))
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.pushes
            .lock()
            .push((remote.to_string(), branch.to_string()));
        match &self.push_error {
            Some(stderr) => Err(VcsError::CommandFailed {
                args: format!("push {remote} {branch}"),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// An endpoint that always answers with the same status, or refuses.
pub struct FakeProbe {
    status: Option<u16>,
    calls: Mutex<u32>,
}

#[allow(dead_code)]
impl FakeProbe {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            calls: Mutex::new(0),
        }
    }

    pub fn refused() -> Self {
        Self {
            status: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl HttpProbe for FakeProbe {
    async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, ProbeError> {
        *self.calls.lock() += 1;
        match self.status {
            Some(status) => Ok(status),
            None => Err(ProbeError::Connect {
                authority: url.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Deploy settings with short timeouts for tests.
#[allow(dead_code)]
pub fn deploy_config() -> DeployConfig {
    let mut health = HealthcheckConfig::new("http://127.0.0.1:8080/health");
    health.process_interval = Duration::from_millis(10);
    health.process_timeout = Duration::from_millis(100);
    health.probe_timeout = Duration::from_millis(200);
    health.log_lines = 3;

    DeployConfig {
        server: ServerConfig::parse("deploy@fake-host").unwrap(),
        remote_dir: "/srv/app".into(),
        git_remote: "origin".to_string(),
        branch: "main".to_string(),
        push_timeout: Duration::from_secs(5),
        restart: vec![
            "docker".to_string(),
            "compose".to_string(),
            "up".to_string(),
            "-d".to_string(),
        ],
        container: "web".to_string(),
        health,
    }
}
