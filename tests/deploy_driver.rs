// ABOUTME: Integration tests for the deployment driver's gates.
// ABOUTME: Runs rollouts against in-memory remote, repository and probe fakes.

mod support;

use shipline::deploy::{
    CHECK_HTTP, CHECK_PROCESS, CHECK_REVISION, DeployError, DeployStage, DeploymentDriver,
    deploy_plan,
};
use shipline::error::ErrorClass;
use support::{FakeProbe, FakeRemote, FakeVcs, deploy_config, fail, ok};

const RESTART: &str = "docker compose up -d";
const STATUS: &str = "docker inspect";
const LOGS: &str = "docker logs";

fn healthy_remote(commit: &str) -> FakeRemote {
    let remote = FakeRemote::new();
    remote.respond("git rev-parse HEAD", ok(&format!("{commit}\n")));
    remote.respond(STATUS, ok("running\n"));
    remote
}

/// Test: a matching revision, running container and 200 probe end Healthy.
#[tokio::test]
async fn healthy_rollout_passes_every_check() {
    support::init_tracing();
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    driver.run().await.unwrap();

    let (state, report) = driver.into_parts();
    assert_eq!(state.stage(), DeployStage::Healthy);
    assert_eq!(state.http_status, Some(200));
    assert!(report.passed());
    let names: Vec<_> = report.checks().iter().map(|c| c.name).collect();
    assert_eq!(names, vec![CHECK_REVISION, CHECK_PROCESS, CHECK_HTTP]);

    assert_eq!(vcs.pushes(), vec![("origin".to_string(), "main".to_string())]);
    let commands = remote.commands();
    let pull = commands.iter().position(|c| c.starts_with("git pull --ff-only")).unwrap();
    let restart = commands.iter().position(|c| c.starts_with(RESTART)).unwrap();
    assert!(pull < restart, "sync must happen before restart");
}

/// Test: local abc123, remote def456 after sync fails before restart.
#[tokio::test]
async fn revision_mismatch_never_restarts() {
    let config = deploy_config();
    let remote = healthy_remote("def456");
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    match &err {
        DeployError::RevisionMismatch { local, remote } => {
            assert_eq!(local.as_str(), "abc123");
            assert_eq!(remote.as_str(), "def456");
        }
        other => panic!("expected RevisionMismatch, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorClass::Consistency);

    assert_eq!(driver.state().stage(), DeployStage::Failed);
    assert_eq!(driver.state().failed_at(), Some(DeployStage::Syncing));
    assert!(!remote.ran(RESTART), "restart must never run on mismatch");
    assert!(!remote.ran(STATUS));
    assert_eq!(probe.calls(), 0);

    let report = driver.report();
    assert!(!report.passed());
    assert!(!report.checks()[0].passed);
}

/// Test: the comparison is byte-for-byte, so a prefix is not a match.
#[tokio::test]
async fn abbreviated_remote_revision_is_a_mismatch() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    let vcs = FakeVcs::at("abc1234");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();
    assert!(matches!(err, DeployError::RevisionMismatch { .. }));
    assert!(!remote.ran(RESTART));
}

/// Test: a rejected push stops the rollout before the remote is touched.
#[tokio::test]
async fn failed_push_is_a_sync_failure() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    let vcs = FakeVcs::failing_push("abc123", "rejected (non-fast-forward)");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, DeployError::SyncFailed(ref msg) if msg.contains("non-fast-forward")));
    assert!(remote.commands().is_empty());
    assert_eq!(driver.state().failed_at(), Some(DeployStage::Syncing));
}

/// Test: a failing remote pull is reported with its stderr.
#[tokio::test]
async fn failed_remote_pull_is_a_sync_failure() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    remote.respond("git pull", fail(1, "fatal: Not possible to fast-forward"));
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, DeployError::SyncFailed(ref msg) if msg.contains("fast-forward")));
    assert!(!remote.ran("git rev-parse"));
}

/// Test: a non-zero restart exit fails without polling the process.
#[tokio::test]
async fn failed_restart_stops_before_polling() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    remote.respond(RESTART, fail(2, "no such service"));
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(200);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    match err {
        DeployError::RestartFailed { exit_code, stderr } => {
            assert_eq!(exit_code, 2);
            assert_eq!(stderr, "no such service");
        }
        other => panic!("expected RestartFailed, got {other:?}"),
    }
    assert_eq!(driver.state().failed_at(), Some(DeployStage::Restarting));
    assert!(!remote.ran(STATUS));
}

/// Test: a container that never reports running times out with its last status.
#[tokio::test]
async fn process_never_running_times_out() {
    let config = deploy_config();
    let remote = FakeRemote::new();
    remote.respond("git rev-parse HEAD", ok("abc123\n"));
    remote.respond(STATUS, ok("restarting\n"));
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(200);

    let started = std::time::Instant::now();
    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    match &err {
        DeployError::ProcessStartTimeout {
            container,
            last_status,
            ..
        } => {
            assert_eq!(container, "web");
            assert_eq!(last_status.as_deref(), Some("restarting"));
        }
        other => panic!("expected ProcessStartTimeout, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorClass::Liveness);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert!(remote.count(STATUS) >= 2, "status should be polled repeatedly");
    assert_eq!(probe.calls(), 0);
}

/// Test: the status poll tolerates a container that is briefly missing.
#[tokio::test]
async fn process_poll_waits_for_running() {
    let config = deploy_config();
    let remote = FakeRemote::new();
    remote.respond("git rev-parse HEAD", ok("abc123\n"));
    remote
        .respond(STATUS, fail(1, "No such object: web"))
        .respond(STATUS, ok("created\n"))
        .respond(STATUS, ok("running\n"));
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(204);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    driver.run().await.unwrap();

    assert_eq!(driver.state().stage(), DeployStage::Healthy);
    assert_eq!(remote.count(STATUS), 3);
}

/// Test: a 503 probe fails with the last remote log lines attached.
#[tokio::test]
async fn unhealthy_probe_surfaces_recent_logs() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    remote.respond(LOGS, ok("line 1\nline 2\nline 3\nline 4\nline 5\n"));
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::status(503);

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    match &err {
        DeployError::HealthProbe { status, logs, .. } => {
            assert_eq!(*status, Some(503));
            assert_eq!(logs, &vec!["line 3", "line 4", "line 5"]);
        }
        other => panic!("expected HealthProbe, got {other:?}"),
    }

    let (state, report) = driver.into_parts();
    assert_eq!(state.stage(), DeployStage::Failed);
    assert_eq!(state.failed_at(), Some(DeployStage::HealthChecking));
    assert!(!report.passed());
    assert_eq!(report.logs(), &["line 3", "line 4", "line 5"]);
    let http = report.checks().iter().find(|c| c.name == CHECK_HTTP).unwrap();
    assert!(!http.passed);
    assert!(http.detail.contains("503"));
}

/// Test: a refused connection is a probe failure, not a hang or panic.
#[tokio::test]
async fn refused_probe_is_a_health_failure() {
    let config = deploy_config();
    let remote = healthy_remote("abc123");
    let vcs = FakeVcs::at("abc123");
    let probe = FakeProbe::refused();

    let mut driver = DeploymentDriver::new(&config, &remote, &vcs, &probe);
    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, DeployError::HealthProbe { status: None, .. }));
    assert!(remote.ran(LOGS));
    assert_ne!(driver.state().stage(), DeployStage::Healthy);
}

#[test]
fn plan_lists_remote_steps_in_order() {
    let steps = deploy_plan(&deploy_config());
    assert_eq!(steps.first().map(String::as_str), Some("git push origin main"));
    assert!(steps[1].starts_with("git pull --ff-only origin main"));
    assert!(steps[2].starts_with("git rev-parse HEAD"));
    assert!(steps[3].starts_with(RESTART));
    assert!(steps[4].starts_with(STATUS));
    assert_eq!(
        steps.last().map(String::as_str),
        Some("GET http://127.0.0.1:8080/health")
    );
    assert!(steps[1].ends_with("(on deploy@fake-host:22)"));
}
