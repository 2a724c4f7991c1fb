//! End-to-end scenario runs against scripted collaborators.

use async_trait::async_trait;
use futures::FutureExt;
use scalecheck_core::clients::{Provisioner, ResourceProbe};
use scalecheck_core::config::HarnessConfig;
use scalecheck_core::error::{
    ConfigError, ConvergenceError, HarnessError, ProbeError, ProvisionError,
};
use scalecheck_core::patcher::{MIN_SIZE_FIELD, PAYLOAD_DATA_PATH};
use scalecheck_core::scenario::{
    run_scheduled_job_scenario, run_script_deploy_scenario, ScenarioParams, SCHEDULER_JOB_OUTPUT,
};
use scalecheck_core::stages::{StageOutcome, StageRunner, StageStore};
use scalecheck_core::types::{JobId, ResourceId, RetryPolicy};
use scalecheck_test_utils::{
    sample_job_payload, InMemoryJobs, RecordingDeployer, RecordingProvisioner, ScriptedProbe,
};
use serde_json::Value;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

const JOB_ID: &str = "projects/my-project/locations/us-central1/jobs/autoscaler";

fn config() -> HarnessConfig {
    HarnessConfig::new("my-project").with_region("us-central1")
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(NonZeroU32::new(5).unwrap(), Duration::ZERO)
}

fn runner(dir: &tempfile::TempDir) -> StageRunner {
    StageRunner::new(StageStore::new(dir.path().join(StageStore::DEFAULT_DIR)))
}

fn params(dir: &tempfile::TempDir) -> ScenarioParams {
    ScenarioParams::new(dir.path().join("deploy")).with_policy(fast_policy())
}

fn provisioner_with_job_output() -> RecordingProvisioner {
    let provisioner = RecordingProvisioner::default();
    provisioner.set_output(SCHEDULER_JOB_OUTPUT, JOB_ID);
    provisioner
}

#[tokio::test]
async fn scheduled_job_scenario_converges_through_ramp() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    // First poll sees the starting size right away; after the patch the
    // cluster ramps 1 -> 2 -> 3 across the second poll's attempts.
    let probe = ScriptedProbe::sizes([1, 1, 2, 3]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());
    let runner = runner(&dir);

    let report = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner,
        &params(&dir),
    )
    .await
    .unwrap();

    assert_eq!(report.setup, StageOutcome::Completed);
    assert_eq!(report.apply, StageOutcome::Completed);
    assert_eq!(report.validate, StageOutcome::Completed);
    assert_eq!(report.teardown, StageOutcome::Completed);

    let polls = report.polls.unwrap();
    assert_eq!(polls.to_starting, 1);
    assert_eq!(polls.to_target, 3);
    assert_eq!(probe.calls(), 4);

    // Exactly one partial update, naming only the payload path.
    let updates = jobs.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].changed_paths, vec![PAYLOAD_DATA_PATH.to_string()]);
    let records: Vec<Value> = serde_json::from_slice(&updates[0].payload).unwrap();
    assert_eq!(records[0][MIN_SIZE_FIELD], Value::from(3));

    assert_eq!(provisioner.count("init"), 1);
    assert_eq!(provisioner.count("apply"), 1);
    assert_eq!(provisioner.count("destroy"), 1);

    // Completed teardown removes the scenario workspace.
    assert!(!runner.store().root().exists());
}

#[tokio::test]
async fn script_deploy_scenario_uses_deployer() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = RecordingProvisioner::default();
    let probe = ScriptedProbe::sizes([1, 3]);
    let deployer = RecordingDeployer::default();

    let report = run_script_deploy_scenario(
        &config(),
        &provisioner,
        &probe,
        &deployer,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap();

    assert_eq!(report.validate, StageOutcome::Completed);
    assert_eq!(
        deployer.calls(),
        vec![("my-project".to_string(), "us-central1".to_string(), 3)]
    );
    // This topology never touches the scheduled job output.
    assert!(!provisioner
        .calls()
        .iter()
        .any(|c| c.starts_with("output:")));
}

#[tokio::test]
async fn script_deploy_requires_region() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = RecordingProvisioner::default();
    let probe = ScriptedProbe::sizes([1]);
    let deployer = RecordingDeployer::default();

    let err = run_script_deploy_scenario(
        &HarnessConfig::new("my-project"),
        &provisioner,
        &probe,
        &deployer,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Config(ConfigError::MissingEnv("REGION"))
    ));
    assert!(provisioner.calls().is_empty(), "no stage may run");
}

#[tokio::test]
async fn validate_probe_failure_still_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    let probe = ScriptedProbe::script([Err(ProbeError::Transport(
        "connection reset".to_string(),
    ))]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());

    let err = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Convergence(ConvergenceError::Probe { .. })
    ));
    assert_eq!(probe.calls(), 1, "transport errors are not retried");
    assert_eq!(provisioner.count("destroy"), 1);
    assert!(jobs.updates().is_empty(), "patch must not run after a failed poll");
}

#[tokio::test]
async fn exhausted_poll_still_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    // Converges to the starting size but never reaches the target.
    let probe = ScriptedProbe::sizes([1, 2]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());

    let err = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap_err();

    match err {
        HarnessError::Convergence(ConvergenceError::Exhausted {
            target,
            last_observed,
            attempts,
            ..
        }) => {
            assert_eq!(target, 3);
            assert_eq!(last_observed, 2);
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provisioner.count("destroy"), 1);
}

#[tokio::test]
async fn apply_failure_still_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    provisioner.fail_on("apply");
    let probe = ScriptedProbe::sizes([1]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());

    let err = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Provision(ProvisionError::CommandFailed { .. })
    ));
    assert_eq!(probe.calls(), 0, "validate must not run after a failed apply");
    assert_eq!(provisioner.count("destroy"), 1);
}

#[tokio::test]
async fn init_failure_after_capture_still_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    provisioner.fail_on("init");
    let probe = ScriptedProbe::sizes([1]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());

    let err = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner(&dir),
        &params(&dir),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, HarnessError::Provision(_)));
    // The options were saved before init ran, so teardown is owed.
    assert_eq!(provisioner.count("apply"), 0);
    assert_eq!(provisioner.count("destroy"), 1);
}

#[tokio::test]
async fn capture_failure_runs_no_teardown() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the workspace directory should go makes saving the
    // provisioning options fail before anything is captured.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let provisioner = provisioner_with_job_output();
    let probe = ScriptedProbe::sizes([1]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());
    let runner = StageRunner::new(StageStore::new(blocker.join("workspace")));

    let err = run_scheduled_job_scenario(
        &config(),
        &provisioner,
        &probe,
        &jobs,
        &runner,
        &params(&dir),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, HarnessError::State(_)));
    assert_eq!(provisioner.count("init"), 0);
    assert_eq!(provisioner.count("destroy"), 0);
}

struct PanickingProbe;

#[async_trait]
impl ResourceProbe for PanickingProbe {
    async fn observed_size(&self, _id: &ResourceId) -> Result<u32, ProbeError> {
        panic!("probe blew up")
    }
}

#[tokio::test]
async fn panicking_validate_still_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());
    let runner = runner(&dir);
    let params = params(&dir);
    let config = config();

    let unwound = AssertUnwindSafe(run_scheduled_job_scenario(
        &config,
        &provisioner,
        &PanickingProbe,
        &jobs,
        &runner,
        &params,
    ))
    .catch_unwind()
    .await;

    assert!(unwound.is_err(), "the panic must propagate to the caller");
    assert_eq!(provisioner.count("destroy"), 1);
}

#[tokio::test]
async fn rerun_after_completed_setup_skips_setup() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = provisioner_with_job_output();
    let probe = ScriptedProbe::sizes([1, 3]);
    let jobs = InMemoryJobs::with_job(JobId::from_raw(JOB_ID), sample_job_payload());
    let params = params(&dir);
    let config = config();

    // First invocation: only setup completes, then the process "dies"
    // before apply. Model that by running the setup stage body directly.
    {
        let first = runner(&dir);
        let outcome = first
            .run_stage(scalecheck_core::stages::Stage::Setup, || async {
                first.store().save_state(
                    scalecheck_core::scenario::PROVISION_STATE_KEY,
                    &scalecheck_core::types::ProvisionOptions::new(&params.provision_dir)
                        .var("project_id", "my-project"),
                )?;
                provisioner.init(&scalecheck_core::types::ProvisionOptions::new(
                    &params.provision_dir,
                ))
                .await?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(outcome, StageOutcome::Completed);
    }

    // Second invocation over the same workspace: setup is skipped and the
    // run proceeds on the persisted options.
    let report = run_scheduled_job_scenario(
        &config,
        &provisioner,
        &probe,
        &jobs,
        &runner(&dir),
        &params,
    )
    .await
    .unwrap();

    assert_eq!(report.setup, StageOutcome::Skipped);
    assert_eq!(report.apply, StageOutcome::Completed);
    assert_eq!(report.validate, StageOutcome::Completed);
    assert_eq!(provisioner.count("init"), 1, "setup body must not rerun");
}
