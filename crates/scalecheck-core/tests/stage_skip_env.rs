//! `SKIP_<stage>` environment overrides.
//!
//! Kept in its own test binary: these tests mutate process-global
//! environment variables that the stage runner reads.

use scalecheck_core::scenario::{run_scheduled_job_scenario, ScenarioParams, SCHEDULER_JOB_OUTPUT};
use scalecheck_core::stages::{Stage, StageOutcome, StageRunner, StageStore};
use scalecheck_core::types::{JobId, RetryPolicy};
use scalecheck_core::HarnessConfig;
use scalecheck_test_utils::{sample_job_payload, InMemoryJobs, RecordingProvisioner, ScriptedProbe};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn skip_variables_pin_stages_off() {
    // Part 1: a SKIP_<stage> variable short-circuits the stage body and
    // writes no marker.
    std::env::set_var("SKIP_validate", "1");
    let dir = tempfile::tempdir().unwrap();
    let runner = StageRunner::new(StageStore::new(dir.path().join(StageStore::DEFAULT_DIR)));
    let runs = AtomicUsize::new(0);

    let outcome = runner
        .run_stage(Stage::Validate, || async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Skipped);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(!runner.store().is_complete(Stage::Validate));
    std::env::remove_var("SKIP_validate");

    // Part 2: SKIP_teardown keeps the deployment and the workspace alive,
    // so a later run can resume against it.
    std::env::set_var("SKIP_teardown", "1");
    let dir = tempfile::tempdir().unwrap();
    let provisioner = RecordingProvisioner::default();
    provisioner.set_output(
        SCHEDULER_JOB_OUTPUT,
        "projects/p/locations/us-central1/jobs/autoscaler",
    );
    let probe = ScriptedProbe::sizes([1, 3]);
    let jobs = InMemoryJobs::with_job(
        JobId::from_raw("projects/p/locations/us-central1/jobs/autoscaler"),
        sample_job_payload(),
    );
    let runner = StageRunner::new(StageStore::new(dir.path().join(StageStore::DEFAULT_DIR)));
    let params = ScenarioParams::new(dir.path().join("deploy"))
        .with_policy(RetryPolicy::new(NonZeroU32::new(5).unwrap(), Duration::ZERO));

    let report = run_scheduled_job_scenario(
        &HarnessConfig::new("p").with_region("us-central1"),
        &provisioner,
        &probe,
        &jobs,
        &runner,
        &params,
    )
    .await
    .unwrap();

    assert_eq!(report.teardown, StageOutcome::Skipped);
    assert_eq!(provisioner.count("destroy"), 0);
    assert!(
        runner.store().is_complete(Stage::Validate),
        "markers must survive a skipped teardown"
    );
    std::env::remove_var("SKIP_teardown");
}
