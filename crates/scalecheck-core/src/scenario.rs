//! End-to-end scenario composition
//!
//! One concrete scenario, two deployment topologies:
//! provision the deployment at a starting size, wait for the cluster to
//! converge to it, request a new target size, wait for convergence again,
//! and always tear the deployment down. The topologies differ only in how
//! the reconfiguration step is performed: one patches the scheduled job's
//! embedded configuration, the other runs an external deploy script. Both
//! share the same stage runner and convergence poller.

use crate::clients::{Deployer, JobConfigClient, Provisioner, ResourceProbe};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::patcher::patch_min_size;
use crate::poller::await_convergence;
use crate::stages::{Stage, StageOutcome, StageRunner};
use crate::types::{JobId, ProvisionOptions, ResourceId, RetryPolicy};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

/// Provisioning output naming the scheduled autoscaler job
pub const SCHEDULER_JOB_OUTPUT: &str = "scheduler_job_id";

/// Stage-store key under which provisioning options persist
pub const PROVISION_STATE_KEY: &str = "provision-options";

/// Cluster name used when the caller does not pick one
pub const DEFAULT_CLUSTER_NAME: &str = "autoscaler-test";

const VAR_PROJECT_ID: &str = "project_id";
const VAR_REGION: &str = "region";
const VAR_CLUSTER_NAME: &str = "memorystore_cluster_name";
const VAR_SHARD_COUNT: &str = "memorystore_shard_count";

/// Inputs for one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    /// Directory holding the infrastructure declaration
    pub provision_dir: PathBuf,
    /// Name of the clustered resource under test
    pub cluster_name: String,
    /// Shard count the deployment is provisioned with
    pub starting_size: u32,
    /// Shard count the reconfiguration requests
    pub target_size: u32,
    /// Retry budget applied to each of the two convergence polls
    pub policy: RetryPolicy,
}

impl ScenarioParams {
    /// Scenario defaults: size 1 ramping to 3, 30 attempts 30s apart
    #[inline]
    pub fn new(provision_dir: impl Into<PathBuf>) -> Self {
        Self {
            provision_dir: provision_dir.into(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            starting_size: 1,
            target_size: 3,
            policy: RetryPolicy::e2e_default(),
        }
    }

    /// With a different cluster name
    #[inline]
    #[must_use]
    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// With different starting/target sizes
    #[inline]
    #[must_use]
    pub fn with_sizes(mut self, starting: u32, target: u32) -> Self {
        self.starting_size = starting;
        self.target_size = target;
        self
    }

    /// With a different retry budget
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Attempts each convergence poll needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    /// Probe calls until the starting size was observed
    pub to_starting: u32,
    /// Probe calls until the target size was observed
    pub to_target: u32,
}

/// What happened to each stage of a scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Setup stage outcome
    pub setup: StageOutcome,
    /// Apply stage outcome
    pub apply: StageOutcome,
    /// Validate stage outcome
    pub validate: StageOutcome,
    /// Teardown stage outcome
    pub teardown: StageOutcome,
    /// Poll attempt counts; absent when the validate stage was skipped
    pub polls: Option<PollStats>,
}

#[derive(Clone, Copy)]
enum ReconfigureVia<'a> {
    PatchJob(&'a dyn JobConfigClient),
    Script(&'a dyn Deployer),
}

/// Scenario for the function-triggered topology
///
/// The reconfiguration step resolves the scheduled job identifier from
/// the provisioning output and patches its embedded configuration.
///
/// # Errors
/// The first failing step's error; teardown still runs once provisioning
/// options have been captured by setup.
pub async fn run_scheduled_job_scenario(
    config: &HarnessConfig,
    provisioner: &dyn Provisioner,
    probe: &dyn ResourceProbe,
    jobs: &dyn JobConfigClient,
    runner: &StageRunner,
    params: &ScenarioParams,
) -> Result<ScenarioReport, HarnessError> {
    run_scenario(
        config,
        provisioner,
        probe,
        ReconfigureVia::PatchJob(jobs),
        runner,
        params,
    )
    .await
}

/// Scenario for the cluster-orchestrated topology
///
/// The reconfiguration step runs an external deploy program with the
/// account identifier, region and target size as positional arguments.
/// A region is required for this topology.
///
/// # Errors
/// As [`run_scheduled_job_scenario`], plus a configuration error when no
/// region was supplied.
pub async fn run_script_deploy_scenario(
    config: &HarnessConfig,
    provisioner: &dyn Provisioner,
    probe: &dyn ResourceProbe,
    deployer: &dyn Deployer,
    runner: &StageRunner,
    params: &ScenarioParams,
) -> Result<ScenarioReport, HarnessError> {
    config.require_region()?;
    run_scenario(
        config,
        provisioner,
        probe,
        ReconfigureVia::Script(deployer),
        runner,
        params,
    )
    .await
}

async fn run_scenario(
    config: &HarnessConfig,
    provisioner: &dyn Provisioner,
    probe: &dyn ResourceProbe,
    reconfigure: ReconfigureVia<'_>,
    runner: &StageRunner,
    params: &ScenarioParams,
) -> Result<ScenarioReport, HarnessError> {
    let region = config.region_or_default().to_string();

    let setup_result = runner
        .run_stage(Stage::Setup, || async {
            let opts = ProvisionOptions::new(&params.provision_dir)
                .var(VAR_PROJECT_ID, &config.project_id)
                .var(VAR_REGION, &region)
                .var(VAR_CLUSTER_NAME, &params.cluster_name)
                .var(VAR_SHARD_COUNT, params.starting_size.to_string());
            runner.store().save_state(PROVISION_STATE_KEY, &opts)?;
            provisioner.init(&opts).await?;
            Ok(())
        })
        .await;

    // Teardown is owed from the moment the provisioning options are
    // durably captured, even when the rest of setup fails.
    let setup = match setup_result {
        Ok(outcome) => outcome,
        Err(err) => {
            if runner
                .store()
                .load_state::<ProvisionOptions>(PROVISION_STATE_KEY)
                .is_ok()
            {
                if let Err(td) = run_teardown(runner, provisioner).await {
                    tracing::error!("teardown failed after setup error: {td}");
                }
            }
            return Err(err);
        }
    };

    // From here teardown must run on every exit path, including
    // unwinding out of a stage body.
    let polls = Mutex::new(None::<PollStats>);
    let forward = AssertUnwindSafe(async {
        let apply = runner
            .run_stage(Stage::Apply, || async {
                let opts: ProvisionOptions = runner.store().load_state(PROVISION_STATE_KEY)?;
                provisioner.apply_idempotent(&opts).await?;
                Ok(())
            })
            .await?;

        let validate = runner
            .run_stage(Stage::Validate, || async {
                let opts: ProvisionOptions = runner.store().load_state(PROVISION_STATE_KEY)?;
                let id = ResourceId::cluster(&config.project_id, &region, &params.cluster_name);

                let first =
                    await_convergence(probe, &id, params.starting_size, params.policy).await?;

                match reconfigure {
                    ReconfigureVia::PatchJob(jobs) => {
                        let job = JobId::from_raw(
                            provisioner.output(&opts, SCHEDULER_JOB_OUTPUT).await?,
                        );
                        patch_min_size(jobs, &job, params.target_size).await?;
                    }
                    ReconfigureVia::Script(deployer) => {
                        deployer
                            .deploy(&config.project_id, &region, params.target_size)
                            .await?;
                    }
                }

                let second =
                    await_convergence(probe, &id, params.target_size, params.policy).await?;

                *polls.lock() = Some(PollStats {
                    to_starting: first.attempts,
                    to_target: second.attempts,
                });
                Ok(())
            })
            .await?;

        Ok::<(StageOutcome, StageOutcome), HarnessError>((apply, validate))
    })
    .catch_unwind()
    .await;

    let teardown_result = run_teardown(runner, provisioner).await;

    match forward {
        Err(panic) => {
            if let Err(err) = &teardown_result {
                tracing::error!("teardown failed after panicking stage: {err}");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(scenario_err)) => {
            if let Err(err) = teardown_result {
                tracing::error!("teardown failed after scenario error: {err}");
            }
            Err(scenario_err)
        }
        Ok(Ok((apply, validate))) => Ok(ScenarioReport {
            setup,
            apply,
            validate,
            teardown: teardown_result?,
            polls: polls.into_inner(),
        }),
    }
}

/// Destroy the provisioned infrastructure and, once that completed,
/// delete the scenario workspace: the markers describe infrastructure
/// that no longer exists, so a rerun must start from scratch.
async fn run_teardown(
    runner: &StageRunner,
    provisioner: &dyn Provisioner,
) -> Result<StageOutcome, HarnessError> {
    let outcome = runner
        .run_stage(Stage::Teardown, || async {
            let opts: ProvisionOptions = runner.store().load_state(PROVISION_STATE_KEY)?;
            provisioner.destroy(&opts).await?;
            Ok(())
        })
        .await?;

    if outcome == StageOutcome::Completed {
        runner.store().clear()?;
    }
    Ok(outcome)
}
