//! scalecheck core — convergence harness engine
//!
//! Validates, end to end, that an autoscaling deployment for a clustered
//! data store behaves correctly under a configuration change:
//! - A staged runner sequences setup/apply/validate/teardown with durable
//!   skip markers, inter-stage state and guaranteed teardown
//! - A bounded-retry poller samples the resource's observed size until it
//!   matches a target or the attempt budget runs out
//! - An idempotent patcher rewrites one field of a remote job's embedded
//!   configuration payload without disturbing anything else
//!
//! External systems (the provisioning tool, the resource status and job
//! clients, the deploy script) are consumed through the narrow traits in
//! [`clients`]; process adapters for them live in the companion
//! `scalecheck-cloud` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use scalecheck_core::{
//!     config::HarnessConfig,
//!     scenario::{run_scheduled_job_scenario, ScenarioParams},
//!     stages::{StageRunner, StageStore},
//! };
//!
//! # async fn example(
//! #     provisioner: &dyn scalecheck_core::clients::Provisioner,
//! #     probe: &dyn scalecheck_core::clients::ResourceProbe,
//! #     jobs: &dyn scalecheck_core::clients::JobConfigClient,
//! # ) -> Result<(), scalecheck_core::error::HarnessError> {
//! let config = HarnessConfig::from_env()?;
//! let runner = StageRunner::new(StageStore::new(StageStore::DEFAULT_DIR));
//! let params = ScenarioParams::new("./deploy");
//! let report = run_scheduled_job_scenario(
//!     &config, provisioner, probe, jobs, &runner, &params,
//! ).await?;
//! println!("validate: {:?}", report.validate);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod clients;
pub mod config;
pub mod error;
pub mod patcher;
pub mod poller;
pub mod scenario;
pub mod stages;
pub mod types;

// Re-exports for convenience
pub use clients::{Deployer, JobConfigClient, Provisioner, ResourceProbe};
pub use config::HarnessConfig;
pub use error::{
    ConfigError, ConvergenceError, DeployError, HarnessError, JobClientError, PatchError,
    ProbeError, ProvisionError, StateError,
};
pub use patcher::patch_min_size;
pub use poller::{await_convergence, Convergence};
pub use scenario::{
    run_scheduled_job_scenario, run_script_deploy_scenario, PollStats, ScenarioParams,
    ScenarioReport,
};
pub use stages::{Stage, StageOutcome, StageRunner, StageStore};
pub use types::{JobId, ProvisionOptions, ResourceId, RetryPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
