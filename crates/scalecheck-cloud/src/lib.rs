//! Process-backed adapters for the scalecheck collaborators
//!
//! The core consumes its external systems through narrow traits; this
//! crate implements them by shelling out to the vendor tooling:
//! - [`TerraformCli`] provisions through the terraform binary
//! - [`GcloudProbe`] reads the cluster's shard count
//! - [`GcloudSchedulerJobs`] reads and partially updates the scheduled job
//! - [`ScriptDeployer`] runs the external deploy program
//!
//! The `scalecheck` binary in this crate wires these adapters into the
//! end-to-end scenarios.

#![warn(unreachable_pub)]

pub mod deploy;
pub mod gcloud;
pub mod terraform;

pub use deploy::ScriptDeployer;
pub use gcloud::{GcloudProbe, GcloudSchedulerJobs};
pub use terraform::TerraformCli;
