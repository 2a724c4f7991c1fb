//! Collaborator capabilities
//!
//! The harness consumes its external systems through these narrow traits:
//! - `Provisioner` for the declarative infrastructure tool
//! - `ResourceProbe` for the clustered resource's observable size
//! - `JobConfigClient` for the job carrying the embedded configuration
//! - `Deployer` for the topology that reconfigures via an external script
//!
//! The core never depends on how a collaborator is implemented, only on
//! its synchronous success/failure contract.

use crate::error::{DeployError, JobClientError, ProbeError, ProvisionError};
use crate::types::{JobId, ProvisionOptions, ResourceId};
use async_trait::async_trait;

/// Declarative infrastructure provisioning
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Prepare the provisioning directory for use
    async fn init(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError>;

    /// Apply the declared infrastructure and verify a re-plan is clean
    async fn apply_idempotent(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError>;

    /// Destroy everything the declaration created
    async fn destroy(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError>;

    /// Read one generated output value, e.g. an identifier minted by apply
    async fn output(&self, opts: &ProvisionOptions, key: &str) -> Result<String, ProvisionError>;
}

/// Fresh read of a resource's current scaling dimension
///
/// Every call fetches live state; implementations must not cache.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Current observed size (shard count) of the resource
    async fn observed_size(&self, id: &ResourceId) -> Result<u32, ProbeError>;
}

/// Read and partially update a remote job's embedded payload
#[async_trait]
pub trait JobConfigClient: Send + Sync {
    /// Fetch the job's current payload bytes
    async fn fetch_payload(&self, job: &JobId) -> Result<Vec<u8>, JobClientError>;

    /// Write payload bytes back, changing only the named sub-paths
    ///
    /// Implementations must leave every job attribute outside
    /// `changed_paths` untouched.
    async fn update_payload(
        &self,
        job: &JobId,
        payload: &[u8],
        changed_paths: &[&str],
    ) -> Result<(), JobClientError>;
}

/// External deployment program taking positional arguments
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy the autoscaler requesting the given target size
    async fn deploy(
        &self,
        project: &str,
        region: &str,
        target_size: u32,
    ) -> Result<(), DeployError>;
}
