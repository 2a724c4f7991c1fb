//! External deploy-script adapter
//!
//! One deployment topology reconfigures the autoscaler by running an
//! external program with positional arguments: account identifier, region,
//! target size. The harness only depends on its exit status; stdout and
//! stderr stream straight through to the operator.

use async_trait::async_trait;
use scalecheck_core::clients::Deployer;
use scalecheck_core::error::DeployError;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Deployer that runs a script synchronously
#[derive(Debug, Clone)]
pub struct ScriptDeployer {
    script: PathBuf,
}

impl ScriptDeployer {
    /// Deployer running the given script
    #[inline]
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl Deployer for ScriptDeployer {
    async fn deploy(
        &self,
        project: &str,
        region: &str,
        target_size: u32,
    ) -> Result<(), DeployError> {
        tracing::info!(
            "running deploy script {} {project} {region} {target_size}",
            self.script.display()
        );
        let status = Command::new(&self.script)
            .arg(project)
            .arg(region)
            .arg(target_size.to_string())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| DeployError::Launch {
                script: self.script.clone(),
                source,
            })?;

        if !status.success() {
            return Err(DeployError::Failed {
                script: self.script.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
