//! Terraform CLI adapter for the provisioning capability
//!
//! Shells out to the `terraform` binary with `-chdir` pointing at the
//! provisioning directory. Apply is followed by a `plan -detailed-exitcode`
//! re-plan; exit code 2 there means the declaration is not idempotent.

use async_trait::async_trait;
use scalecheck_core::clients::Provisioner;
use scalecheck_core::error::ProvisionError;
use scalecheck_core::types::ProvisionOptions;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;

/// Provisioner backed by the terraform binary
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: PathBuf,
}

impl TerraformCli {
    /// Adapter using `terraform` from `PATH`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("terraform"),
        }
    }

    /// Adapter using an explicit terraform binary
    #[inline]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(opts: &ProvisionOptions, subcommand: &str, extra: &[&str], with_vars: bool) -> Vec<String> {
        let mut args = vec![format!("-chdir={}", opts.dir.display()), subcommand.to_string()];
        args.extend(extra.iter().map(ToString::to_string));
        if opts.no_color {
            args.push("-no-color".to_string());
        }
        if with_vars {
            for (key, value) in &opts.vars {
                args.push("-var".to_string());
                args.push(format!("{key}={value}"));
            }
        }
        args
    }

    async fn spawn(&self, args: &[String]) -> Result<(String, Output), ProvisionError> {
        let command = format!("terraform {}", args.join(" "));
        tracing::debug!("running {command}");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ProvisionError::Launch {
                command: command.clone(),
                source,
            })?;
        Ok((command, output))
    }

    async fn run(&self, args: &[String]) -> Result<Output, ProvisionError> {
        let (command, output) = self.spawn(args).await?;
        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provisioner for TerraformCli {
    async fn init(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.run(&Self::args(opts, "init", &["-input=false"], false))
            .await
            .map(drop)
    }

    async fn apply_idempotent(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.run(&Self::args(
            opts,
            "apply",
            &["-input=false", "-auto-approve"],
            true,
        ))
        .await?;

        // A clean re-plan proves the apply converged.
        let plan_args = Self::args(opts, "plan", &["-input=false", "-detailed-exitcode"], true);
        let (command, output) = self.spawn(&plan_args).await?;
        match output.status.code() {
            Some(0) => Ok(()),
            Some(2) => Err(ProvisionError::NotIdempotent {
                dir: opts.dir.clone(),
            }),
            _ => Err(ProvisionError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn destroy(&self, opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.run(&Self::args(
            opts,
            "destroy",
            &["-input=false", "-auto-approve"],
            true,
        ))
        .await
        .map(drop)
    }

    async fn output(&self, opts: &ProvisionOptions, key: &str) -> Result<String, ProvisionError> {
        let mut args = vec![
            format!("-chdir={}", opts.dir.display()),
            "output".to_string(),
            "-raw".to_string(),
            key.to_string(),
        ];
        if opts.no_color {
            args.insert(2, "-no-color".to_string());
        }
        let output = self.run(&args).await?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Err(ProvisionError::MissingOutput {
                key: key.to_string(),
            });
        }
        Ok(value)
    }
}
