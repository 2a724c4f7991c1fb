//! gcloud CLI adapters for the resource probe and the job client
//!
//! The harness never speaks the cloud wire protocols itself; both the
//! cluster status lookup and the scheduler-job read/update go through the
//! vendor CLI with JSON output. Scheduler payload bytes arrive base64
//! encoded in that JSON.

use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use scalecheck_core::clients::{JobConfigClient, ResourceProbe};
use scalecheck_core::error::{JobClientError, ProbeError};
use scalecheck_core::patcher::PAYLOAD_DATA_PATH;
use scalecheck_core::types::{JobId, ResourceId};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

async fn run_gcloud(binary: &Path, args: &[&str]) -> Result<Output, String> {
    tracing::debug!("running gcloud {}", args.join(" "));
    let output = Command::new(binary)
        .args(args)
        .output()
        .await
        .map_err(|source| format!("failed to launch gcloud: {source}"))?;
    Ok(output)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Resource probe backed by `gcloud redis clusters describe`
#[derive(Debug, Clone)]
pub struct GcloudProbe {
    binary: PathBuf,
}

impl GcloudProbe {
    /// Probe using `gcloud` from `PATH`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("gcloud"),
        }
    }

    /// Probe using an explicit gcloud binary
    #[inline]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GcloudProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for GcloudProbe {
    async fn observed_size(&self, id: &ResourceId) -> Result<u32, ProbeError> {
        let output = run_gcloud(
            &self.binary,
            &["redis", "clusters", "describe", id.as_str(), "--format=json"],
        )
        .await
        .map_err(ProbeError::Transport)?;

        if !output.status.success() {
            return Err(ProbeError::Transport(format!(
                "gcloud exited with {}: {}",
                output.status,
                stderr_of(&output)
            )));
        }

        let doc: Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| ProbeError::Malformed(err.to_string()))?;
        let shards = doc
            .get("shardCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ProbeError::Malformed("cluster status has no shardCount".to_string()))?;
        u32::try_from(shards)
            .map_err(|_| ProbeError::Malformed(format!("shard count {shards} out of range")))
    }
}

/// Job client backed by `gcloud scheduler jobs`
///
/// Updates only support the payload-data sub-path: `jobs update pubsub`
/// with `--message-body` rewrites exactly the pubsub payload and leaves
/// the schedule, topic and every other job attribute untouched, which is
/// the partial-update contract the patcher relies on.
#[derive(Debug, Clone)]
pub struct GcloudSchedulerJobs {
    binary: PathBuf,
}

impl GcloudSchedulerJobs {
    /// Client using `gcloud` from `PATH`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("gcloud"),
        }
    }

    /// Client using an explicit gcloud binary
    #[inline]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GcloudSchedulerJobs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobConfigClient for GcloudSchedulerJobs {
    async fn fetch_payload(&self, job: &JobId) -> Result<Vec<u8>, JobClientError> {
        let output = run_gcloud(
            &self.binary,
            &["scheduler", "jobs", "describe", job.as_str(), "--format=json"],
        )
        .await
        .map_err(JobClientError::Transport)?;

        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("NOT_FOUND") {
                return Err(JobClientError::NotFound(job.to_string()));
            }
            return Err(JobClientError::Transport(format!(
                "gcloud exited with {}: {stderr}",
                output.status
            )));
        }

        let doc: Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| JobClientError::Malformed(err.to_string()))?;
        let data = doc
            .pointer("/pubsubTarget/data")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                JobClientError::Malformed("job has no pubsub payload data".to_string())
            })?;
        BASE64_STANDARD
            .decode(data)
            .map_err(|err| JobClientError::Malformed(format!("payload is not base64: {err}")))
    }

    async fn update_payload(
        &self,
        job: &JobId,
        payload: &[u8],
        changed_paths: &[&str],
    ) -> Result<(), JobClientError> {
        if changed_paths != [PAYLOAD_DATA_PATH] {
            return Err(JobClientError::UnsupportedPath(changed_paths.join(",")));
        }
        let body = std::str::from_utf8(payload)
            .map_err(|err| JobClientError::Malformed(format!("payload is not utf-8: {err}")))?;

        let message_body = format!("--message-body={body}");
        let output = run_gcloud(
            &self.binary,
            &[
                "scheduler",
                "jobs",
                "update",
                "pubsub",
                job.as_str(),
                message_body.as_str(),
            ],
        )
        .await
        .map_err(JobClientError::Transport)?;

        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.contains("NOT_FOUND") {
                return Err(JobClientError::NotFound(job.to_string()));
            }
            return Err(JobClientError::Transport(format!(
                "gcloud exited with {}: {stderr}",
                output.status
            )));
        }
        Ok(())
    }
}
