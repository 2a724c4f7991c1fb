//! Testing utilities for the scalecheck workspace
//!
//! Shared fakes for the harness collaborators, plus payload fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scalecheck_core::clients::{Deployer, JobConfigClient, Provisioner, ResourceProbe};
use scalecheck_core::error::{DeployError, JobClientError, ProbeError, ProvisionError};
use scalecheck_core::types::{JobId, ProvisionOptions, ResourceId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Probe that replays a scripted sequence of responses.
///
/// Once the script has one response left, that response repeats on every
/// further call, so a single-element script models a resource stuck at a
/// size. A call counter records how many probes actually happened.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<u32, ProbeError>>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn script(responses: impl IntoIterator<Item = Result<u32, ProbeError>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sizes(sizes: impl IntoIterator<Item = u32>) -> Self {
        Self::script(sizes.into_iter().map(Ok))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceProbe for ScriptedProbe {
    async fn observed_size(&self, _id: &ResourceId) -> Result<u32, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        match script.len() {
            0 => Err(ProbeError::Transport(
                "scripted probe ran out of responses".to_string(),
            )),
            1 => clone_response(&script[0]),
            _ => script.pop_front().expect("length checked above"),
        }
    }
}

fn clone_response(response: &Result<u32, ProbeError>) -> Result<u32, ProbeError> {
    match response {
        Ok(size) => Ok(*size),
        Err(ProbeError::Transport(msg)) => Err(ProbeError::Transport(msg.clone())),
        Err(ProbeError::Malformed(msg)) => Err(ProbeError::Malformed(msg.clone())),
    }
}

/// One recorded partial update against [`InMemoryJobs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub job: JobId,
    pub payload: Vec<u8>,
    pub changed_paths: Vec<String>,
}

/// Job configuration service holding payloads in memory.
#[derive(Default)]
pub struct InMemoryJobs {
    payloads: Mutex<HashMap<JobId, Vec<u8>>>,
    updates: Mutex<Vec<UpdateRecord>>,
    fail_next_update: Mutex<Option<String>>,
}

impl InMemoryJobs {
    pub fn with_job(job: JobId, payload: Vec<u8>) -> Self {
        let jobs = Self::default();
        jobs.payloads.lock().insert(job, payload);
        jobs
    }

    /// Current payload bytes for a job, if it exists.
    pub fn payload(&self, job: &JobId) -> Option<Vec<u8>> {
        self.payloads.lock().get(job).cloned()
    }

    /// Every partial update issued so far, oldest first.
    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.updates.lock().clone()
    }

    /// Make the next update call fail with a transport error.
    pub fn fail_next_update(&self, reason: impl Into<String>) {
        *self.fail_next_update.lock() = Some(reason.into());
    }
}

#[async_trait]
impl JobConfigClient for InMemoryJobs {
    async fn fetch_payload(&self, job: &JobId) -> Result<Vec<u8>, JobClientError> {
        self.payloads
            .lock()
            .get(job)
            .cloned()
            .ok_or_else(|| JobClientError::NotFound(job.to_string()))
    }

    async fn update_payload(
        &self,
        job: &JobId,
        payload: &[u8],
        changed_paths: &[&str],
    ) -> Result<(), JobClientError> {
        if let Some(reason) = self.fail_next_update.lock().take() {
            return Err(JobClientError::Transport(reason));
        }
        self.updates.lock().push(UpdateRecord {
            job: job.clone(),
            payload: payload.to_vec(),
            changed_paths: changed_paths.iter().map(|p| (*p).to_string()).collect(),
        });
        self.payloads.lock().insert(job.clone(), payload.to_vec());
        Ok(())
    }
}

/// Provisioner that records calls instead of shelling out.
#[derive(Default)]
pub struct RecordingProvisioner {
    calls: Mutex<Vec<String>>,
    outputs: Mutex<HashMap<String, String>>,
    fail_op: Mutex<Option<String>>,
}

impl RecordingProvisioner {
    /// Register a value for [`Provisioner::output`] lookups.
    pub fn set_output(&self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.lock().insert(key.into(), value.into());
    }

    /// Make the named operation (`init`, `apply`, `destroy`) fail.
    pub fn fail_on(&self, op: impl Into<String>) {
        *self.fail_op.lock() = Some(op.into());
    }

    /// Operation names in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// How many times the named operation ran.
    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == op).count()
    }

    fn record(&self, op: &str) -> Result<(), ProvisionError> {
        self.calls.lock().push(op.to_string());
        if self.fail_op.lock().as_deref() == Some(op) {
            return Err(ProvisionError::CommandFailed {
                command: format!("fake {op}"),
                status: "exit status: 1".to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn init(&self, _opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.record("init")
    }

    async fn apply_idempotent(&self, _opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.record("apply")
    }

    async fn destroy(&self, _opts: &ProvisionOptions) -> Result<(), ProvisionError> {
        self.record("destroy")
    }

    async fn output(
        &self,
        _opts: &ProvisionOptions,
        key: &str,
    ) -> Result<String, ProvisionError> {
        self.calls.lock().push(format!("output:{key}"));
        self.outputs
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ProvisionError::MissingOutput {
                key: key.to_string(),
            })
    }
}

/// Deployer that records its invocations.
#[derive(Default)]
pub struct RecordingDeployer {
    calls: Mutex<Vec<(String, String, u32)>>,
    fail: Mutex<bool>,
}

impl RecordingDeployer {
    pub fn fail_next(&self) {
        *self.fail.lock() = true;
    }

    pub fn calls(&self) -> Vec<(String, String, u32)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Deployer for RecordingDeployer {
    async fn deploy(
        &self,
        project: &str,
        region: &str,
        target_size: u32,
    ) -> Result<(), DeployError> {
        self.calls
            .lock()
            .push((project.to_string(), region.to_string(), target_size));
        if std::mem::take(&mut *self.fail.lock()) {
            return Err(DeployError::Failed {
                script: "fake-deploy.sh".into(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Payload shaped like the autoscaler's real message body.
pub fn sample_job_payload() -> Vec<u8> {
    br#"[{"projectId":"my-project","regionId":"us-central1","clusterId":"autoscaler-test","units":"SHARDS","minSize":1,"maxSize":10,"scalingMethod":"STEPWISE"}]"#
        .to_vec()
}
