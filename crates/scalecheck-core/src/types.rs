//! Core types for the convergence harness
//!
//! Defines the fundamental types used across the harness:
//! - Resource and job identifiers
//! - Retry policies for convergence polling
//! - Provisioning options persisted between stages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Fully-qualified identifier of one clustered resource instance
///
/// Opaque once constructed; used as the key for every probe call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build a cluster identifier from its project/region/name segments
    #[inline]
    #[must_use]
    pub fn cluster(project: &str, region: &str, name: &str) -> Self {
        Self(format!(
            "projects/{project}/locations/{region}/clusters/{name}"
        ))
    }

    /// Wrap an already-formatted identifier
    #[inline]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identifier as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the remote job carrying the autoscaler configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Wrap an already-formatted job identifier
    #[inline]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identifier as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Retry budget for one convergence poll
///
/// Both fields are fixed for the lifetime of one poll call; there is no
/// backoff growth. Exhausting the attempts is the only timeout signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum probe calls before giving up; at least one by construction
    pub max_attempts: NonZeroU32,
    /// Fixed delay between consecutive attempts
    pub interval: Duration,
}

impl RetryPolicy {
    /// Create a policy from an attempt budget and a fixed interval
    #[inline]
    #[must_use]
    pub fn new(max_attempts: NonZeroU32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// The budget used by the end-to-end scenarios: 30 attempts, 30s apart
    #[inline]
    #[must_use]
    pub fn e2e_default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(30).expect("literal is non-zero"),
            interval: Duration::from_secs(30),
        }
    }

    /// Upper bound on the wall-clock time one poll can take
    #[inline]
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.get()
    }
}

/// Inputs handed to the provisioning collaborator
///
/// Saved by the setup stage and reloaded by apply, validate and teardown,
/// possibly in separate processes of the same scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Directory holding the infrastructure declaration
    pub dir: PathBuf,
    /// Variables passed through to the provisioning tool
    pub vars: BTreeMap<String, String>,
    /// Disable colored tool output
    pub no_color: bool,
}

impl ProvisionOptions {
    /// Options rooted at the given provisioning directory
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: BTreeMap::new(),
            no_color: true,
        }
    }

    /// Add one provisioning variable
    #[inline]
    #[must_use]
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}
