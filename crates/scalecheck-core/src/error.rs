//! Error types for the convergence harness
//!
//! Provides the failure taxonomy for:
//! - Startup configuration problems
//! - Provisioning-tool failures
//! - Probe and job-client transport failures
//! - Exhausted convergence polls
//! - Configuration patch failures
//! - Stage-state persistence failures

use std::path::PathBuf;

/// Top-level harness error
///
/// Every stage body and scenario step surfaces one of these; nothing is
/// swallowed locally. The only non-error recovery in the harness is the
/// stage runner's skip-if-already-completed logic.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Required configuration missing at startup
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provisioning collaborator failed
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    /// Resource never converged, or the probe broke mid-poll
    #[error("convergence failed: {0}")]
    Convergence(#[from] ConvergenceError),

    /// Patching the remote job configuration failed
    #[error("config patch failed: {0}")]
    Patch(#[from] PatchError),

    /// External deploy script failed
    #[error("deploy failed: {0}")]
    Deploy(#[from] DeployError),

    /// Stage-state persistence failed
    #[error("stage state error: {0}")]
    State(#[from] StateError),
}

/// Startup configuration errors
///
/// Raised before any stage runs; not part of the retry/failure taxonomy
/// of the core operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Provisioning collaborator errors
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The provisioning command could not be started
    #[error("failed to launch {command}: {source}")]
    Launch {
        /// Command line that failed to spawn
        command: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The provisioning command ran and reported failure
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// A re-plan after apply still shows pending changes
    #[error("apply left pending changes in {dir}")]
    NotIdempotent {
        /// Provisioning directory that failed the idempotency check
        dir: PathBuf,
    },

    /// A requested provisioning output was absent or empty
    #[error("provisioning output {key:?} is missing or empty")]
    MissingOutput {
        /// Output key that was requested
        key: String,
    },
}

/// Probe errors
///
/// Any of these aborts an in-flight poll immediately; a broken probe is
/// never retried as if it were a size mismatch.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The status lookup failed at the transport layer
    #[error("probe transport failure: {0}")]
    Transport(String),

    /// The status response could not be interpreted
    #[error("malformed probe response: {0}")]
    Malformed(String),
}

/// Job configuration client errors
#[derive(Debug, thiserror::Error)]
pub enum JobClientError {
    /// The job lookup or update failed at the transport layer
    #[error("job client transport failure: {0}")]
    Transport(String),

    /// No job exists under the given identifier
    #[error("job {0} not found")]
    NotFound(String),

    /// The job definition could not be interpreted
    #[error("malformed job definition: {0}")]
    Malformed(String),

    /// The client cannot express the requested partial update
    #[error("unsupported update path {0:?}")]
    UnsupportedPath(String),
}

/// Convergence poll failures
#[derive(Debug, thiserror::Error)]
pub enum ConvergenceError {
    /// The probe failed; polling stopped without further attempts
    #[error("probe failed for {id}: {source}")]
    Probe {
        /// Resource being polled
        id: String,
        /// Underlying probe error
        #[source]
        source: ProbeError,
    },

    /// The retry budget ran out before the target size was observed
    #[error(
        "{id} did not reach {target} shards after {attempts} attempts \
         (last observed {last_observed})"
    )]
    Exhausted {
        /// Resource being polled
        id: String,
        /// Size the poll was waiting for
        target: u32,
        /// Size seen on the final attempt
        last_observed: u32,
        /// Probe calls made before giving up
        attempts: u32,
    },
}

/// Configuration patch failures
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Fetching the current job definition failed
    #[error("fetching job definition failed: {0}")]
    Fetch(#[source] JobClientError),

    /// The embedded payload is not a JSON array of records
    #[error("malformed job payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The payload parsed but holds no configuration records
    #[error("job payload holds no configuration records")]
    EmptyConfig,

    /// The first configuration record is not a JSON object
    #[error("first configuration record is not an object")]
    NotAnObject,

    /// Writing the patched payload back failed
    #[error("writing patched payload failed: {0}")]
    Write(#[source] JobClientError),
}

/// Deploy-script failures
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The deploy script could not be started
    #[error("failed to launch deploy script {script}: {source}")]
    Launch {
        /// Script path that failed to spawn
        script: PathBuf,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The deploy script ran and exited non-zero
    #[error("deploy script {script} exited with {status}")]
    Failed {
        /// Script path that failed
        script: PathBuf,
        /// Exit status as reported by the OS
        status: String,
    },
}

/// Stage-store persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Reading or writing a store file failed
    #[error("stage store io error at {path}: {source}")]
    Io {
        /// File the operation touched
        path: PathBuf,
        /// Underlying io error
        #[source]
        source: std::io::Error,
    },

    /// A stage asked for state no earlier stage persisted
    #[error("stage state {key:?} has not been saved")]
    Missing {
        /// State key that was requested
        key: String,
    },

    /// Persisted state exists but cannot be decoded
    #[error("stage state {key:?} is malformed: {source}")]
    Malformed {
        /// State key that was requested
        key: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },
}
