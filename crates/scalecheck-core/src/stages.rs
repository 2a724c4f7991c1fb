//! Staged scenario execution
//!
//! A scenario runs as four named stages in fixed order: setup, apply,
//! validate, teardown. Each stage is independently skippable, either
//! through a durable completion marker written by a prior invocation of
//! the same scenario run or through a `SKIP_<stage>` environment variable.
//! Stage functions may run as logically separate processes (separate CI
//! steps), so skip markers and inter-stage state live on disk under a
//! workspace directory rather than in memory.

use crate::error::{HarnessError, StateError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Named unit of a scenario's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Capture provisioning options and prepare the provisioning tool
    Setup,
    /// Apply the declared infrastructure
    Apply,
    /// Drive and verify the convergence sequence
    Validate,
    /// Destroy the provisioned infrastructure
    Teardown,
}

impl Stage {
    /// Declared execution order
    pub const ORDER: [Stage; 4] = [Stage::Setup, Stage::Apply, Stage::Validate, Stage::Teardown];

    /// Stable lowercase name, used for markers and skip variables
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Apply => "apply",
            Stage::Validate => "validate",
            Stage::Teardown => "teardown",
        }
    }

    fn skip_var(self) -> String {
        format!("SKIP_{}", self.as_str())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage body ran to completion and its marker was written
    Completed,
    /// The stage was skipped; its body never ran
    Skipped,
}

/// Durable key-value store scoped to one scenario workspace
///
/// Holds stage completion markers and JSON-encoded inter-stage state.
/// Written by at most one stage at a time (single logical thread per
/// scenario run); concurrent runs must use distinct workspace roots.
#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    /// Workspace directory used when the caller does not pick one
    pub const DEFAULT_DIR: &'static str = ".scalecheck";

    /// Store rooted at the given workspace directory
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root this store writes under
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a named state value for later stages
    ///
    /// # Errors
    /// `StateError::Io` when the workspace cannot be written.
    pub fn save_state<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StateError> {
        let path = self.state_path(key);
        std::fs::create_dir_all(&self.root).map_err(|source| StateError::Io {
            path: self.root.clone(),
            source,
        })?;
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StateError::Malformed {
            key: key.to_string(),
            source,
        })?;
        std::fs::write(&path, bytes).map_err(|source| StateError::Io { path, source })
    }

    /// Load a state value saved by an earlier stage
    ///
    /// # Errors
    /// `StateError::Missing` when nothing was saved under `key`;
    /// `StateError::Malformed` when the stored bytes cannot be decoded.
    pub fn load_state<T: DeserializeOwned>(&self, key: &str) -> Result<T, StateError> {
        let path = self.state_path(key);
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StateError::Missing {
                    key: key.to_string(),
                }
            } else {
                StateError::Io { path, source }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StateError::Malformed {
            key: key.to_string(),
            source,
        })
    }

    /// Record that a stage completed
    pub(crate) fn mark_complete(&self, stage: Stage) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StateError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.marker_path(stage);
        std::fs::write(&path, b"").map_err(|source| StateError::Io { path, source })
    }

    /// Whether a completion marker exists for the stage
    #[must_use]
    pub fn is_complete(&self, stage: Stage) -> bool {
        self.marker_path(stage).exists()
    }

    /// Delete all markers and state for this scenario run
    ///
    /// # Errors
    /// `StateError::Io` when the workspace exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StateError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io {
                path: self.root.clone(),
                source,
            }),
        }
    }

    fn state_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn marker_path(&self, stage: Stage) -> PathBuf {
        self.root.join(format!("{stage}.complete"))
    }
}

/// Sequences stage bodies with skip markers
#[derive(Debug)]
pub struct StageRunner {
    store: StageStore,
}

impl StageRunner {
    /// Runner backed by the given store
    #[inline]
    #[must_use]
    pub fn new(store: StageStore) -> Self {
        Self { store }
    }

    /// The store this runner persists markers and state through
    #[inline]
    #[must_use]
    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Run one stage body, unless it is marked done or skipped by env
    ///
    /// On success the completion marker is written so a rerun of the same
    /// scenario skips the stage. On failure the marker is NOT written and
    /// the error propagates, so a rerun re-attempts the stage.
    ///
    /// # Errors
    /// Whatever the stage body returns, plus `StateError` when the
    /// completion marker cannot be written.
    pub async fn run_stage<F, Fut>(&self, stage: Stage, body: F) -> Result<StageOutcome, HarnessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), HarnessError>>,
    {
        if std::env::var_os(stage.skip_var()).is_some() {
            tracing::info!("stage {stage} skipped ({} is set)", stage.skip_var());
            return Ok(StageOutcome::Skipped);
        }
        if self.store.is_complete(stage) {
            tracing::info!("stage {stage} skipped (already completed)");
            return Ok(StageOutcome::Skipped);
        }

        tracing::info!("stage {stage} starting");
        body().await?;
        self.store.mark_complete(stage)?;
        tracing::info!("stage {stage} completed");
        Ok(StageOutcome::Completed)
    }
}
