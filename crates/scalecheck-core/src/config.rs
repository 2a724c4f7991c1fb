//! Process-level configuration
//!
//! Environment-supplied identifiers are read once at entry into an
//! immutable [`HarnessConfig`] and passed by reference to every component
//! that needs them. None of the core operations look at the environment
//! themselves.

use crate::error::ConfigError;

/// Environment variable naming the cloud project
pub const ENV_PROJECT_ID: &str = "PROJECT_ID";

/// Environment variable naming the deployment region
pub const ENV_REGION: &str = "REGION";

/// Region used when the environment does not supply one
pub const DEFAULT_REGION: &str = "us-central1";

/// Immutable process-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Cloud project the deployment lives in
    pub project_id: String,
    /// Deployment region, when the topology requires one
    pub region: Option<String>,
}

impl HarnessConfig {
    /// Build the configuration from the process environment
    ///
    /// # Errors
    /// `ConfigError::MissingEnv` when `PROJECT_ID` is unset or empty;
    /// this is fatal before any stage runs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: require_env(ENV_PROJECT_ID)?,
            region: optional_env(ENV_REGION),
        })
    }

    /// Build a configuration directly, mainly for tests and embedding
    #[inline]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: None,
        }
    }

    /// With an explicit region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Region, falling back to [`DEFAULT_REGION`]
    #[inline]
    #[must_use]
    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Region, required to be present
    ///
    /// # Errors
    /// `ConfigError::MissingEnv` when no region was supplied.
    pub fn require_region(&self) -> Result<&str, ConfigError> {
        self.region
            .as_deref()
            .ok_or(ConfigError::MissingEnv(ENV_REGION))
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the PROJECT_ID/REGION mutations cannot race another
    // test thread in this binary.
    #[test]
    fn from_env_requires_project_id() {
        std::env::remove_var(ENV_PROJECT_ID);
        std::env::remove_var(ENV_REGION);
        let err = HarnessConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == ENV_PROJECT_ID));

        std::env::set_var(ENV_PROJECT_ID, "my-project");
        let config = HarnessConfig::from_env().unwrap();
        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.region, None);
        assert_eq!(config.region_or_default(), DEFAULT_REGION);
        assert!(config.require_region().is_err());

        std::env::set_var(ENV_REGION, "europe-west1");
        let config = HarnessConfig::from_env().unwrap();
        assert_eq!(config.require_region().unwrap(), "europe-west1");

        std::env::remove_var(ENV_PROJECT_ID);
        std::env::remove_var(ENV_REGION);
    }

    #[test]
    fn builder_sets_region() {
        let config = HarnessConfig::new("p").with_region("r");
        assert_eq!(config.region_or_default(), "r");
    }
}
