//! Engine-wide tuning, loaded from a layered TOML file plus `FLUX_`-prefixed
//! environment overrides (§10).

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

fn default_max_concurrent_executions() -> usize {
    10
}

fn default_default_max_concurrent_nodes() -> usize {
    10
}

fn default_default_timeout_minutes() -> u32 {
    30
}

fn default_ui_interaction_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_timeout_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

/// Process-wide tuning for an [`EngineFacade`](crate::facade::EngineFacade).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global cap on executions running concurrently across the process.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,
    /// Default per-execution node concurrency, used when a workflow's own
    /// `WorkflowConfig` does not set one.
    #[serde(default = "default_default_max_concurrent_nodes")]
    pub default_max_concurrent_nodes: usize,
    /// Default execution-level timeout, in minutes, when a caller's
    /// `ExecutionContext` does not override it.
    #[serde(default = "default_default_timeout_minutes")]
    pub default_timeout_minutes: u32,
    /// How long a UI interaction stays actionable before it is timed out.
    #[serde(with = "humantime_serde", default = "default_ui_interaction_timeout")]
    pub ui_interaction_timeout: Duration,
    /// How often the background sweep checks for expired UI interactions.
    #[serde(with = "humantime_serde", default = "default_timeout_sweep_interval")]
    pub timeout_sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: default_max_concurrent_executions(),
            default_max_concurrent_nodes: default_default_max_concurrent_nodes(),
            default_timeout_minutes: default_default_timeout_minutes(),
            ui_interaction_timeout: default_ui_interaction_timeout(),
            timeout_sweep_interval: default_timeout_sweep_interval(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path` (if it exists) layered under defaults,
    /// then apply `FLUX_`-prefixed environment overrides.
    ///
    /// `FLUX_MAX_CONCURRENT_EXECUTIONS=20`, for example, overrides
    /// `max_concurrent_executions` regardless of what the TOML file says.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FLUX_"))
            .extract()
    }

    /// Build a config straight from defaults and environment overrides, with
    /// no file layer. Useful for tests and for deployments configured purely
    /// through the environment.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Env::prefixed("FLUX_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.max_concurrent_executions > 0);
        assert!(config.default_max_concurrent_nodes > 0);
        assert!(config.default_timeout_minutes > 0);
        assert!(config.ui_interaction_timeout > Duration::ZERO);
        assert!(config.timeout_sweep_interval > Duration::ZERO);
    }

    #[test]
    fn from_env_overrides_a_default() {
        // SAFETY: test runs single-threaded within this process's test harness,
        // and the var is scoped to this test only.
        unsafe {
            std::env::set_var("FLUX_MAX_CONCURRENT_EXECUTIONS", "42");
        }
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.max_concurrent_executions, 42);
        unsafe {
            std::env::remove_var("FLUX_MAX_CONCURRENT_EXECUTIONS");
        }
    }
}
