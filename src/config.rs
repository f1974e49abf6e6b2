//! Engine configuration.
//!
//! Values come from `rag-reconcile.yaml` (or `--config PATH`), then CLI flags
//! and their environment fallbacks override them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineResult, ErrorKind};
use crate::retry::RetryPolicy;

/// File picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "rag-reconcile.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub project_prefix: String,
    pub environment: String,
    pub region: String,
    pub log_dir: PathBuf,
    /// Environment substrings that require `--allow-protected`
    pub protected_environments: Vec<String>,
    pub concurrency: ConcurrencyConfig,
    pub iac: IacConfig,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_prefix: "enterprise-rag".to_string(),
            environment: "dev".to_string(),
            region: "us-east-1".to_string(),
            log_dir: PathBuf::from("logs"),
            protected_environments: vec!["prod".to_string(), "prd".to_string(), "live".to_string()],
            concurrency: ConcurrencyConfig::default(),
            iac: IacConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Resource types listed at the same time
    pub discovery: usize,
    /// Deletions running at the same time within one dependency level
    pub teardown: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            discovery: 8,
            teardown: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IacConfig {
    /// `terraform` or `tofu`
    pub binary: String,
    pub working_dir: PathBuf,
}

impl Default for IacConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            working_dir: PathBuf::from("infrastructure/terraform"),
        }
    }
}

/// Serialized form of a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// When set the interval doubles up to this cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_secs: Option<u64>,
}

impl PolicyConfig {
    const fn fixed(max_attempts: u32, interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            max_attempts,
            interval_secs,
            timeout_secs,
            max_interval_secs: None,
        }
    }

    pub fn to_policy(&self) -> RetryPolicy {
        let interval = Duration::from_secs(self.interval_secs);
        let timeout = Duration::from_secs(self.timeout_secs);
        match self.max_interval_secs {
            Some(max) => RetryPolicy::exponential(
                self.max_attempts,
                interval,
                Duration::from_secs(max),
                timeout,
            ),
            None => RetryPolicy::fixed(self.max_attempts, interval, timeout),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Per-call retry of throttling and other transient API errors
    pub api: PolicyConfig,
    /// Waiting for a disabled distribution to reach `Deployed`
    pub cloudfront: PolicyConfig,
    /// Waiting for Lambda-managed network interfaces to be released
    pub eni: PolicyConfig,
    pub nat_gateway: PolicyConfig,
    /// Collection and knowledge base deletion
    pub opensearch: PolicyConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            api: PolicyConfig {
                max_attempts: 5,
                interval_secs: 1,
                timeout_secs: 60,
                max_interval_secs: Some(16),
            },
            cloudfront: PolicyConfig::fixed(60, 30, 1800),
            eni: PolicyConfig::fixed(10, 30, 600),
            nat_gateway: PolicyConfig::fixed(40, 15, 600),
            opensearch: PolicyConfig::fixed(30, 10, 300),
        }
    }
}

/// Values supplied on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_prefix: Option<String>,
    pub environment: Option<String>,
    pub region: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub iac_binary: Option<String>,
    pub iac_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Load from an explicit path, else from `./rag-reconcile.yaml` when it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ErrorKind::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| ErrorKind::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)
            .map_err(|e| ErrorKind::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(prefix) = overrides.project_prefix {
            self.project_prefix = prefix;
        }
        if let Some(env) = overrides.environment {
            self.environment = env;
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(log_dir) = overrides.log_dir {
            self.log_dir = log_dir;
        }
        if let Some(binary) = overrides.iac_binary {
            self.iac.binary = binary;
        }
        if let Some(dir) = overrides.iac_dir {
            self.iac.working_dir = dir;
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.concurrency.discovery == 0 || self.concurrency.teardown == 0 {
            return Err(ErrorKind::Config(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        let policies = [
            ("api", &self.retry.api),
            ("cloudfront", &self.retry.cloudfront),
            ("eni", &self.retry.eni),
            ("nat_gateway", &self.retry.nat_gateway),
            ("opensearch", &self.retry.opensearch),
        ];
        for (name, policy) in policies {
            if policy.max_attempts == 0 {
                return Err(ErrorKind::Config(format!(
                    "retry.{}.max_attempts must be at least 1",
                    name
                )));
            }
        }
        if self.region.trim().is_empty() {
            return Err(ErrorKind::Config("region must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml(
            r#"
project_prefix: proj
retry:
  eni:
    max_attempts: 3
    interval_secs: 5
    timeout_secs: 60
"#,
        )
        .unwrap();

        assert_eq!(config.project_prefix, "proj");
        assert_eq!(config.environment, "dev");
        assert_eq!(config.retry.eni.max_attempts, 3);
        assert_eq!(config.retry.cloudfront, RetryConfig::default().cloudfront);
        assert_eq!(config.iac.binary, "terraform");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = EngineConfig::default();
        config.apply_overrides(ConfigOverrides {
            environment: Some("staging".into()),
            iac_binary: Some("tofu".into()),
            ..Default::default()
        });
        assert_eq!(config.environment, "staging");
        assert_eq!(config.iac.binary, "tofu");
        assert_eq!(config.project_prefix, "enterprise-rag");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = EngineConfig::from_yaml("concurrency:\n  discovery: 0\n").unwrap_err();
        assert!(matches!(err, ErrorKind::Config(_)));
    }

    #[test]
    fn test_api_policy_is_exponential() {
        let policy = RetryConfig::default().api.to_policy();
        let delays: Vec<Duration> = policy.delays().collect();
        assert_eq!(delays[2], Duration::from_secs(4));
        assert_eq!(delays.len(), 4);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ErrorKind::Config(_)));
    }
}
