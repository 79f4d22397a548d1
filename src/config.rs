use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::entities::ExecutionSelection;
use crate::error::{AppError, Result};

/// How cluster credentials are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialMode {
    /// Read a kubeconfig file (`~/.kube/config` unless overridden).
    #[default]
    Kubeconfig,
    /// Use the mounted service account of the pod we run in.
    InCluster,
    /// Let the client library pick, the way kubectl does.
    Infer,
}

impl FromStr for CredentialMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kubeconfig" => Ok(CredentialMode::Kubeconfig),
            "in-cluster" | "incluster" => Ok(CredentialMode::InCluster),
            "infer" => Ok(CredentialMode::Infer),
            other => Err(AppError::ConfigError(format!(
                "unknown credential mode '{}', expected kubeconfig, in-cluster or infer",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::ConfigError(format!("unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: LogFormat,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub credentials: CredentialMode,
    pub namespace: String,
    pub request_timeout_seconds: u64,
    pub verify_connectivity: bool,
    pub shared_session: bool,
    pub execution_selection: ExecutionSelection,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            credentials: CredentialMode::Kubeconfig,
            namespace: "default".to_string(),
            request_timeout_seconds: 30,
            verify_connectivity: false,
            shared_session: false,
            execution_selection: ExecutionSelection::MostRecent,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: YAML file if given, then `.env` and process
    /// environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CRONCTL_KUBECONFIG").or_else(|| lookup("KUBECONFIG")) {
            // KUBECONFIG may hold a list; the first entry is the one read.
            if let Some(first) = std::env::split_paths(&path).next() {
                if !first.as_os_str().is_empty() {
                    self.kubeconfig = Some(first);
                }
            }
        }
        if let Some(context) = lookup("CRONCTL_CONTEXT") {
            self.context = Some(context);
        }
        if let Some(mode) = lookup("CRONCTL_CREDENTIALS") {
            self.credentials = mode.parse()?;
        }
        if let Some(namespace) = lookup("CRONCTL_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(timeout) = lookup("CRONCTL_REQUEST_TIMEOUT") {
            self.request_timeout_seconds = timeout.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "CRONCTL_REQUEST_TIMEOUT must be a number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }
        if let Some(flag) = lookup("CRONCTL_VERIFY_CONNECTIVITY") {
            self.verify_connectivity = parse_bool("CRONCTL_VERIFY_CONNECTIVITY", &flag)?;
        }
        if let Some(flag) = lookup("CRONCTL_SHARED_SESSION") {
            self.shared_session = parse_bool("CRONCTL_SHARED_SESSION", &flag)?;
        }
        if let Some(selection) = lookup("CRONCTL_EXECUTION_SELECTION") {
            self.execution_selection = selection.parse()?;
        }
        if let Some(level) = lookup("CRONCTL_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(format) = lookup("CRONCTL_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(AppError::ConfigError("namespace must not be empty".to_string()));
        }
        if let Some(context) = &self.context {
            if context.trim().is_empty() {
                return Err(AppError::ConfigError("context must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Per-call deadline; zero disables it.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Kubeconfig to read in `kubeconfig` mode.
    pub fn kubeconfig_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.kubeconfig {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".kube").join("config"))
            .ok_or_else(|| {
                AppError::ConfigError(
                    "cannot locate home directory; set CRONCTL_KUBECONFIG".to_string(),
                )
            })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
