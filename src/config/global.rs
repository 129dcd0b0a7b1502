
use crate::config::component::ComponentDefinition;
use crate::error::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "K0S_SUPERVISOR_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub supervisor: SupervisorDefaults,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default)]
    pub file_enabled: bool,
    pub file_path: Option<PathBuf>, // directory; defaults to <data_dir>/logs
    #[serde(default)]
    pub component_log_files: bool, // child output to <log_dir>/components/<name>.log
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorDefaults {
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    #[serde(default = "default_respawn_delay_secs")]
    pub respawn_delay_secs: u64,
    pub shutdown_kill_after_secs: Option<u64>, // unbounded graceful retry when unset
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: None,
            component_log_files: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SupervisorDefaults {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            respawn_delay_secs: default_respawn_delay_secs(),
            shutdown_kill_after_secs: None,
        }
    }
}

impl SupervisorDefaults {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn respawn_delay(&self) -> Duration {
        Duration::from_secs(self.respawn_delay_secs)
    }

    pub fn shutdown_kill_after(&self) -> Option<Duration> {
        self.shutdown_kill_after_secs.map(Duration::from_secs)
    }
}

impl NodeConfig {
    pub async fn load() -> Result<Self> {
        Self::load_from_path(&default_config_path()).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(SupervisorError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        validate_timeouts(
            "supervisor",
            Some(self.supervisor.stop_timeout_secs),
            Some(self.supervisor.respawn_delay_secs),
            self.supervisor.shutdown_kill_after_secs,
        )?;

        let mut names = HashSet::new();
        for component in &self.components {
            component.validate()?;
            if !names.insert(component.name.as_str()) {
                return Err(SupervisorError::ConfigError(format!(
                    "Duplicate component name: {}",
                    component.name
                )));
            }
        }

        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => path.clone(),
            None => self.paths.data_dir.join("logs"),
        }
    }
}

/// Reject zero-valued timeouts; `None` means "not set here".
pub(crate) fn validate_timeouts(
    owner: &str,
    stop_timeout_secs: Option<u64>,
    respawn_delay_secs: Option<u64>,
    shutdown_kill_after_secs: Option<u64>,
) -> Result<()> {
    for (field, value) in [
        ("stop_timeout_secs", stop_timeout_secs),
        ("respawn_delay_secs", respawn_delay_secs),
        ("shutdown_kill_after_secs", shutdown_kill_after_secs),
    ] {
        if value == Some(0) {
            return Err(SupervisorError::ConfigError(format!(
                "{owner}: {field} must be greater than 0"
            )));
        }
    }
    Ok(())
}

pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("/etc/k0s/supervisor.toml"),
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}
fn default_run_dir() -> PathBuf {
    PathBuf::from("/run/k0s")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/k0s")
}
fn default_stop_timeout_secs() -> u64 {
    5
}
fn default_respawn_delay_secs() -> u64 {
    5
}
