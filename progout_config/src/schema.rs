use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use progout_core::{ProcessRunner, ShellProgram};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Program that interprets shell commands.
    #[serde(default = "RunnerConfig::default_shell")]
    pub shell: String,
    #[serde(default = "RunnerConfig::default_shell_args")]
    pub shell_args: Vec<String>,
    /// No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: Self::default_shell(),
            shell_args: Self::default_shell_args(),
            timeout_secs: None,
        }
    }
}

impl RunnerConfig {
    fn default_shell() -> String {
        ShellProgram::default().program
    }

    fn default_shell_args() -> Vec<String> {
        ShellProgram::default().args
    }

    #[must_use]
    pub fn build_runner(&self) -> ProcessRunner {
        ProcessRunner::new()
            .with_shell(ShellProgram::new(&self.shell, self.shell_args.clone()))
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "runner": {
    "shell": "/bin/sh",
    "shell_args": ["-c"],
    "timeout_secs": null
  },
  "logging": {
    "level": "info"
  }
}
"#;

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("progout"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'progout init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        let config_path = config_dir.join("config.json");
        Self::create_config_at(&config_path)?;
        Ok(config_path)
    }

    pub fn create_config_at(config_path: &Path) -> anyhow::Result<()> {
        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(config_path, CONFIG_TEMPLATE)?;
        info!("Created config file at {}", config_path.display());
        Ok(())
    }
}
