//! Configuration schema (assetgraph.toml)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Verbosity handed to asset validation hooks
///
/// Validation helpers receive this explicitly instead of adjusting a
/// process-wide log level, so concurrent resolutions never interfere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Report nothing beyond errors
    Quiet,

    /// Report validation warnings
    Warn,

    /// Report progress of validation steps
    Info,

    /// Report every detail a validator inspects
    Debug,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Warn
    }
}

impl Verbosity {
    /// Check whether messages at `level` should be emitted
    pub fn allows(&self, level: Verbosity) -> bool {
        level != Verbosity::Quiet && level <= *self
    }
}

/// Scheduling of a graph run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Resolve sibling dependencies concurrently
    #[serde(default)]
    pub concurrent: bool,

    /// Abort the run after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            deadline_secs: None,
        }
    }
}

impl RunConfig {
    /// Deadline as a duration, if configured
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive for the log subscriber (e.g. "info", "assetgraph_engine=debug")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Verbosity passed down to asset validation
    #[serde(default)]
    pub validation: Verbosity,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            validation: Verbosity::default(),
        }
    }
}

/// Output directory layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives generated files and persisted state
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Subdirectory of `dir` holding persisted asset state
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Write a JSON run report to this path
    #[serde(default)]
    pub report: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_dir() -> String {
    ".assetgraph".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            state_dir: default_state_dir(),
            report: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Run scheduling
    #[serde(default)]
    pub run: RunConfig,

    /// Logging
    #[serde(default)]
    pub logging: LogConfig,

    /// Output layout
    #[serde(default)]
    pub output: OutputConfig,

    /// Directory the config file was loaded from
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            logging: LogConfig::default(),
            output: OutputConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Output directory, resolved against the project root when relative
    pub fn output_dir(&self) -> PathBuf {
        if self.output.dir.is_absolute() {
            self.output.dir.clone()
        } else {
            self.project_root.join(&self.output.dir)
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
