//! Configuration loading and validation.
//!
//! Configuration is read from a TOML file (or built from defaults) and
//! validated before the conversion manager starts. The converter script may
//! be given as an explicit path or as a bare name resolved through `PATH`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pdfmill_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default name of the converter script, resolved through `PATH`.
pub const DEFAULT_SCRIPT: &str = "doc2pdf";

/// Default wall-clock limit for a single converter process: 5 minutes.
const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of worker threads draining the job queue.
const DEFAULT_WORKERS: usize = 2;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External converter settings.
    pub converter: ConverterConfig,
    /// Worker pool settings.
    pub pool: PoolConfig,
}

/// Settings for the external converter script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path to the converter script, or a bare name looked up in `PATH`.
    pub script: PathBuf,
    /// Maximum execution time before a converter process is killed.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_SCRIPT),
            timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }
}

impl ConverterConfig {
    /// Resolve the configured script to an absolute path.
    ///
    /// A bare name (no path separators) is looked up in `PATH` via
    /// [`which::which`]; anything else must point at an existing file.
    pub fn resolve_script(&self) -> Result<PathBuf> {
        let is_bare_name = self.script.components().count() == 1 && !self.script.is_absolute();
        if is_bare_name {
            which::which(&self.script).map_err(|_| {
                Error::Config(format!(
                    "converter script '{}' not found in PATH",
                    self.script.display()
                ))
            })
        } else {
            let path = std::path::absolute(&self.script).map_err(Error::io)?;
            if path.is_file() {
                Ok(path)
            } else {
                Err(Error::Config(format!(
                    "converter script '{}' does not exist",
                    path.display()
                )))
            }
        }
    }
}

/// Settings for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads draining the job queue.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("failed to read config file {}: {e}", path.display())))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return the default config.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./pdfmill.toml",
        "~/.config/pdfmill/config.toml",
        "/etc/pdfmill/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.pool.workers == 0 {
        return Err(Error::Config("pool.workers cannot be 0".to_string()));
    }

    if config.converter.timeout.is_zero() {
        return Err(Error::Config("converter.timeout cannot be 0".to_string()));
    }

    if config.converter.script.as_os_str().is_empty() {
        return Err(Error::Config("converter.script cannot be empty".to_string()));
    }

    Ok(())
}
