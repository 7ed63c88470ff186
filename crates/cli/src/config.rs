//! Host configuration file (TOML)
//!
//! Everything is optional; command-line flags override file values.
//!
//! ```toml
//! persist_dir = "state"
//! methods_dir = "methods"
//! log_filter = "info"
//!
//! [bootstrap]
//! method = "main"
//! version = "latest"
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Directory for the `*.agerun` snapshot files (default: cwd).
    pub persist_dir: Option<PathBuf>,
    /// Directory of `.method` files to install at startup.
    pub methods_dir: Option<PathBuf>,
    /// `tracing` env-filter directive, e.g. `info` or `agerun_runtime=debug`.
    pub log_filter: Option<String>,
    /// Agent to create after methods are installed.
    pub bootstrap: Option<BootstrapConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    pub method: String,
    /// `"latest"` (the default) or an exact version such as `"1.0.0"`.
    pub version: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config: {}", e),
            ConfigError::Parse(e) => write!(f, "could not parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<HostConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config: HostConfig = toml::from_str(
            r#"
            persist_dir = "state"
            methods_dir = "methods"
            log_filter = "debug"

            [bootstrap]
            method = "main"
            version = "2.0.0"
            "#,
        )
        .unwrap();
        assert_eq!(config.persist_dir.as_deref(), Some(Path::new("state")));
        assert_eq!(config.methods_dir.as_deref(), Some(Path::new("methods")));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.method, "main");
        assert_eq!(bootstrap.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_empty_config() {
        let config: HostConfig = toml::from_str("").unwrap();
        assert!(config.persist_dir.is_none());
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<HostConfig, _> = toml::from_str("persist_dri = \"typo\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agerun.toml");
        std::fs::write(&path, "log_filter = \"warn\"\n").unwrap();
        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("warn"));
        assert!(HostConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
