//! Configuration for the bridge.
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file at the platform config dir (`~/.config/reabridge/config.toml` on Linux)
//! 3. Environment: `OSC_HOST`, `OSC_PORT`, `OSC_LISTEN_PORT`, `PORT`

use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default remote host for the DAW's OSC control surface.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port REAPER listens on for commands.
pub const DEFAULT_PORT: u16 = 8000;
/// Default local port REAPER sends feedback to.
pub const DEFAULT_LISTEN_PORT: u16 = 9000;
/// Default HTTP glue port.
pub const DEFAULT_HTTP_PORT: u16 = 3001;

/// Remote/local UDP endpoint triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Host the DAW listens on
    pub host: String,
    /// Port the DAW receives commands on
    pub port: u16,
    /// Local port bound for inbound state messages (0 picks an ephemeral port)
    pub listen_port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

/// Partial update for [`ControlConfig`]. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub listen_port: Option<u16>,
}

impl ControlConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `OSC_HOST`, `OSC_PORT` and `OSC_LISTEN_PORT` from the environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OSC_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("OSC_PORT") {
            self.port = parse_port("OSC_PORT", &port)?;
        }
        if let Some(port) = lookup("OSC_LISTEN_PORT") {
            self.listen_port = parse_port("OSC_LISTEN_PORT", &port)?;
        }
        Ok(())
    }

    /// Reject values that can never produce a working socket pair.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("remote port must be 1-65535".to_string()));
        }
        Ok(())
    }

    /// Merge a partial update into this config.
    pub fn merge(&mut self, update: ConfigUpdate) {
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(listen_port) = update.listen_port {
            self.listen_port = listen_port;
        }
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| Error::Config(format!("{} must be a port number, got '{}'", name, value)))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OSC endpoint configuration
    pub osc: OscSettings,
    /// Knowledge document location
    pub knowledge: KnowledgeSettings,
    /// Search tuning
    pub search: SearchSettings,
    /// HTTP glue configuration
    pub http: HttpSettings,
}

/// OSC settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscSettings {
    #[serde(flatten)]
    pub control: ControlConfig,
    /// How long `connect` may take before failing
    pub connect_timeout_ms: u64,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            connect_timeout_ms: 2000,
        }
    }
}

impl OscSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Knowledge document settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// JSON document to load instead of the built-in one
    pub path: Option<PathBuf>,
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of distinct queries kept in the result cache (0 disables caching)
    pub cache_capacity: usize,
    /// Seconds a cached result stays valid
    pub cache_ttl_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 128,
            cache_ttl_secs: 300,
        }
    }
}

impl SearchSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Config {
    /// Load the config file if present (defaults otherwise), then overlay the environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load a specific config file without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables onto the loaded values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.osc.control.apply_env_with(&lookup)?;
        if let Some(port) = lookup("PORT") {
            self.http.port = parse_port("PORT", &port)?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "reabridge") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments at the default location
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`, creating parent dirs.
    pub fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# reabridge configuration file

[osc]
# Host and port REAPER's OSC control surface listens on
host = "127.0.0.1"
port = 8000

# Local port REAPER sends state feedback to
listen_port = 9000

# Give up on connect after this many milliseconds
connect_timeout_ms = 2000

[knowledge]
# JSON knowledge document (built-in document when unset)
# path = "/path/to/knowledge.json"

[search]
# Distinct queries kept in the result cache (0 disables)
cache_capacity = 128

# Seconds before a cached result expires
cache_ttl_secs = 300

[http]
port = 3001
"#;

        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.listen_port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let vars = env(&[("OSC_HOST", "10.0.0.5"), ("OSC_PORT", "8100")]);
        let mut config = ControlConfig::default();
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 8100);
        assert_eq!(config.listen_port, 9000);
    }

    #[test]
    fn test_env_bad_port_is_config_error() {
        let vars = env(&[("OSC_LISTEN_PORT", "ninety")]);
        let mut config = ControlConfig::default();
        let err = config.apply_env_with(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("OSC_LISTEN_PORT"));
    }

    #[test]
    fn test_validate_rejects_empty_host_and_zero_port() {
        let mut config = ControlConfig::default();
        config.host = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = ControlConfig::default();
        config.port = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_partial_update() {
        let mut config = ControlConfig::default();
        config.merge(ConfigUpdate {
            port: Some(8200),
            ..Default::default()
        });
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8200);
        assert_eq!(config.listen_port, 9000);
    }

    #[test]
    fn test_default_config_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_config(&path).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.osc.control, ControlConfig::default());
        assert_eq!(config.osc.connect_timeout_ms, 2000);
        assert!(config.knowledge.path.is_none());
        assert_eq!(config.search.cache_capacity, 128);
        assert_eq!(config.http.port, 3001);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[osc]\nhost = \"192.168.1.20\"\n").unwrap();

        let mut config = Config::load_from(&path).unwrap();
        assert_eq!(config.osc.control.host, "192.168.1.20");
        assert_eq!(config.osc.control.port, 8000);

        let vars = env(&[("OSC_PORT", "9100"), ("PORT", "4000")]);
        config.apply_env_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.osc.control.port, 9100);
        assert_eq!(config.http.port, 4000);
    }
}
