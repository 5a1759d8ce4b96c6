//! Daemon configuration, loaded from TOML.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use zbserv_core::{Domain, DomainConfig};

use crate::lifecycle::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use crate::server::DEFAULT_ADDR;

/// Environment variable holding the HoYoLAB account cookie.
pub const COOKIE_ENV: &str = "HOYOLAB_COOKIE";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "ZBSERV_CONFIG";

/// Root configuration. Deserialized from `<config_dir>/zbserv/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hoyolab: HoyolabConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default = "default_domains")]
    pub domains: Vec<DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            hoyolab: HoyolabConfig::default(),
            monitor: MonitorConfig::default(),
            domains: default_domains(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address of the overlay WebSocket endpoint.
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoyolabConfig {
    /// Account cookie. `HOYOLAB_COOKIE` takes precedence.
    #[serde(default)]
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the process table is scanned.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on how long a watch loop blocks between shutdown checks.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

fn default_poll_interval_ms() -> u64 {
    crate::saturating_millis(DEFAULT_POLL_INTERVAL)
}

fn default_wait_timeout_ms() -> u64 {
    crate::saturating_millis(DEFAULT_WAIT_TIMEOUT)
}

fn default_domains() -> Vec<DomainConfig> {
    Domain::ALL.into_iter().map(DomainConfig::new).collect()
}

impl Config {
    /// Rejects configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_ms == 0 {
            bail!("monitor.poll_interval_ms must be positive");
        }
        if self.monitor.wait_timeout_ms == 0 {
            bail!("monitor.wait_timeout_ms must be positive");
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if !seen.insert(domain.domain) {
                bail!("domain {} is configured more than once", domain.domain);
            }
            if domain.process_name.trim().is_empty() {
                bail!("domain {} has an empty process_name", domain.domain);
            }
            if domain.recover_interval_secs == 0 {
                bail!("domain {} has a zero recover_interval_secs", domain.domain);
            }
        }
        Ok(())
    }

    /// Executable names of every configured domain.
    pub fn process_names(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.process_name.clone()).collect()
    }
}

/// Loads the config file at `path`, returning `Config::default()` if it does not exist.
/// Returns an error if the file exists but cannot be read, parsed or validated.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// `$ZBSERV_CONFIG`, else `<config_dir>/zbserv/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("zbserv").join("config.toml"))
}

/// Parses a `KEY=VALUE` env file. Blank lines and `#` comments are skipped.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    parse_env(&content).with_context(|| format!("Failed to parse env file: {}", path.display()))
}

fn parse_env(content: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected KEY=VALUE", index + 1);
        };
        vars.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(vars)
}

/// Resolves the account cookie: environment, then env file, then config.
///
/// Blank values are treated as absent.
pub fn resolve_cookie(config: &Config, env_file: Option<&Path>) -> Result<Option<String>> {
    let from_file = match env_file {
        Some(path) => load_env_file(path)?.remove(COOKIE_ENV),
        None => None,
    };
    Ok(pick_cookie(
        std::env::var(COOKIE_ENV).ok(),
        from_file,
        config.hoyolab.cookie.clone(),
    ))
}

fn pick_cookie(
    from_env: Option<String>,
    from_file: Option<String>,
    from_config: Option<String>,
) -> Option<String> {
    [from_env, from_file, from_config]
        .into_iter()
        .flatten()
        .find(|cookie| !cookie.trim().is_empty())
}
