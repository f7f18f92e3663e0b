//! Configuration file loading
//!
//! Every field has a default, so a missing file or a partial one is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{
    COMMENTS_TTL_MINUTES, DETAIL_TTL_MINUTES, LIST_TTL_MINUTES, TASKS_TTL_MINUTES,
};
use crate::refresh::{IntervalError, RefreshInterval, DEFAULT_INTERVAL, MANUAL_COOLDOWN};

/// Environment variable holding the login password
pub const PASSWORD_ENV: &str = "LEADSYNC_PASSWORD";

const LOCAL_CONFIG: &str = "leadsync.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("Password not found. Set LEADSYNC_PASSWORD or pass --password.")]
    MissingPassword,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Webhook serving lead lists
    pub leads_url: String,
    /// Webhook for writes, tasks and comments
    pub client_url: String,
    pub login_url: String,
    pub logout_url: String,
    /// Webhook returning the employee profile after login
    pub profile_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            leads_url: "https://n8n.gopocket.in/webhook/hrms".to_string(),
            client_url: "https://n8n.gopocket.in/webhook/client".to_string(),
            login_url: "https://hrms-db.gopocket.in/api/method/login".to_string(),
            logout_url: "https://hrms-db.gopocket.in/api/method/logout".to_string(),
            profile_url: "https://n8n.gopocket.in/webhook/hrms".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the platform cache directory
    pub dir: Option<PathBuf>,
    pub list_ttl_minutes: i64,
    pub detail_ttl_minutes: i64,
    pub comments_ttl_minutes: i64,
    pub tasks_ttl_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            list_ttl_minutes: LIST_TTL_MINUTES,
            detail_ttl_minutes: DETAIL_TTL_MINUTES,
            comments_ttl_minutes: COMMENTS_TTL_MINUTES,
            tasks_ttl_minutes: TASKS_TTL_MINUTES,
        }
    }
}

impl CacheConfig {
    pub fn list_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.list_ttl_minutes)
    }

    pub fn detail_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.detail_ttl_minutes)
    }

    pub fn comments_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.comments_ttl_minutes)
    }

    pub fn tasks_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.tasks_ttl_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL.as_secs(),
            cooldown_secs: MANUAL_COOLDOWN.as_secs(),
        }
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Result<RefreshInterval, ConfigError> {
        Ok(RefreshInterval::from_secs(self.interval_secs)?)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Config {
    /// Loads configuration.
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. ./leadsync.yaml
    /// 3. `<config dir>/leadsync/config.yaml`
    ///
    /// Falls back to defaults when no file is found.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => Self::find_config_file(),
        };

        match path {
            Some(p) => Self::load_from_path(&p),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }

        let dirs = directories::ProjectDirs::from("", "", "leadsync")?;
        let xdg_path = dirs.config_dir().join("config.yaml");
        xdg_path.exists().then_some(xdg_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Login password from the environment
    pub fn password_from_env() -> Result<String, ConfigError> {
        std::env::var(PASSWORD_ENV).map_err(|_| ConfigError::MissingPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.list_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.cache.detail_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.cache.comments_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.cache.tasks_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.refresh.interval_secs, 900);
        assert_eq!(config.refresh.cooldown(), Duration::from_secs(120));
        assert!(config.endpoints.login_url.ends_with("/api/method/login"));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
cache:
  list_ttl_minutes: 2
refresh:
  interval_secs: 120
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.cache.list_ttl_minutes, 2);
        assert_eq!(config.cache.detail_ttl_minutes, 30);
        assert_eq!(
            config.refresh.interval().unwrap().as_duration(),
            Duration::from_secs(120)
        );
        assert_eq!(config.endpoints, EndpointsConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_out_of_range_interval() {
        let config = Config::from_yaml("refresh:\n  interval_secs: 30\n").unwrap();
        assert!(matches!(
            config.refresh.interval(),
            Err(ConfigError::Interval(IntervalError::OutOfRange(30)))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(
            &path,
            "endpoints:\n  leads_url: http://localhost:5678/leads\ncache:\n  dir: /tmp/leadsync-test\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.endpoints.leads_url, "http://localhost:5678/leads");
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/leadsync-test")));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.yaml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "cache: [unclosed").unwrap();

        let result = Config::load(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
