use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::policy::CachePolicy;

/// Environment variable overriding `feed_url`.
pub const FEED_URL_ENV: &str = "FEEDCACHE_FEED_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin of the feed payload
  pub feed_url: Option<Url>,
  pub cache: CacheConfig,
  pub strategy: StrategyConfig,
  pub http: HttpConfig,
  /// Default tracing filter, overridden by RUST_LOG
  pub log_level: String,
  /// Write logs to this file instead of stderr
  pub log_file: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      feed_url: None,
      cache: CacheConfig::default(),
      strategy: StrategyConfig::default(),
      http: HttpConfig::default(),
      log_level: "info".to_string(),
      log_file: None,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// One SQLite database for the feed and images
  #[default]
  Sqlite,
  /// Feed in a JSON file, images in a SQLite database next to it
  Json,
  /// Nothing survives the process
  Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: Backend,
  /// Location of the cache file (default depends on the backend)
  pub path: Option<PathBuf>,
  pub max_age_days: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: Backend::default(),
      path: None,
      max_age_days: CachePolicy::DEFAULT_MAX_AGE_DAYS,
    }
  }
}

impl CacheConfig {
  /// Configured path, or the backend's default under the user's data directory.
  pub fn resolved_path(&self) -> Option<PathBuf> {
    if let Some(path) = &self.path {
      return Some(path.clone());
    }

    let file = match self.backend {
      Backend::Sqlite => "cache.db",
      Backend::Json => "feed.json",
      Backend::Memory => return None,
    };
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|dir| dir.join("feedcache").join(file))
  }

  /// Cache policy for `max_age_days`. Negative or unrepresentable ages are rejected.
  pub fn policy(&self) -> Result<CachePolicy> {
    if self.max_age_days < 0 {
      return Err(eyre!("cache.max_age_days must not be negative, got {}", self.max_age_days));
    }
    chrono::Duration::try_days(self.max_age_days)
      .map(CachePolicy::new)
      .ok_or_else(|| eyre!("cache.max_age_days is too large: {}", self.max_age_days))
  }
}

/// Which source a pipeline asks first.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  /// Origin first, cached copy when the origin fails
  RemoteFirst,
  /// Cached copy first, origin when the cache has nothing
  LocalFirst,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
  pub feed: Strategy,
  pub images: Strategy,
}

impl Default for StrategyConfig {
  fn default() -> Self {
    Self {
      feed: Strategy::RemoteFirst,
      images: Strategy::LocalFirst,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub timeout_secs: u64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self { timeout_secs: 30 }
  }
}

impl HttpConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedcache/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("feedcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
    config
      .cache
      .policy()
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Resolve the feed URL: command line, then FEEDCACHE_FEED_URL, then file.
  pub fn resolve_feed_url(&self, cli: Option<Url>) -> Result<Option<Url>> {
    if cli.is_some() {
      return Ok(cli);
    }

    if let Ok(value) = std::env::var(FEED_URL_ENV) {
      let url = Url::parse(&value).map_err(|e| eyre!("Invalid {}: {}", FEED_URL_ENV, e))?;
      return Ok(Some(url));
    }

    Ok(self.feed_url.clone())
  }
}
