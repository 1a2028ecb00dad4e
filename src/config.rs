use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::astro::DisplayZone;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid display.utc_offset: {0}")]
    DisplayZone(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Age after which a good snapshot is refetched.
    #[serde(default = "default_ttl", deserialize_with = "deserialize_duration")]
    pub ttl: Duration,
    /// Age after which a failed snapshot is retried.
    #[serde(default = "default_failure_ttl", deserialize_with = "deserialize_duration")]
    pub failure_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            failure_ttl: default_failure_ttl(),
        }
    }
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_failure_ttl() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_city")]
    pub default_city: String,
    /// Auto-refresh period armed at start-up, if any.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub interval: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            default_city: default_city(),
            interval: None,
        }
    }
}

fn default_city() -> String {
    "New York".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_sunrise_sunset_url")]
    pub sunrise_sunset_url: String,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            sunrise_sunset_url: default_sunrise_sunset_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_sunrise_sunset_url() -> String {
    "https://api.sunrise-sunset.org/json".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// `local`, `utc` or a fixed offset such as `+02:00`.
    #[serde(default)]
    pub utc_offset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Refresh,
    ManageAutoRefresh,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.display_zone()?;
        Ok(config)
    }

    pub fn display_zone(&self) -> Result<DisplayZone, ConfigError> {
        match self.display.utc_offset.as_deref() {
            None => Ok(DisplayZone::Local),
            Some(value) => {
                DisplayZone::parse(value).map_err(|e| ConfigError::DisplayZone(e.to_string()))
            }
        }
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.failure_ttl, Duration::from_secs(30));
        assert_eq!(config.refresh.default_city, "New York");
        assert_eq!(config.refresh.interval, None);
        assert_eq!(config.services.timeout, Duration::from_secs(10));
        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert_eq!(config.display_zone().unwrap(), DisplayZone::Local);
    }

    #[test]
    fn parses_humantime_durations_and_keys() {
        let yaml = r#"
cache:
  ttl: 10m
refresh:
  default_city: Reykjavik
  interval: 30m
display:
  utc_offset: "+01:00"
api_keys:
  - key: secret
    name: ops
    permissions: [refresh, manage_auto_refresh]
"#;
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.cache.failure_ttl, Duration::from_secs(30));
        assert_eq!(config.refresh.interval, Some(Duration::from_secs(1800)));
        assert_eq!(config.refresh.default_city, "Reykjavik");
        let key = config.find_api_key("secret").unwrap();
        assert!(key.permissions.contains(&Permission::ManageAutoRefresh));
        assert!(config.find_api_key("nope").is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_str("cache:\n  ttl: soon\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            Config::from_str("display:\n  utc_offset: mars\n"),
            Err(ConfigError::DisplayZone(_))
        ));
    }
}
