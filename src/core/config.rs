use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.toml";
pub const API_URL_ENV: &str = "TOKENDECK_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the backend bridge.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Broadcast capacity of each log channel.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://127.0.0.1:17990".to_string()
}
fn default_log_capacity() -> usize {
    256
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            log_capacity: default_log_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            config.api_url = url.trim().to_string();
        }
        config.validate()?;

        info!(
            "Loaded config: api_url={}, log_capacity={}, timeout={}s",
            config.api_url, config.log_capacity, config.request_timeout_secs
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Invalid config.toml")?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        let parsed = url::Url::parse(&self.api_url)
            .with_context(|| format!("api_url '{}' is not a valid URL", self.api_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("api_url must use http or https, got '{}'", parsed.scheme());
        }
        if self.log_capacity == 0 {
            warn!("log_capacity of 0 is not usable, falling back to default");
            self.log_capacity = default_log_capacity();
        }
        if self.request_timeout_secs == 0 {
            warn!("request_timeout_secs of 0 is not usable, falling back to default");
            self.request_timeout_secs = default_request_timeout_secs();
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:17990");
        assert_eq!(config.log_capacity, 256);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn fields_are_read() {
        let config = AppConfig::parse(
            "api_url = \"https://bridge.local:8443\"\nlog_capacity = 64\nrequest_timeout_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.api_url, "https://bridge.local:8443");
        assert_eq!(config.log_capacity, 64);
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn invalid_urls_are_rejected() {
        let mut config = AppConfig {
            api_url: "not a url".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
        config.api_url = "ftp://bridge".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_values_fall_back() {
        let mut config = AppConfig {
            log_capacity: 0,
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.log_capacity, 256);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn load_reads_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "log_capacity = 32\n").unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.log_capacity, 32);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "log_capacity = \"many\"\n").unwrap();
        assert!(AppConfig::load(dir.path()).is_err());
    }
}
