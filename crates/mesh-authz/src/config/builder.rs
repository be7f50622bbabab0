//! Configuration builder

use std::path::PathBuf;
use std::time::Duration;

use crate::Error;
use crate::constants::DEFAULT_USER_AGENT;

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub validation: ValidationConfig,
    pub secrets_dir: Option<PathBuf>,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn fetch(&self) -> &FetchConfig {
        &self.fetch
    }

    #[must_use]
    pub const fn validation(&self) -> &ValidationConfig {
        &self.validation
    }
}

/// Key set and discovery document retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub user_agent: String,
}

impl FetchConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_RETRIES: u32 = 2;
    pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Token validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Leeway applied to `exp` and `nbf`
    pub clock_skew: Duration,
}

impl ValidationConfig {
    pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            clock_skew: Self::DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    fetch_timeout: Option<Duration>,
    max_retries: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    user_agent: Option<String>,
    clock_skew: Option<Duration>,
    secrets_dir: Option<PathBuf>,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fetch_timeout: None,
            max_retries: None,
            initial_backoff: None,
            max_backoff: None,
            user_agent: None,
            clock_skew: None,
            secrets_dir: None,
            telemetry: TelemetryConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub const fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub const fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub const fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = Some(skew);
        self
    }

    #[must_use]
    pub fn secrets_dir(mut self, dir: PathBuf) -> Self {
        self.secrets_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let fetch = FetchConfig {
            timeout: self.fetch_timeout.unwrap_or(FetchConfig::DEFAULT_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(FetchConfig::DEFAULT_MAX_RETRIES),
            initial_backoff: self
                .initial_backoff
                .unwrap_or(FetchConfig::DEFAULT_INITIAL_BACKOFF),
            max_backoff: self.max_backoff.unwrap_or(FetchConfig::DEFAULT_MAX_BACKOFF),
            user_agent: self
                .user_agent
                .filter(|ua| !ua.is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        if fetch.timeout.is_zero() {
            return Err(Error::Config("fetch timeout must be greater than zero".into()));
        }
        if fetch.max_backoff < fetch.initial_backoff {
            return Err(Error::Config(format!(
                "max backoff ({:?}) is shorter than initial backoff ({:?})",
                fetch.max_backoff, fetch.initial_backoff
            )));
        }

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            fetch,
            validation: ValidationConfig {
                clock_skew: self
                    .clock_skew
                    .unwrap_or(ValidationConfig::DEFAULT_CLOCK_SKEW),
            },
            secrets_dir: self.secrets_dir,
            telemetry: TelemetryConfig {
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.fetch, FetchConfig::default());
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.fetch.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.fetch.max_backoff, Duration::from_secs(2));
        assert!(config.fetch.user_agent.starts_with("mesh-authz/"));
        assert_eq!(config.validation.clock_skew, Duration::from_secs(60));
        assert!(config.secrets_dir.is_none());
        assert_eq!(config.telemetry.log_level, "info");
        assert!(!config.telemetry.json_logs);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .fetch_timeout(Duration::from_secs(1))
            .max_retries(0)
            .initial_backoff(Duration::from_millis(10))
            .max_backoff(Duration::from_millis(50))
            .user_agent("probe/1.0".to_string())
            .clock_skew(Duration::ZERO)
            .secrets_dir(PathBuf::from("/var/run/secrets"))
            .log_level("debug".to_string())
            .json_logs(true)
            .build()
            .unwrap();

        assert_eq!(config.fetch().timeout, Duration::from_secs(1));
        assert_eq!(config.fetch().max_retries, 0);
        assert_eq!(config.fetch().user_agent, "probe/1.0");
        assert_eq!(config.validation().clock_skew, Duration::ZERO);
        assert_eq!(
            config.secrets_dir.as_deref(),
            Some(std::path::Path::new("/var/run/secrets"))
        );
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn test_empty_user_agent_uses_default() {
        let config = ConfigBuilder::new()
            .user_agent(String::new())
            .build()
            .unwrap();
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ConfigBuilder::new().fetch_timeout(Duration::ZERO).build();
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let result = ConfigBuilder::new()
            .initial_backoff(Duration::from_secs(3))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_config_default() {
        assert_eq!(
            ValidationConfig::default().clock_skew,
            ValidationConfig::DEFAULT_CLOCK_SKEW
        );
    }
}
