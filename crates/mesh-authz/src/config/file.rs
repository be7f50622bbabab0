//! TOML configuration file loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./mesh-authz.toml",
    "~/.config/mesh-authz/config.toml",
    "/etc/mesh-authz/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(apply_file_config(builder, file_config))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> ConfigBuilder {
    if let Some(fetch) = config.fetch {
        if let Some(ms) = fetch.timeout_ms {
            builder = builder.fetch_timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = fetch.max_retries {
            builder = builder.max_retries(retries);
        }
        if let Some(ms) = fetch.initial_backoff_ms {
            builder = builder.initial_backoff(Duration::from_millis(ms));
        }
        if let Some(ms) = fetch.max_backoff_ms {
            builder = builder.max_backoff(Duration::from_millis(ms));
        }
        if let Some(user_agent) = fetch.user_agent {
            builder = builder.user_agent(user_agent);
        }
    }

    if let Some(validation) = config.validation
        && let Some(secs) = validation.clock_skew_secs
    {
        builder = builder.clock_skew(Duration::from_secs(secs));
    }

    if let Some(secrets) = config.secrets
        && let Some(dir) = secrets.dir
    {
        builder = builder.secrets_dir(dir);
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    builder
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    fetch: Option<FetchFileConfig>,
    validation: Option<ValidationFileConfig>,
    secrets: Option<SecretsFileConfig>,
    observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Deserialize)]
struct FetchFileConfig {
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidationFileConfig {
    clock_skew_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SecretsFileConfig {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    log_level: Option<String>,
    json_logs: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[fetch]
timeout_ms = 2500
max_retries = 3
initial_backoff_ms = 50
max_backoff_ms = 800
user_agent = "gateway/2"

[validation]
clock_skew_secs = 30

[secrets]
dir = "/var/run/secrets/oidc"

[observability]
log_level = "debug"
json_logs = true
"#;
        let file = create_temp_config(toml_content);
        let config = load_from_file(file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.fetch.timeout, Duration::from_millis(2500));
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.initial_backoff, Duration::from_millis(50));
        assert_eq!(config.fetch.max_backoff, Duration::from_millis(800));
        assert_eq!(config.fetch.user_agent, "gateway/2");
        assert_eq!(config.validation.clock_skew, Duration::from_secs(30));
        assert_eq!(
            config.secrets_dir,
            Some(PathBuf::from("/var/run/secrets/oidc"))
        );
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn test_parse_partial_config() {
        let file = create_temp_config("[validation]\nclock_skew_secs = 0\n");
        let config = load_from_file(file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.validation.clock_skew, Duration::ZERO);
        assert_eq!(config.fetch.max_retries, 2);
    }

    #[test]
    fn test_parse_empty_config() {
        let file = create_temp_config("");
        assert!(load_from_file(file.path(), ConfigBuilder::new()).is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let file = create_temp_config("[fetch\ntimeout_ms = ");
        let err = load_from_file(file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let file = create_temp_config("[server]\nport = 80\n");
        assert!(load_from_file(file.path(), ConfigBuilder::new()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_from_file(Path::new("/nonexistent/mesh-authz.toml"), ConfigBuilder::new());
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }
}
