//! Environment variable loading for configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const FETCH_TIMEOUT_MS: &str = "MESH_AUTHZ_FETCH_TIMEOUT_MS";
    pub const FETCH_MAX_RETRIES: &str = "MESH_AUTHZ_FETCH_MAX_RETRIES";
    pub const CLOCK_SKEW_SECS: &str = "MESH_AUTHZ_CLOCK_SKEW_SECS";
    pub const SECRETS_DIR: &str = "MESH_AUTHZ_SECRETS_DIR";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "MESH_AUTHZ_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(value) = env::var(vars::FETCH_TIMEOUT_MS) {
        let ms = parse_number::<u64>(vars::FETCH_TIMEOUT_MS, &value)?;
        builder = builder.fetch_timeout(Duration::from_millis(ms));
    }

    if let Ok(value) = env::var(vars::FETCH_MAX_RETRIES) {
        builder = builder.max_retries(parse_number(vars::FETCH_MAX_RETRIES, &value)?);
    }

    if let Ok(value) = env::var(vars::CLOCK_SKEW_SECS) {
        let secs = parse_number::<u64>(vars::CLOCK_SKEW_SECS, &value)?;
        builder = builder.clock_skew(Duration::from_secs(secs));
    }

    if let Ok(dir) = env::var(vars::SECRETS_DIR)
        && !dir.is_empty()
    {
        builder = builder.secrets_dir(PathBuf::from(dir));
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid {var}: {e}")))
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        vars::FETCH_TIMEOUT_MS,
        vars::FETCH_MAX_RETRIES,
        vars::CLOCK_SKEW_SECS,
        vars::SECRETS_DIR,
        vars::RUST_LOG,
        vars::JSON_LOGS,
    ];

    fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap();

        let old_values: Vec<_> = ALL_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in ALL_VARS {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::remove_var(key) };
        }
        for (key, value) in vars {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::set_var(key, value) };
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_no_env_keeps_defaults() {
        with_env_vars(&[], || {
            let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
            assert_eq!(config.fetch.timeout, Duration::from_secs(5));
            assert!(config.secrets_dir.is_none());
        });
    }

    #[test]
    fn test_load_fetch_settings() {
        with_env_vars(
            &[
                ("MESH_AUTHZ_FETCH_TIMEOUT_MS", "1500"),
                ("MESH_AUTHZ_FETCH_MAX_RETRIES", "4"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.fetch.timeout, Duration::from_millis(1500));
                assert_eq!(config.fetch.max_retries, 4);
            },
        );
    }

    #[test]
    fn test_load_validation_and_secrets() {
        with_env_vars(
            &[
                ("MESH_AUTHZ_CLOCK_SKEW_SECS", "5"),
                ("MESH_AUTHZ_SECRETS_DIR", "/var/run/secrets"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.validation.clock_skew, Duration::from_secs(5));
                assert_eq!(config.secrets_dir, Some(PathBuf::from("/var/run/secrets")));
            },
        );
    }

    #[test]
    fn test_load_telemetry() {
        with_env_vars(
            &[("RUST_LOG", "mesh_authz=debug"), ("MESH_AUTHZ_JSON_LOGS", "yes")],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.telemetry.log_level, "mesh_authz=debug");
                assert!(config.telemetry.json_logs);
            },
        );
    }

    #[test]
    fn test_invalid_number_is_error() {
        with_env_vars(&[("MESH_AUTHZ_FETCH_TIMEOUT_MS", "soon")], || {
            let err = load_from_env(ConfigBuilder::new()).unwrap_err();
            assert!(err.to_string().contains("MESH_AUTHZ_FETCH_TIMEOUT_MS"));
        });
    }
}
