use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidSeconds { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },
    #[error("{var} cannot be empty")]
    Empty { var: &'static str },
}

/// Service settings, read once at startup and passed to whatever needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    /// Upper bound on a single store round-trip.
    pub query_timeout: Duration,
    pub request_timeout: Duration,
    pub graceful_shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:26400".to_string(),
            database_url: "folio.db".to_string(),
            query_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(15),
            graceful_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: string_var(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            database_url: string_var(&lookup, "DATABASE_URL", defaults.database_url)?,
            query_timeout: seconds_var(&lookup, "QUERY_TIMEOUT", defaults.query_timeout)?,
            request_timeout: seconds_var(&lookup, "REQUEST_TIMEOUT", defaults.request_timeout)?,
            graceful_shutdown_timeout: seconds_var(
                &lookup,
                "GRACEFUL_SHUTDOWN_TIMEOUT",
                defaults.graceful_shutdown_timeout,
            )?,
        })
    }
}

fn string_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: String,
) -> Result<String, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
        Some(value) => Ok(value),
    }
}

fn seconds_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(default);
    };

    let seconds: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSeconds {
            var,
            value: value.clone(),
        })?;
    if seconds == 0 {
        return Err(ConfigError::ZeroDuration { var });
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", ":memory:"),
            ("QUERY_TIMEOUT", "3"),
            ("GRACEFUL_SHUTDOWN_TIMEOUT", " 10 "),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_url, ":memory:");
        assert_eq!(config.query_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.graceful_shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_seconds_names_variable() {
        let err = Config::from_lookup(lookup(&[("QUERY_TIMEOUT", "15s")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSeconds {
                var: "QUERY_TIMEOUT",
                value: "15s".to_string()
            }
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_lookup(lookup(&[("REQUEST_TIMEOUT", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroDuration { var: "REQUEST_TIMEOUT" });
    }

    #[test]
    fn test_empty_database_url_rejected() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { var: "DATABASE_URL" });
    }
}
