use std::{env, fmt::Display, str::FromStr};

use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is missing")]
    Missing(&'static str),

    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

// Settings read once at startup and handed to everything that needs them.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub admin_token: String,
    pub code_length: usize,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_token = lookup("ADMIN_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("ADMIN_TOKEN"))?;

        let code_length: usize = parse_or(&lookup, "CODE_LENGTH", 5)?;
        if !(1..=64).contains(&code_length) {
            return Err(ConfigError::Invalid {
                key: "CODE_LENGTH",
                reason: "must be between 1 and 64".to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:event_vote.db".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            admin_token,
            code_length,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_lookup(lookup_from(&[("ADMIN_TOKEN", "secret")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.code_length, 5);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.database_url, "sqlite:event_vote.db");
        assert_eq!(config.admin_token, "secret");
    }

    #[test]
    fn missing_admin_token_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ADMIN_TOKEN")));
    }

    #[test]
    fn malformed_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("ADMIN_TOKEN", "t"), ("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn out_of_range_code_length_is_rejected() {
        for length in ["0", "65"] {
            let err = Config::from_lookup(lookup_from(&[("ADMIN_TOKEN", "t"), ("CODE_LENGTH", length)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "CODE_LENGTH", .. }));
        }
    }
}
