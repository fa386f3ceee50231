// src/config.rs
use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Moderation policy handed to the core by the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub guest_voting_enabled: bool,
    pub auto_approve_polls: bool,
    pub max_options_per_poll: usize,
    pub require_login_to_create: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            guest_voting_enabled: false,
            auto_approve_polls: false,
            max_options_per_poll: 10,
            require_login_to_create: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub policy: Policy,
}

impl Config {
    /// Reads `.env` (when present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Policy::default();
        let policy = Policy {
            guest_voting_enabled: parse_flag(&lookup, "POLL_GUEST_VOTING", defaults.guest_voting_enabled)?,
            auto_approve_polls: parse_flag(&lookup, "POLL_AUTO_APPROVE", defaults.auto_approve_polls)?,
            max_options_per_poll: parse(&lookup, "POLL_MAX_OPTIONS", defaults.max_options_per_poll)?,
            require_login_to_create: parse_flag(
                &lookup,
                "POLL_REQUIRE_LOGIN_TO_CREATE",
                defaults.require_login_to_create,
            )?,
        };

        // Fewer than two options could never produce a valid poll.
        if policy.max_options_per_poll < 2 {
            return Err(ConfigError::Invalid {
                key: "POLL_MAX_OPTIONS",
                value: policy.max_options_per_poll.to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://polls.db".to_string()),
            max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            port: parse(&lookup, "PORT", 3030)?,
            policy,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3030);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.database_url, "sqlite://polls.db");
        assert_eq!(config.policy, Policy::default());
    }

    #[test]
    fn policy_flags_are_read() {
        let config = config_from(&[
            ("POLL_GUEST_VOTING", "yes"),
            ("POLL_AUTO_APPROVE", "1"),
            ("POLL_MAX_OPTIONS", "4"),
            ("POLL_REQUIRE_LOGIN_TO_CREATE", "off"),
        ])
        .unwrap();
        assert!(config.policy.guest_voting_enabled);
        assert!(config.policy.auto_approve_polls);
        assert_eq!(config.policy.max_options_per_poll, 4);
        assert!(!config.policy.require_login_to_create);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("POLL_GUEST_VOTING", "maybe")]).is_err());
        assert!(config_from(&[("POLL_MAX_OPTIONS", "1")]).is_err());
    }
}
