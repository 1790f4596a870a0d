//! Process configuration, read from environment variables.
//!
//! | Variable               | Default          |
//! |------------------------|------------------|
//! | `BIND_ADDR`            | `0.0.0.0:8080`   |
//! | `JWT_SECRET`           | insecure dev key |
//! | `DISPATCH_MAX_RETRIES` | `16`             |
//! | `LOG_FORMAT`           | `json`           |

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use goodsin_observability::LogFormat;

use crate::command_dispatcher::DEFAULT_MAX_RETRIES;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Set when `JWT_SECRET` was missing and the dev key is in use.
    pub insecure_jwt_secret: bool,
    pub dispatch_max_retries: u32,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let (jwt_secret, insecure_jwt_secret) = match get("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };

        let dispatch_max_retries = match get("DISPATCH_MAX_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "DISPATCH_MAX_RETRIES",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                var: "LOG_FORMAT",
                reason: e.to_string(),
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            insecure_jwt_secret,
            dispatch_max_retries,
            log_format,
        })
    }
}
