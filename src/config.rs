// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `127.0.0.1` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_URL` | Identity provider base URL | Unset = development mode |
//! | `AUTH_ANON_KEY` | Provider public API key | Required with `AUTH_URL` |
//! | `DEV_ADMIN_EMAIL` | Seeded admin account (development mode) | `admin@founders.local` |
//! | `DEV_ADMIN_PASSWORD` | Seeded admin password (development mode) | `admin` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Bind Address
//!
//! The portal mirrors one operator session for the whole process, and its
//! endpoints carry no per-caller credentials. Anyone who can reach the port
//! acts as the signed-in operator, so the default bind is loopback only.
//! Set `HOST` to a routable address only behind a proxy that authenticates
//! the operator.

use std::net::SocketAddr;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_URL_ENV: &str = "AUTH_URL";
pub const AUTH_ANON_KEY_ENV: &str = "AUTH_ANON_KEY";
pub const DEV_ADMIN_EMAIL_ENV: &str = "DEV_ADMIN_EMAIL";
pub const DEV_ADMIN_PASSWORD_ENV: &str = "DEV_ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DEV_ADMIN_EMAIL: &str = "admin@founders.local";
const DEFAULT_DEV_ADMIN_PASSWORD: &str = "admin";

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when {1} is set")]
    Missing(&'static str, &'static str),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Identity provider wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Hosted { url: String, anon_key: String },
    Development { admin_email: String, admin_password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub provider: ProviderConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = non_empty(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match non_empty(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(PORT_ENV, raw))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid(HOST_ENV, host))?;

        let provider = match non_empty(AUTH_URL_ENV) {
            Some(url) => ProviderConfig::Hosted {
                url,
                anon_key: non_empty(AUTH_ANON_KEY_ENV)
                    .ok_or(ConfigError::Missing(AUTH_ANON_KEY_ENV, AUTH_URL_ENV))?,
            },
            None => ProviderConfig::Development {
                admin_email: non_empty(DEV_ADMIN_EMAIL_ENV)
                    .unwrap_or_else(|| DEFAULT_DEV_ADMIN_EMAIL.to_string()),
                admin_password: non_empty(DEV_ADMIN_PASSWORD_ENV)
                    .unwrap_or_else(|| DEFAULT_DEV_ADMIN_PASSWORD.to_string()),
            },
        };

        let log_format = match non_empty(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::Invalid(LOG_FORMAT_ENV, other.to_string())),
        };

        Ok(Self {
            bind_addr,
            provider,
            log_format,
        })
    }
}
