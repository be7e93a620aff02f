//! Configuration types, loading, and startup validation.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use transfer_tracing::TracingConfig;

use crate::manual::MANUAL_PAYLOAD_OFFSET;
use crate::session::TransferTarget;

pub const DEFAULT_COOKIE_NAME: &str = "namespace:transfer";
pub const DEFAULT_CHANNEL_NAME: &str = "namespace:transfer:manual";

/// Resource-key pattern the client accepts for stored markers.
pub const COOKIE_NAME_PATTERN: &str = r"(?:([a-z0-9_\-.]+:)?|:)[a-z0-9_\-./]+";

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error(
        "invalid cookie name: {name}. The cookie name must match the pattern: {}",
        COOKIE_NAME_PATTERN
    )]
    InvalidCookieName { name: String },

    #[error("invalid direct-connect-server-address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    #[error(
        "invalid bungee-channel-name {name:?}: must be between 1 and {} bytes",
        MANUAL_PAYLOAD_OFFSET
    )]
    InvalidChannelName { name: String },

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Shape of `config.toml` as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    #[serde(default)]
    direct_connect: bool,

    #[serde(default)]
    direct_connect_server_address: Option<String>,

    #[serde(default = "default_cookie_name")]
    cookie_name: String,

    #[serde(default = "default_channel_name")]
    bungee_channel_name: String,

    /// Upper bound on the login wait. Unset means wait until resolved.
    #[serde(default)]
    marker_timeout_ms: Option<u64>,

    #[serde(default)]
    tracing: TracingConfig,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_channel_name() -> String {
    DEFAULT_CHANNEL_NAME.to_string()
}

/// Validated, immutable connector configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TransferConfig {
    direct_connect: bool,
    target: Option<TransferTarget>,
    cookie_name: String,
    channel_name: String,
    marker_timeout_ms: Option<u64>,
    tracing: TracingConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            direct_connect: false,
            target: None,
            cookie_name: default_cookie_name(),
            channel_name: default_channel_name(),
            marker_timeout_ms: None,
            tracing: TracingConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from a TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (TRANSFER_ prefix, __ for nesting,
    ///    e.g. `TRANSFER_DIRECT_CONNECT`, `TRANSFER_TRACING__LOG_LEVEL`)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new().merge(Toml::file(config_path)).merge(
                Env::prefixed("TRANSFER_")
                    .split("__")
                    .map(|key| key.as_str().replace('_', "-").into()),
            ),
        )
    }

    /// Parse and validate configuration from TOML text, without env overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let file: FileConfig = figment.extract()?;
        Self::validate(file)
    }

    fn validate(file: FileConfig) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&format!("^(?:{COOKIE_NAME_PATTERN})$"))?;
        if !pattern.is_match(&file.cookie_name) {
            return Err(ConfigError::InvalidCookieName {
                name: file.cookie_name,
            });
        }

        if file.bungee_channel_name.is_empty()
            || file.bungee_channel_name.len() > MANUAL_PAYLOAD_OFFSET
        {
            return Err(ConfigError::InvalidChannelName {
                name: file.bungee_channel_name,
            });
        }

        let target = file
            .direct_connect_server_address
            .as_deref()
            .map(parse_address)
            .transpose()?;

        Ok(Self {
            direct_connect: file.direct_connect,
            target,
            cookie_name: file.cookie_name,
            channel_name: file.bungee_channel_name,
            marker_timeout_ms: file.marker_timeout_ms,
            tracing: file.tracing,
        })
    }

    /// Whether logins go through the marker round trip. A flag without a
    /// target address counts as disabled.
    pub fn direct_connect(&self) -> bool {
        self.direct_connect && self.target.is_some()
    }

    pub fn target(&self) -> Option<&TransferTarget> {
        self.target.as_ref()
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn marker_timeout(&self) -> Option<Duration> {
        self.marker_timeout_ms.map(Duration::from_millis)
    }

    pub fn tracing(&self) -> &TracingConfig {
        &self.tracing
    }
}

/// Parse `host:port`, accepting a bracketed IPv6 host.
fn parse_address(address: &str) -> Result<TransferTarget, ConfigError> {
    let invalid = |reason| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let (host, port) = address
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| invalid("port is not a number between 0 and 65535"))?;

    Ok(TransferTarget::new(host, port))
}
