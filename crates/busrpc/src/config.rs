// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client/server configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::router::RouterOptions;
use crate::topic::{is_valid_component, TopicScheme, DEFAULT_PREFIX, SEPARATOR};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Namespace and protocol version prefix of every topic.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Endpoint id this process serves under.
    #[serde(default = "default_endpoint_id")]
    pub endpoint_id: String,

    /// Caller id override (defaults to the transport client id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Timeout for calls made without an explicit one (ms, 0 = forever).
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Publish method announcements as retained messages.
    #[serde(default = "default_true")]
    pub announce_retained: bool,

    /// Include fault diagnostics in server-error replies.
    #[serde(default = "default_true")]
    pub expose_fault_details: bool,
}

fn default_topic_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_endpoint_id() -> String {
    "Driver".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
            endpoint_id: default_endpoint_id(),
            client_id: None,
            default_timeout_ms: default_timeout_ms(),
            announce_retained: true,
            expose_fault_details: true,
        }
    }
}

impl RpcConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.topic_prefix;
        if prefix.is_empty() || prefix == "/" {
            return Err(ConfigError::Invalid("Empty topic prefix".into()));
        }
        if prefix.contains(|c| matches!(c, '+' | '#')) {
            return Err(ConfigError::Invalid(format!(
                "Topic prefix '{}' contains a wildcard",
                prefix
            )));
        }
        if prefix.ends_with(SEPARATOR) {
            return Err(ConfigError::Invalid(format!(
                "Topic prefix '{}' ends with a separator",
                prefix
            )));
        }

        if !is_valid_component(&self.endpoint_id) {
            return Err(ConfigError::Invalid(format!(
                "Endpoint id '{}' is not a valid topic level",
                self.endpoint_id
            )));
        }
        if let Some(client_id) = &self.client_id {
            if !is_valid_component(client_id) {
                return Err(ConfigError::Invalid(format!(
                    "Client id '{}' is not a valid topic level",
                    client_id
                )));
            }
        }

        Ok(())
    }

    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    pub fn endpoint_id(mut self, id: impl Into<String>) -> Self {
        self.endpoint_id = id.into();
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// `None` waits forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout_ms = timeout.map_or(0, |t| {
            u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1)
        });
        self
    }

    pub fn announce_retained(mut self, enabled: bool) -> Self {
        self.announce_retained = enabled;
        self
    }

    pub fn expose_fault_details(mut self, enabled: bool) -> Self {
        self.expose_fault_details = enabled;
        self
    }

    /// Default call timeout, `None` meaning no limit.
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn topics(&self) -> TopicScheme {
        TopicScheme::new(self.topic_prefix.as_str())
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            expose_fault_details: self.expose_fault_details,
        }
    }
}
