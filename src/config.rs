use crate::auth::AuthProvider;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("indexScheduleInterval must be greater than zero")]
    ZeroInterval,

    #[error("instance identifier must not be empty")]
    EmptyIdentifier,

    #[error("instance identifier '{0}' is configured more than once")]
    DuplicateIdentifier(String),

    #[error("instance '{identifier}' uses {mode:?} but pattern '{pattern}' contains none of yyyy, MM, dd")]
    MissingDateToken {
        identifier: String,
        mode: IndexMode,
        pattern: String,
    },

    #[error("unsupported authentication type '{0}' (expected \"basic\" or \"bearer\")")]
    UnsupportedAuthentication(String),

    #[error("invalid authentication configuration of type {kind}: missing valid '{field}' value")]
    MissingCredential {
        kind: &'static str,
        field: &'static str,
    },

    #[error("failed to build HTTP client for instance '{identifier}': {source}")]
    Client {
        identifier: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Raw configuration as loaded from disk. Field names follow the camelCase
/// shape the event bus deployments already use.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_index_schedule_interval")]
    pub index_schedule_interval: u64,

    pub instances: Vec<InstanceConfig>,
}

// Default: Flush every 5 seconds
fn default_index_schedule_interval() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub identifier: String,

    #[serde(default)]
    pub flavour: Flavour,

    pub host: String,
    pub port: u16,
    pub index_mode: IndexMode,
    pub index_name_or_pattern: String,

    #[serde(default = "default_index_timestamp_field_name")]
    pub index_timestamp_field_name: String,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub ssl_trust_all: bool,

    #[serde(default)]
    pub authentication: Option<AuthenticationConfig>,
}

fn default_index_timestamp_field_name() -> String {
    "@timestamp".to_string()
}

// DESIGN CHOICE: Free-form credential map
// Each authentication type reads its own keys ("user"/"password" for basic,
// "token" for bearer), so the map stays untyped until the provider is built.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthenticationConfig {
    #[serde(rename = "type")]
    pub auth_type: String,

    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Selects the shape of the bulk endpoint URL.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    #[default]
    Standard,
    Alternate,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    #[serde(rename = "STATIC_NAME")]
    StaticName,
    #[serde(rename = "DATE_PATTERN_EVENT_TIMESTAMP")]
    DatePatternEventTime,
    #[serde(rename = "DATE_PATTERN_INDEX_TIMESTAMP")]
    DatePatternFlushTime,
}

impl IndexMode {
    pub fn is_date_pattern(self) -> bool {
        !matches!(self, IndexMode::StaticName)
    }
}

/// Validated, immutable settings for one destination.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub identifier: String,
    pub flavour: Flavour,
    pub host: String,
    pub port: u16,
    pub index_mode: IndexMode,
    pub index_name_or_pattern: String,
    pub index_timestamp_field_name: String,
    pub use_tls: bool,
    pub trust_all_certificates: bool,
    pub authentication: Option<AuthProvider>,
}

impl DestinationConfig {
    /// Scheme, host and port, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Request path of the bulk endpoint for this destination's flavour.
    pub fn bulk_path(&self) -> String {
        match self.flavour {
            Flavour::Standard => "/_bulk".to_string(),
            Flavour::Alternate => {
                format!("/v1/datasets/{}/elastic/_bulk", self.index_name_or_pattern)
            }
        }
    }

    pub fn bulk_url(&self) -> String {
        format!("{}{}", self.base_url(), self.bulk_path())
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn flush_interval(&self) -> Result<Duration, ConfigError> {
        if self.index_schedule_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Duration::from_millis(self.index_schedule_interval))
    }

    /// Resolves every instance into a [`DestinationConfig`], enforcing the
    /// per-instance invariants and identifier uniqueness.
    pub fn destinations(&self) -> Result<Vec<DestinationConfig>, ConfigError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.instances.len());

        for instance in &self.instances {
            let destination = instance.resolve()?;
            if !seen.insert(destination.identifier.clone()) {
                return Err(ConfigError::DuplicateIdentifier(destination.identifier));
            }
            resolved.push(destination);
        }

        Ok(resolved)
    }
}

impl InstanceConfig {
    fn resolve(&self) -> Result<DestinationConfig, ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::EmptyIdentifier);
        }

        let mut index_mode = self.index_mode;
        if self.flavour == Flavour::Alternate && index_mode.is_date_pattern() {
            warn!(
                identifier = %self.identifier,
                configured = ?index_mode,
                "alternate flavour only supports static index names, using STATIC_NAME"
            );
            index_mode = IndexMode::StaticName;
        }

        if index_mode.is_date_pattern() && !has_date_token(&self.index_name_or_pattern) {
            return Err(ConfigError::MissingDateToken {
                identifier: self.identifier.clone(),
                mode: index_mode,
                pattern: self.index_name_or_pattern.clone(),
            });
        }

        let authentication = self
            .authentication
            .as_ref()
            .map(AuthProvider::from_config)
            .transpose()?;

        Ok(DestinationConfig {
            identifier: self.identifier.clone(),
            flavour: self.flavour,
            host: self.host.clone(),
            port: self.port,
            index_mode,
            index_name_or_pattern: self.index_name_or_pattern.clone(),
            index_timestamp_field_name: self.index_timestamp_field_name.clone(),
            use_tls: self.ssl,
            // Only meaningful together with TLS
            trust_all_certificates: self.ssl && self.ssl_trust_all,
            authentication,
        })
    }
}

fn has_date_token(pattern: &str) -> bool {
    ["yyyy", "MM", "dd"].iter().any(|token| pattern.contains(token))
}
