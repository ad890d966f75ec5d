//! Configuration types for the ibdns system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::record::RecordDescriptor;

/// Default WAPI version used when none is configured
pub const DEFAULT_WAPI_VERSION: &str = "2.7";

/// Default HTTP timeout for store requests, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Main ibdns configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IbdnsConfig {
    /// Record store configuration
    pub store: StoreConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,
}

impl IbdnsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.state_store.validate()?;
        Ok(())
    }
}

/// Record store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Infoblox WAPI
    Infoblox {
        /// Grid master URL (e.g., "https://gridmaster.example.com")
        url: String,
        /// WAPI username
        username: String,
        /// WAPI password
        password: String,
        /// WAPI version (e.g., "2.7")
        #[serde(default = "default_wapi_version")]
        wapi_version: String,
        /// Verify the server's TLS certificate
        #[serde(default = "default_ssl_verify")]
        ssl_verify: bool,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Infoblox {
                url,
                username,
                password,
                wapi_version,
                timeout_secs,
                ..
            } => {
                if url.is_empty() {
                    return Err(crate::Error::config("Infoblox URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Infoblox URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if username.is_empty() {
                    return Err(crate::Error::config("Infoblox username cannot be empty"));
                }
                if password.is_empty() {
                    return Err(crate::Error::config("Infoblox password cannot be empty"));
                }
                if wapi_version.is_empty() {
                    return Err(crate::Error::config("WAPI version cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("Store timeout must be > 0"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Infoblox { .. } => "infoblox",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Infoblox {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            wapi_version: default_wapi_version(),
            ssl_verify: default_ssl_verify(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Keeps the password out of logs
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Infoblox {
                url,
                username,
                wapi_version,
                ssl_verify,
                timeout_secs,
                ..
            } => f
                .debug_struct("Infoblox")
                .field("url", url)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("wapi_version", wapi_version)
                .field("ssl_verify", ssl_verify)
                .field("timeout_secs", timeout_secs)
                .finish(),
            StoreConfig::Custom { factory, config } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", config)
                .finish(),
        }
    }
}

fn default_wapi_version() -> String {
    DEFAULT_WAPI_VERSION.to_string()
}

fn default_ssl_verify() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Desired records, keyed by resource name
///
/// ```json
/// {
///   "records": {
///     "web": {"type": "A", "name": "www", "domain": "example.com", "value": "10.0.0.5"}
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesFile {
    #[serde(default)]
    pub records: BTreeMap<String, RecordDescriptor>,
}

impl ResourcesFile {
    /// Parse a resources document
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        let resources: ResourcesFile = serde_json::from_str(content)?;
        resources.validate()?;
        Ok(resources)
    }

    /// Load and parse a resources file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            crate::Error::config(format!(
                "Failed to read resources file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Check the required attributes of every resource
    ///
    /// The record type is checked when the record is reconciled, not here.
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (resource, desc) in &self.records {
            if resource.is_empty() {
                return Err(crate::Error::config("Resource name cannot be empty"));
            }
            if desc.name.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: name is required",
                    resource
                )));
            }
            if desc.domain.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: domain is required",
                    resource
                )));
            }
            if desc.value.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: value is required",
                    resource
                )));
            }
        }
        Ok(())
    }
}
