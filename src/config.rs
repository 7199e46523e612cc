//! Configuration Module
//!
//! Cache construction options and server settings loaded from the environment.

use std::env;

use crate::error::{CacheError, Result};
use crate::store::Credentials;

/// Credentials used when the environment names none.
pub const DEVELOPMENT_CONNECTION_STRING: &str = "UseDevelopmentStorage=true";

// == Access Stamp ==
/// When a read writes the last-access stamp back to the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessStamp {
    /// Stamp every entry a read finds, then check expiry. Expired entries
    /// receive one last stamp right before they are deleted.
    #[default]
    BeforeExpiryCheck,
    /// Check expiry first and stamp only entries that are still live.
    LiveEntriesOnly,
}

// == Cache Config ==
/// Everything a `TableCache` needs to reach its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub credentials: Credentials,
    pub table_name: String,
    /// Partition holding every entry of this cache
    pub partition_key: String,
    pub access_stamp: AccessStamp,
}

impl CacheConfig {
    /// Shared-key credential path.
    pub fn with_shared_key(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            Credentials::SharedKey {
                account_name: account_name.into(),
                account_key: account_key.into(),
            },
            table_name,
            partition_key,
        )
    }

    /// Connection-string credential path.
    pub fn with_connection_string(
        connection_string: impl Into<String>,
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            Credentials::ConnectionString(connection_string.into()),
            table_name,
            partition_key,
        )
    }

    /// Validates and builds a config from explicit credentials.
    pub fn new(
        credentials: Credentials,
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            credentials,
            table_name: table_name.into(),
            partition_key: partition_key.into(),
            access_stamp: AccessStamp::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from loose optional fields, as read from a file or
    /// the environment. Exactly one credential path must be present.
    pub fn from_parts(
        account_name: Option<String>,
        account_key: Option<String>,
        connection_string: Option<String>,
        table_name: Option<String>,
        partition_key: Option<String>,
    ) -> Result<Self> {
        let shared_key = account_name.is_some() || account_key.is_some();

        let credentials = match (shared_key, connection_string) {
            (true, Some(_)) => {
                return Err(CacheError::Configuration(
                    "Supply either an account name and key or a connection string, not both".to_string(),
                ))
            }
            (true, None) => Credentials::SharedKey {
                account_name: account_name.unwrap_or_default(),
                account_key: account_key.unwrap_or_default(),
            },
            (false, Some(connection_string)) => Credentials::ConnectionString(connection_string),
            (false, None) => {
                return Err(CacheError::Configuration(
                    "No credentials supplied: set an account name and key or a connection string".to_string(),
                ))
            }
        };

        Self::new(
            credentials,
            table_name.unwrap_or_default(),
            partition_key.unwrap_or_default(),
        )
    }

    pub fn with_access_stamp(mut self, access_stamp: AccessStamp) -> Self {
        self.access_stamp = access_stamp;
        self
    }

    /// Checks that every mandatory field is present and non-empty.
    pub fn validate(&self) -> Result<()> {
        match &self.credentials {
            Credentials::SharedKey {
                account_name,
                account_key,
            } => {
                require("account_name", account_name)?;
                require("account_key", account_key)?;
            }
            Credentials::ConnectionString(connection_string) => {
                require("connection_string", connection_string)?;
            }
        }
        require("table_name", &self.table_name)?;
        require("partition_key", &self.partition_key)
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(CacheError::Configuration(format!("{} cannot be null or empty", name)))
    } else {
        Ok(())
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between sweeps of expired entries, 0 disables the sweeper
    pub sweep_interval: u64,
    pub table_name: String,
    pub partition_key: String,
    pub connection_string: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_TABLE_NAME` - Table holding cache rows (default: cache)
    /// - `CACHE_PARTITION_KEY` - Partition for this cache (default: default)
    /// - `AZURE_STORAGE_CONNECTION_STRING` - Connection string credentials
    /// - `AZURE_STORAGE_ACCOUNT` / `AZURE_STORAGE_KEY` - Shared-key credentials
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let account_name = non_empty_var("AZURE_STORAGE_ACCOUNT");
        let account_key = non_empty_var("AZURE_STORAGE_KEY");
        let mut connection_string = non_empty_var("AZURE_STORAGE_CONNECTION_STRING");
        if account_name.is_none() && account_key.is_none() && connection_string.is_none() {
            connection_string = defaults.connection_string;
        }

        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval),
            table_name: non_empty_var("CACHE_TABLE_NAME").unwrap_or(defaults.table_name),
            partition_key: non_empty_var("CACHE_PARTITION_KEY").unwrap_or(defaults.partition_key),
            connection_string,
            account_name,
            account_key,
        }
    }

    /// Validated cache options for the configured table and credentials.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        CacheConfig::from_parts(
            self.account_name.clone(),
            self.account_key.clone(),
            self.connection_string.clone(),
            Some(self.table_name.clone()),
            Some(self.partition_key.clone()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 60,
            table_name: "cache".to_string(),
            partition_key: "default".to_string(),
            connection_string: Some(DEVELOPMENT_CONNECTION_STRING.to_string()),
            account_name: None,
            account_key: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
