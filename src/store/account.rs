//! Storage Account Module
//!
//! Turns the configured credential path into a resolved account.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{CacheError, Result};

/// Account name of the local storage emulator.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Published key of the local storage emulator.
const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEVELOPMENT_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

// == Credentials ==
/// The two ways a cache can authenticate to the table service.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Account name plus base64 shared key
    SharedKey {
        account_name: String,
        account_key: String,
    },
    /// A `Key=Value;` connection string
    ConnectionString(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("account_key", &"<redacted>")
                .finish(),
            Credentials::ConnectionString(_) => f.write_str("ConnectionString(<redacted>)"),
        }
    }
}

// == Storage Account ==
/// A resolved account: who we are and where the table endpoint lives.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub name: String,
    /// Decoded shared key
    pub key: Vec<u8>,
    pub table_endpoint: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("table_endpoint", &self.table_endpoint)
            .finish_non_exhaustive()
    }
}

impl StorageAccount {
    /// Resolves credentials into an account.
    ///
    /// Malformed keys or connection strings fail with `CacheError::Connection`.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        match credentials {
            Credentials::SharedKey {
                account_name,
                account_key,
            } => Ok(Self {
                name: account_name.clone(),
                key: decode_key(account_key)?,
                table_endpoint: format!("https://{}.table.{}", account_name, DEFAULT_ENDPOINT_SUFFIX),
            }),
            Credentials::ConnectionString(connection_string) => Self::parse(connection_string),
        }
    }

    // == Parse Connection String ==
    /// Parses a `Key=Value;` connection string. Keys are case-insensitive.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut name = None;
        let mut key = None;
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_string();
        let mut table_endpoint = None;
        let mut development = false;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (setting, value) = part
                .split_once('=')
                .ok_or_else(|| CacheError::Connection(format!("Malformed connection string setting '{}'", setting_name(part))))?;
            let value = value.trim();

            match setting.trim().to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "accountname" => name = Some(value.to_string()),
                "accountkey" => key = Some(value.to_string()),
                "endpointsuffix" => suffix = value.to_string(),
                "tableendpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
                "usedevelopmentstorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Ok(Self {
                name: DEVELOPMENT_ACCOUNT_NAME.to_string(),
                key: decode_key(DEVELOPMENT_ACCOUNT_KEY)?,
                table_endpoint: table_endpoint.unwrap_or_else(|| DEVELOPMENT_TABLE_ENDPOINT.to_string()),
            });
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CacheError::Connection("Connection string is missing AccountName".to_string()))?;
        let key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CacheError::Connection("Connection string is missing AccountKey".to_string()))?;

        if protocol != "https" && protocol != "http" {
            return Err(CacheError::Connection(format!("Unsupported protocol '{}'", protocol)));
        }

        let table_endpoint =
            table_endpoint.unwrap_or_else(|| format!("{}://{}.table.{}", protocol, name, suffix));

        Ok(Self {
            key: decode_key(&key)?,
            name,
            table_endpoint,
        })
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(key.trim())
        .map_err(|e| CacheError::Connection(format!("Account key is not valid base64: {}", e)))
}

/// Setting name without its value, so secrets never reach error messages.
fn setting_name(part: &str) -> &str {
    part.split('=').next().unwrap_or_default()
}
