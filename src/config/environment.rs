// Start of file: /src/config/environment.rs

// * Environment configuration, loaded once at startup.
// * Connection strings are collected here; pools are built by the registry.

use std::{borrow::Cow, collections::BTreeMap, collections::HashMap};
// * anyhow for convenient error handling
use anyhow::{bail, Context, Result};
use tracing::warn;

// ! Default values for environment variables (used if variables aren't set):
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_BODY_SIZE: usize = 2_097_152; // 2MB
const DEFAULT_TIMEOUT: u64 = 30; // 30 seconds
const DEFAULT_URL_PATH_PREFIX: &str = "/api";
const DEFAULT_CATALOG_SCHEMAS: &str = "public";
const DEFAULT_APPLICATION_NAME: &str = "pg-routine-gateway";
const DEFAULT_POOL_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_POOL_MIN_CONNECTIONS: u32 = 0;
const DEFAULT_POOL_ACQUIRE_TIMEOUT: u64 = 5;
const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 30;

// ! Prefix for one-variable-per-connection configuration, e.g. CONNECTION_STRINGS__conn1
const NAMED_CONNECTION_PREFIX: &str = "CONNECTION_STRINGS__";

// * Pool sizing shared by every named connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    // ! Server-side statement_timeout; follows DEFAULT_TIMEOUT_SECONDS so a
    // ! timed-out request does not leave its statement holding the connection
    pub statement_timeout_seconds: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_POOL_MAX_CONNECTIONS,
            min_connections: DEFAULT_POOL_MIN_CONNECTIONS,
            acquire_timeout_seconds: DEFAULT_POOL_ACQUIRE_TIMEOUT,
            idle_timeout_seconds: DEFAULT_POOL_IDLE_TIMEOUT,
            statement_timeout_seconds: DEFAULT_TIMEOUT,
        }
    }
}

// * A struct containing all environment variables used by the app
#[derive(Clone)]
pub struct EnvironmentVariables {
    pub environment: Cow<'static, str>,
    pub host: Cow<'static, str>,
    pub port: u16,
    pub protocol: Cow<'static, str>,
    pub max_request_body_size: usize,
    pub default_timeout_seconds: u64,
    pub url_path_prefix: Cow<'static, str>,
    pub catalog_schemas: Vec<String>,
    pub application_name: Cow<'static, str>,
    // ! Default (unnamed) connection string. Required.
    pub connection_string: Option<String>,
    // * Named connection strings, keyed by the name used in routine directives
    pub connection_strings: BTreeMap<String, String>,
    pub pool: PoolSettings,
}

impl EnvironmentVariables {
    // * Loads environment variables.
    // * Only reads .env if ENVIRONMENT != "production".
    pub fn load() -> Result<Self> {
        // ? In non-production environments, attempt to load .env
        if std::env::var("ENVIRONMENT").unwrap_or_default() != "production" {
            dotenv::dotenv().ok();
        }

        // * Collect all environment vars from the system and .env
        let vars: HashMap<String, String> = std::env::vars()
            .chain(dotenv::vars())
            .collect();

        Self::from_vars(&vars)
    }

    // * Builds the configuration from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        // * A small helper closure to fetch a variable by key
        let get_var = |key: &str| vars.get(key).map(String::as_str);

        let default_timeout_seconds: u64 = get_var("DEFAULT_TIMEOUT_SECONDS")
            .map(|s| s.parse().context("Invalid DEFAULT_TIMEOUT_SECONDS"))
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self {
            environment: get_var("ENVIRONMENT")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or_else(|| {
                    warn!("Missing ENVIRONMENT, defaulting to '{DEFAULT_ENVIRONMENT}'");
                    Cow::Borrowed(DEFAULT_ENVIRONMENT)
                }),

            host: get_var("HOST")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(Cow::Borrowed(DEFAULT_HOST)),

            port: get_var("PORT")
                .map(|s| s.parse().context("Invalid PORT value"))
                .transpose()?
                .unwrap_or(DEFAULT_PORT),

            protocol: get_var("PROTOCOL")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(Cow::Borrowed(DEFAULT_PROTOCOL)),

            max_request_body_size: get_var("MAX_REQUEST_BODY_SIZE")
                .map(|s| s.parse().context("Invalid MAX_REQUEST_BODY_SIZE"))
                .transpose()?
                .unwrap_or(DEFAULT_MAX_BODY_SIZE),

            default_timeout_seconds,

            url_path_prefix: Cow::Owned(normalize_prefix(
                get_var("URL_PATH_PREFIX").unwrap_or(DEFAULT_URL_PATH_PREFIX),
            )),

            catalog_schemas: split_schemas(
                get_var("CATALOG_SCHEMAS").unwrap_or(DEFAULT_CATALOG_SCHEMAS),
            ),

            application_name: get_var("APPLICATION_NAME")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(Cow::Borrowed(DEFAULT_APPLICATION_NAME)),

            connection_string: get_var("CONNECTION_STRING")
                .filter(|s| !s.trim().is_empty())
                .map(str::to_owned),

            connection_strings: collect_connection_strings(vars)?,

            pool: PoolSettings {
                max_connections: get_var("POOL_MAX_CONNECTIONS")
                    .map(|s| s.parse().context("Invalid POOL_MAX_CONNECTIONS"))
                    .transpose()?
                    .unwrap_or(DEFAULT_POOL_MAX_CONNECTIONS),
                min_connections: get_var("POOL_MIN_CONNECTIONS")
                    .map(|s| s.parse().context("Invalid POOL_MIN_CONNECTIONS"))
                    .transpose()?
                    .unwrap_or(DEFAULT_POOL_MIN_CONNECTIONS),
                acquire_timeout_seconds: get_var("POOL_ACQUIRE_TIMEOUT_SECONDS")
                    .map(|s| s.parse().context("Invalid POOL_ACQUIRE_TIMEOUT_SECONDS"))
                    .transpose()?
                    .unwrap_or(DEFAULT_POOL_ACQUIRE_TIMEOUT),
                idle_timeout_seconds: get_var("POOL_IDLE_TIMEOUT_SECONDS")
                    .map(|s| s.parse().context("Invalid POOL_IDLE_TIMEOUT_SECONDS"))
                    .transpose()?
                    .unwrap_or(DEFAULT_POOL_IDLE_TIMEOUT),
                statement_timeout_seconds: default_timeout_seconds,
            },
        })
    }
}

// ! Connection strings carry passwords, so Debug prints names only
impl std::fmt::Debug for EnvironmentVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentVariables")
            .field("environment", &self.environment)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("default_timeout_seconds", &self.default_timeout_seconds)
            .field("url_path_prefix", &self.url_path_prefix)
            .field("catalog_schemas", &self.catalog_schemas)
            .field("application_name", &self.application_name)
            .field("connection_string", &self.connection_string.as_ref().map(|_| "<redacted>"))
            .field("connection_strings", &self.connection_strings.keys().collect::<Vec<_>>())
            .field("pool", &self.pool)
            .finish()
    }
}

// * Merges CONNECTION_STRINGS (JSON object) with CONNECTION_STRINGS__<name> variables.
// * Per-variable entries win over the JSON object.
fn collect_connection_strings(vars: &HashMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut named: BTreeMap<String, String> = BTreeMap::new();

    if let Some(raw) = vars.get("CONNECTION_STRINGS").filter(|s| !s.trim().is_empty()) {
        let parsed: BTreeMap<String, String> = serde_json::from_str(raw)
            .context("CONNECTION_STRINGS must be a JSON object of name -> connection string")?;
        named.extend(parsed);
    }

    for (key, value) in vars {
        if let Some(name) = key.strip_prefix(NAMED_CONNECTION_PREFIX) {
            named.insert(name.to_owned(), value.clone());
        }
    }

    // ? The empty name is reserved for CONNECTION_STRING
    if let Some(value) = named.remove("") {
        if !value.is_empty() {
            bail!("Named connection strings cannot use an empty name; use CONNECTION_STRING for the default connection");
        }
    }

    Ok(named)
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed: &str = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn split_schemas(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}


// End of file: /src/config/environment.rs
