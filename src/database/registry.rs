// =============================================================================
// CONNECTION REGISTRY - named PostgreSQL pools
// =============================================================================

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use thiserror::Error;
use tracing::{debug, info, log::LevelFilter};

use crate::config::environment::{EnvironmentVariables, PoolSettings};

/// Registry key of the default (unnamed) connection
pub const DEFAULT_CONNECTION: &str = "";

// =============================================================================
// ERRORS
// =============================================================================

/// Startup-time registry failures. The process must not start.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No default connection configured; set CONNECTION_STRING")]
    MissingDefault,

    #[error("Invalid connection string for connection '{name}': {source}")]
    InvalidConnectionString {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// A routine asked for a connection name the registry does not know.
/// The message is matched verbatim by clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Connection name {name} could not be found in options ConnectionStrings dictionary.")]
pub struct ResolutionError {
    pub name: String,
}

// =============================================================================
// CONNECTION SOURCE
// =============================================================================

/// A named pool. Cloning is cheap; clones share the same pool.
#[derive(Clone, Debug)]
pub struct ConnectionSource {
    name: String,
    pool: PgPool,
}

impl ConnectionSource {
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self { name: name.into(), pool }
    }

    /// Builds a lazily-connecting pool from a connection string.
    /// No connection is opened until the first acquisition.
    pub fn from_connection_string(
        name: &str,
        connection_string: &str,
        settings: &PoolSettings,
        application_name: &str,
    ) -> Result<Self, RegistryError> {
        let options: PgConnectOptions = connect_options(connection_string, application_name, settings)
            .map_err(|source| RegistryError::InvalidConnectionString {
                name: name.to_owned(),
                source,
            })?;

        let pool: PgPool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_seconds))
            .connect_lazy_with(options);

        Ok(Self::new(name, pool))
    }

    /// Registry name; empty for the default connection
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in logs and error messages
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "default" } else { &self.name }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parses a connection string and applies the gateway's session defaults.
/// `application_name` and `statement_timeout` are only set when the
/// connection string leaves them out.
fn connect_options(
    connection_string: &str,
    application_name: &str,
    settings: &PoolSettings,
) -> Result<PgConnectOptions, sqlx::Error> {
    let mut options: PgConnectOptions = PgConnectOptions::from_str(connection_string)?
        .log_statements(LevelFilter::Debug);

    if options.get_application_name().is_none() {
        options = options.application_name(application_name);
    }

    let sets_statement_timeout: bool = options
        .get_options()
        .is_some_and(|existing| existing.contains("statement_timeout"));

    // ? 0 leaves the server default (no limit) in place
    if settings.statement_timeout_seconds > 0 && !sets_statement_timeout {
        let millis: u64 = settings.statement_timeout_seconds.saturating_mul(1000);
        options = options.options([("statement_timeout", millis)]);
    }

    Ok(options)
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Immutable map of connection name to pooled source.
/// The default connection is always present.
#[derive(Debug)]
pub struct ConnectionRegistry {
    sources: HashMap<String, ConnectionSource>,
}

/// Collects sources before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    sources: HashMap<String, ConnectionSource>,
}

impl RegistryBuilder {
    /// Adds a named source. Registering a name twice replaces the earlier source.
    pub fn register(mut self, name: impl Into<String>, source: ConnectionSource) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    /// Freezes the registry. Fails when no default source was registered.
    pub fn build(self) -> Result<ConnectionRegistry, RegistryError> {
        if !self.sources.contains_key(DEFAULT_CONNECTION) {
            return Err(RegistryError::MissingDefault);
        }

        Ok(ConnectionRegistry { sources: self.sources })
    }
}

impl ConnectionRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds one lazy pool per configured connection string.
    /// Named connections default their `application_name` to their own name.
    pub fn from_environment(env: &EnvironmentVariables) -> Result<Self, RegistryError> {
        let default_string: &str = env
            .connection_string
            .as_deref()
            .ok_or(RegistryError::MissingDefault)?;

        let mut builder: RegistryBuilder = Self::builder().register(
            DEFAULT_CONNECTION,
            ConnectionSource::from_connection_string(
                DEFAULT_CONNECTION,
                default_string,
                &env.pool,
                &env.application_name,
            )?,
        );

        for (name, connection_string) in &env.connection_strings {
            debug!(connection = %name, "Registering named connection");
            builder = builder.register(
                name.clone(),
                ConnectionSource::from_connection_string(name, connection_string, &env.pool, name)?,
            );
        }

        let registry: ConnectionRegistry = builder.build()?;
        info!("Connection registry built with {} named connections", registry.named().len());
        Ok(registry)
    }

    /// Returns the source for `name`; the empty name is the default connection
    pub fn resolve(&self, name: &str) -> Result<&ConnectionSource, ResolutionError> {
        self.sources.get(name).ok_or_else(|| ResolutionError {
            name: name.to_owned(),
        })
    }

    pub fn default_source(&self) -> &ConnectionSource {
        // ? build() guarantees the default entry
        &self.sources[DEFAULT_CONNECTION]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Sorted names of the non-default connections
    pub fn named(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .sources
            .keys()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .collect();
        names.sort_unstable();
        names
    }

    /// Closes every pool, waiting for checked-out connections to come back
    pub async fn close(&self) {
        for source in self.sources.values() {
            source.pool.close().await;
            debug!(connection = %source.display_name(), "Connection pool closed");
        }
    }
}

// =============================================================================
// SHARED SNAPSHOT
// =============================================================================

/// Process-wide handle on the current registry snapshot.
/// Readers load without locking; `install` swaps in a whole new registry.
#[derive(Clone, Debug)]
pub struct SharedRegistry {
    current: Arc<ArcSwap<ConnectionRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    pub fn load(&self) -> Arc<ConnectionRegistry> {
        self.current.load_full()
    }

    /// Replaces the snapshot and returns the previous one.
    /// Requests already holding the old snapshot keep using it.
    pub fn install(&self, registry: ConnectionRegistry) -> Arc<ConnectionRegistry> {
        self.current.swap(Arc::new(registry))
    }
}
