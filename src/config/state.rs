// Application state shared by every handler

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::api::admin::ADMIN_PATHS;
use crate::config::environment::EnvironmentVariables;
use crate::database::catalog::PgCatalog;
use crate::database::registry::{ConnectionRegistry, SharedRegistry};
use crate::routines::binder::{bind, BindOptions, EndpointTable, SharedEndpoints};
use crate::routines::dispatcher::Dispatcher;
use crate::routines::metadata::RoutineMetadata;

#[derive(Debug, Clone)]
pub struct AppState {
    pub environment: Arc<EnvironmentVariables>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Builds the registry, scans the catalog through the default connection
    /// and binds every routine. Any failure here aborts startup.
    #[instrument(skip_all)]
    pub async fn initialize(environment: EnvironmentVariables) -> Result<Self> {
        let registry: ConnectionRegistry = ConnectionRegistry::from_environment(&environment)
            .context("Failed to build connection registry")?;

        let routines: Vec<RoutineMetadata> =
            PgCatalog::scan(registry.default_source().pool(), &environment.catalog_schemas).await?;

        Self::from_parts(environment, registry, routines)
    }

    /// Assembles state from an already-built registry and routine list
    pub fn from_parts(
        environment: EnvironmentVariables,
        registry: ConnectionRegistry,
        routines: Vec<RoutineMetadata>,
    ) -> Result<Self> {
        let table: EndpointTable = bind(routines, &registry.named(), &bind_options(&environment))
            .context("Failed to bind routine endpoints")?;

        let dispatcher: Dispatcher = Dispatcher::new(SharedEndpoints::new(table), SharedRegistry::new(registry));

        Ok(Self {
            environment: Arc::new(environment),
            dispatcher,
        })
    }

    /// Rescans the catalog and swaps in a freshly bound endpoint table.
    /// On failure the current table stays in place.
    #[instrument(skip(self))]
    pub async fn reload_catalog(&self) -> Result<usize> {
        let registry: Arc<ConnectionRegistry> = self.dispatcher.registry().load();

        let routines: Vec<RoutineMetadata> =
            PgCatalog::scan(registry.default_source().pool(), &self.environment.catalog_schemas).await?;

        let table: EndpointTable = bind(routines, &registry.named(), &bind_options(&self.environment))
            .context("Failed to bind routine endpoints")?;

        let count: usize = table.len();
        self.dispatcher.endpoints().install(table);

        info!("Catalog reloaded with {} endpoints", count);
        Ok(count)
    }

    /// Rebuilds every pool from freshly loaded configuration and swaps the
    /// registry in one step. Requests that already loaded the old registry
    /// finish on it; its pools are closed in the background.
    #[instrument(skip_all)]
    pub fn reload_connections(&self, environment: &EnvironmentVariables) -> Result<()> {
        let registry: ConnectionRegistry = ConnectionRegistry::from_environment(environment)
            .context("Failed to rebuild connection registry")?;
        let named: usize = registry.named().len();

        let previous: Arc<ConnectionRegistry> = self.dispatcher.registry().install(registry);
        tokio::spawn(async move {
            previous.close().await;
        });

        info!("Connection registry reloaded with {} named connections", named);
        Ok(())
    }

    /// Gracefully close every connection pool
    pub async fn shutdown(&self) {
        info!("Closing connection pools...");
        self.dispatcher.registry().load().close().await;
    }
}

fn bind_options(environment: &EnvironmentVariables) -> BindOptions {
    BindOptions {
        url_path_prefix: environment.url_path_prefix.to_string(),
        reserved_paths: ADMIN_PATHS.iter().map(|path| path.to_string()).collect(),
    }
}
