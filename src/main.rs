// Start of file: src/main.rs

use axum::{Router, serve};
use tokio::net::TcpListener;
use anyhow::Context;

use pg_routine_gateway::config::{environment::EnvironmentVariables, state::AppState};
use pg_routine_gateway::core::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up logging
    logging::init_tracing();

    let environment: EnvironmentVariables = EnvironmentVariables::load()?;
    tracing::debug!("Loaded environment configuration: {:#?}", environment);

    // ! Registry, catalog scan and binding must all succeed before serving
    let state: AppState = AppState::initialize(environment)
        .await
        .context("Gateway startup failed")?;

    server::spawn_catalog_reloader(state.clone())?;

    // build our router
    let app: Router = server::create_app(state.clone());
    let listener: TcpListener = server::setup_listener(&state).await?;

    tracing::info!(
        "Server listening on: {}://{}{}",
        state.environment.protocol,
        listener.local_addr()?,
        state.environment.url_path_prefix
    );

    serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal(state))
        .await?;

    Ok(())
}

// End of file: src/main.rs
