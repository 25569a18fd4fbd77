// Application server configuration and setup

use std::time::Duration;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    error_handling::HandleErrorLayer,
};
use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tokio::{signal, net::TcpListener};
use listenfd::ListenFd;
use anyhow::Result;

use crate::config::{environment::EnvironmentVariables, state::AppState};
use crate::api::admin::admin_routes;
use crate::api::routines::dispatch_handler;
use crate::utils::error_handler::handle_global_error;

/// Creates and configures the application router with all middleware layers.
/// Anything not matched by an admin route is dispatched to the routine table.
pub fn create_app(state: AppState) -> Router {
    let env: &EnvironmentVariables = &state.environment;

    Router::new()
        .merge(admin_routes())
        .fallback(dispatch_handler)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_global_error))
                .layer(TimeoutLayer::new(Duration::from_secs(env.default_timeout_seconds)))
                .layer(DefaultBodyLimit::max(env.max_request_body_size))
        )
        .with_state(state.clone())
}

/// Sets up the TCP listener from environment or binds to new address
pub async fn setup_listener(state: &AppState) -> Result<TcpListener> {
    let env: &EnvironmentVariables = &state.environment;
    let mut listenfd: ListenFd = ListenFd::from_env();

    let listener: TcpListener = match listenfd.take_tcp_listener(0)? {
        Some(std_listener) => {
            std_listener.set_nonblocking(true)?;
            TcpListener::from_std(std_listener)?
        }
        None => {
            let addr: String = format!("{}:{}", env.host, env.port);
            TcpListener::bind(&addr).await?
        }
    };

    Ok(listener)
}

/// On SIGHUP: re-reads connection strings, then rescans the routine catalog.
/// Either step failing keeps what is currently installed.
#[cfg(unix)]
pub fn spawn_catalog_reloader(state: AppState) -> Result<()> {
    let mut hangup: signal::unix::Signal = signal::unix::signal(signal::unix::SignalKind::hangup())?;

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, reloading connections and routine catalog");

            match EnvironmentVariables::load() {
                Ok(environment) => {
                    if let Err(e) = state.reload_connections(&environment) {
                        tracing::error!("Connection reload failed, keeping current pools: {:#}", e);
                    }
                }
                Err(e) => tracing::error!("Could not re-read configuration: {:#}", e),
            }

            if let Err(e) = state.reload_catalog().await {
                tracing::error!("Catalog reload failed, keeping current endpoints: {:#}", e);
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_catalog_reloader(_state: AppState) -> Result<()> {
    Ok(())
}

/// Handles graceful shutdown signals (Ctrl+C and TERM)
pub async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Terminate signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate: std::future::Pending<()> = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutting down via Ctrl+C"),
        _ = terminate => tracing::info!("Shutting down via TERM signal"),
    }

    // Gracefully close database connections
    state.shutdown().await;
}
