// Gateway admin endpoints: health and bound endpoint listing

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use axum::{http::StatusCode, extract::State};

use crate::config::state::AppState;
use crate::database::registry::ConnectionRegistry;
use crate::routines::binder::EndpointTable;
use crate::routines::metadata::{ReturnKind, Volatility};
use crate::utils::response_handler::HandlerResponse;
use tracing::{instrument, info, warn};

#[derive(Debug, Serialize)]
pub struct EndpointSummary {
    pub method: String,
    pub path: String,
    pub routine: String,
    /// Connection name, "default" when the routine has no directive
    pub connection: String,
    /// Whether the connection name resolves against the current registry
    pub resolvable: bool,
    pub volatility: Volatility,
    pub returns: ReturnKind,
    pub returns_set: bool,
}

/// Checks the default connection with a trivial round-trip
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> HandlerResponse {
    info!("Health check called");

    let registry: Arc<ConnectionRegistry> = state.dispatcher.registry().load();
    let probe = sqlx::query_scalar::<_, i32>("select 1")
        .fetch_one(registry.default_source().pool())
        .await;

    match probe {
        Ok(_) => HandlerResponse::new(StatusCode::OK)
            .data(json!({
                "database": "connected",
                "environment": &*state.environment.environment,
                "named_connections": registry.named(),
                "endpoints": state.dispatcher.endpoints().load().len()
            }))
            .message("Default connection healthy"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            HandlerResponse::new(StatusCode::SERVICE_UNAVAILABLE)
                .data(json!({ "database": "disconnected", "error": e.to_string() }))
                .message("Default connection failed")
        }
    }
}

/// Lists every bound endpoint with its connection and resolution status
#[instrument(skip(state))]
pub async fn list_endpoints(State(state): State<AppState>) -> HandlerResponse {
    let table: Arc<EndpointTable> = state.dispatcher.endpoints().load();
    let registry: Arc<ConnectionRegistry> = state.dispatcher.registry().load();

    let endpoints: Vec<EndpointSummary> = table
        .descriptors()
        .into_iter()
        .map(|descriptor| EndpointSummary {
            method: descriptor.method.to_string(),
            path: descriptor.path.clone(),
            routine: descriptor.routine.qualified_name(),
            connection: if descriptor.connection.is_empty() {
                "default".to_owned()
            } else {
                descriptor.connection.clone()
            },
            resolvable: registry.contains(&descriptor.connection),
            volatility: descriptor.routine.volatility,
            returns: descriptor.routine.returns,
            returns_set: descriptor.routine.returns_set,
        })
        .collect();

    HandlerResponse::new(StatusCode::OK)
        .message(format!("{} endpoints bound", endpoints.len()))
        .data(json!(endpoints))
}
