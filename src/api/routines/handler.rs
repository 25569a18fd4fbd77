// Catch-all handler that dispatches to bound routine endpoints

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use tracing::{instrument, info};

use crate::config::state::AppState;

/// Looks the request path up in the endpoint table and runs the routine.
/// Routine responses are plain text or raw JSON, never the admin envelope.
#[instrument(skip_all, fields(%method, path = %uri.path()))]
pub async fn dispatch_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    match state.dispatcher.dispatch(&method, uri.path(), query, &body).await {
        Ok(output) => {
            info!("Routine call succeeded");
            output.into_response()
        }
        Err(err) => err.into_response(),
    }
}
