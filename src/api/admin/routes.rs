// Admin route definitions

use axum::{routing::get, Router};

use crate::config::state::AppState;
use super::handler;

pub const HEALTH_PATH: &str = "/health";
pub const ENDPOINTS_PATH: &str = "/endpoints";

/// Paths owned by the gateway; no routine may bind to them
pub const ADMIN_PATHS: [&str; 2] = [HEALTH_PATH, ENDPOINTS_PATH];

/// Creates router with the gateway's own endpoints
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(HEALTH_PATH, get(handler::health_check))
        .route(ENDPOINTS_PATH, get(handler::list_endpoints))
}
