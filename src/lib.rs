// Library root for the PostgreSQL routine gateway

pub mod api;
pub mod config;
pub mod core;
pub mod database;
pub mod routines;
pub mod utils;

pub use crate::config::environment::EnvironmentVariables;
pub use crate::config::state::AppState;
pub use crate::database::{ConnectionRegistry, ConnectionSource};
pub use crate::routines::{Dispatcher, RoutineMetadata};
