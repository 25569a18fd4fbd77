//! tests/routine_dispatch/startup.rs
//! Configuration problems that must stop the gateway before it serves.

#[path = "../mod.rs"]
mod common;

use pg_routine_gateway::config::{environment::EnvironmentVariables, state::AppState};
use pg_routine_gateway::database::registry::{ConnectionRegistry, RegistryError};
use pg_routine_gateway::routines::binder::BindError;
use pg_routine_gateway::routines::metadata::RoutineMetadata;

#[tokio::test]
async fn colliding_routine_paths_fail_startup() {
    let env: EnvironmentVariables = common::environment(&[]);
    let registry: ConnectionRegistry = ConnectionRegistry::from_environment(&env).unwrap();

    let result = AppState::from_parts(
        env,
        registry,
        vec![
            RoutineMetadata::new("public", "get_conn1"),
            RoutineMetadata::new("public", "GET_CONN1"),
        ],
    );

    let err: anyhow::Error = result.expect_err("duplicate paths must not bind");
    match err.downcast_ref::<BindError>() {
        Some(BindError::DuplicatePath { path, .. }) => assert_eq!(path, "/api/get-conn1"),
        other => panic!("expected DuplicatePath, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_default_connection_fails_startup() {
    let env: EnvironmentVariables = common::environment(&[
        ("CONNECTION_STRING", ""),
        ("CONNECTION_STRINGS__conn1", common::UNREACHABLE_DATABASE),
    ]);

    let result = ConnectionRegistry::from_environment(&env);
    assert!(matches!(result, Err(RegistryError::MissingDefault)));

    let init = AppState::initialize(env).await;
    assert!(init.is_err());
}

#[tokio::test]
async fn unknown_connection_names_do_not_fail_startup() {
    let env: EnvironmentVariables = common::environment(&[]);
    let registry: ConnectionRegistry = ConnectionRegistry::from_environment(&env).unwrap();

    let state = AppState::from_parts(
        env,
        registry,
        vec![RoutineMetadata::new("public", "get_conn3").with_comment("connection-name=conn3")],
    );

    assert!(state.is_ok());
}

#[tokio::test]
async fn routines_cannot_take_over_admin_paths() {
    let env: EnvironmentVariables = common::environment(&[("URL_PATH_PREFIX", "/")]);
    let registry: ConnectionRegistry = ConnectionRegistry::from_environment(&env).unwrap();

    let result = AppState::from_parts(
        env,
        registry,
        vec![RoutineMetadata::new("public", "endpoints").with_comment("connection-name=conn3")],
    );

    let err: anyhow::Error = result.expect_err("admin paths must stay reserved");
    match err.downcast_ref::<BindError>() {
        Some(BindError::ReservedPath { path, routine, .. }) => {
            assert_eq!(path, "/endpoints");
            assert_eq!(routine, "\"public\".\"endpoints\"");
        }
        other => panic!("expected ReservedPath, got {other:?}"),
    }
}
