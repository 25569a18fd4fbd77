//! tests/routine_dispatch/missing_connection.rs
//! A routine naming an unregistered connection fails per request with the
//! exact compatibility message, without touching any pool.

#[path = "../mod.rs"]
mod common;

use pg_routine_gateway::config::environment::EnvironmentVariables;
use pg_routine_gateway::routines::metadata::RoutineMetadata;
use reqwest::StatusCode;

fn missing_message(name: &str) -> String {
    format!("Connection name {name} could not be found in options ConnectionStrings dictionary.")
}

#[tokio::test]
async fn returns_500_with_exact_body_for_unregistered_connection() {
    let base_url: String = common::spawn_app(
        vec![RoutineMetadata::new("public", "get_conn3").with_comment("connection-name=conn3")],
        &["conn1", "conn2"],
    )
    .await;

    let resp: reqwest::Response = reqwest::Client::new()
        .get(format!("{}/api/get-conn3", base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain")));

    let body: String = resp.text().await.unwrap();
    assert_eq!(body, missing_message("conn3"));
}

#[tokio::test]
async fn every_directive_spelling_reports_the_same_name() {
    let base_url: String = common::spawn_app(
        vec![
            RoutineMetadata::new("public", "get_a").with_comment("connection_name=absent"),
            RoutineMetadata::new("public", "get_b").with_comment("connection=absent"),
            RoutineMetadata::new("public", "get_c").with_comment("Docs first.\nconnection-name=absent"),
        ],
        &[],
    )
    .await;

    let client: reqwest::Client = reqwest::Client::new();
    for path in ["get-a", "get-b", "get-c"] {
        let resp: reqwest::Response = client
            .get(format!("{}/api/{}", base_url, path))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "path {path}");
        assert_eq!(resp.text().await.unwrap(), missing_message("absent"), "path {path}");
    }
}

#[tokio::test]
async fn parallel_callers_each_see_their_own_connection_name() {
    let names: Vec<String> = (0..8).map(|i| format!("missing{i}")).collect();
    let routines: Vec<RoutineMetadata> = names
        .iter()
        .map(|name| {
            RoutineMetadata::new("public", format!("get_{name}"))
                .with_comment(format!("connection_name={name}"))
        })
        .collect();

    let base_url: String = common::spawn_app(routines, &[]).await;
    let client: reqwest::Client = reqwest::Client::new();

    let mut handles = Vec::new();
    for round in 0..4 {
        for name in &names {
            let client: reqwest::Client = client.clone();
            let url: String = format!("{}/api/get-{}", base_url, name);
            let expected: String = missing_message(name);

            handles.push(tokio::spawn(async move {
                let resp: reqwest::Response = client.get(url).send().await.expect("request failed");
                assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(resp.text().await.unwrap(), expected, "round {round}");
            }));
        }
    }

    for handle in handles {
        handle.await.expect("caller task panicked");
    }
}

#[tokio::test]
async fn unresolved_endpoints_are_flagged_in_the_listing() {
    let base_url: String = common::spawn_app(
        vec![
            RoutineMetadata::new("public", "get_conn1").with_comment("connection_name=conn1"),
            RoutineMetadata::new("public", "get_conn3").with_comment("connection-name=conn3"),
        ],
        &["conn1"],
    )
    .await;

    let body: String = reqwest::get(format!("{}/endpoints", base_url))
        .await
        .expect("Failed to execute request.")
        .text()
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(json["status"], "OK");
    assert_eq!(json["code"], 200);

    let endpoints = json["data"].as_array().expect("endpoint list");
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0]["path"], "/api/get-conn1");
    assert_eq!(endpoints[0]["resolvable"], true);
    assert_eq!(endpoints[1]["path"], "/api/get-conn3");
    assert_eq!(endpoints[1]["connection"], "conn3");
    assert_eq!(endpoints[1]["resolvable"], false);
}

#[tokio::test]
async fn reloaded_registry_resolves_a_previously_missing_connection() {
    let (base_url, state) = common::spawn_app_with_state(
        vec![RoutineMetadata::new("public", "get_conn3").with_comment("connection-name=conn3")],
        &["conn1"],
    )
    .await;
    let client: reqwest::Client = reqwest::Client::new();

    let before: reqwest::Response = client
        .get(format!("{}/api/get-conn3", base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(before.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(before.text().await.unwrap(), missing_message("conn3"));

    let reloaded: EnvironmentVariables =
        common::environment(&[("CONNECTION_STRINGS", &common::connection_strings(&["conn1", "conn3"]))]);
    state.reload_connections(&reloaded).expect("reload should succeed");

    // conn3 now resolves; its database is unreachable, so acquisition fails instead
    let after: reqwest::Response = client
        .get(format!("{}/api/get-conn3", base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(after.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_ne!(after.text().await.unwrap(), missing_message("conn3"));
}

#[tokio::test]
async fn failed_registry_reload_keeps_the_current_connections() {
    let (base_url, state) = common::spawn_app_with_state(
        vec![RoutineMetadata::new("public", "get_conn3").with_comment("connection-name=conn3")],
        &["conn3"],
    )
    .await;

    let without_default: EnvironmentVariables = common::environment(&[("CONNECTION_STRING", "")]);
    assert!(state.reload_connections(&without_default).is_err());
    assert!(state.dispatcher.registry().load().contains("conn3"));

    let resp: reqwest::Response = reqwest::Client::new()
        .get(format!("{}/api/get-conn3", base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
