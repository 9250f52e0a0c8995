//! HTTP tests for installation detail, history and inspection status.

mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;

use support::{get_json, router_for, sample_repository, sample_router, send_json};

#[tokio::test]
async fn test_installation_detail() {
    let (status, body) = get_json(sample_router(), "/api/installations/INST005").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["installation_id"], "INST005");
    assert_eq!(body["municipality"], "Parnamirim");
    assert_eq!(body["address"], "Rua 5, Parnamirim");
}

#[tokio::test]
async fn test_unknown_installation_is_404() {
    let (status, body) = get_json(sample_router(), "/api/installations/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["message"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn test_consumption_defaults_to_twelve_periods() {
    let (status, body) = get_json(sample_router(), "/api/installations/INST001/consumption").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["reference_date"], "2024-01-01");
    assert_eq!(rows[11]["reference_date"], "2024-12-01");
}

#[tokio::test]
async fn test_consumption_limit_keeps_most_recent_in_order() {
    let (status, body) = get_json(
        sample_router(),
        "/api/installations/INST002/consumption?limit=3",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["reference_date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-10-01", "2024-11-01", "2024-12-01"]);
}

#[tokio::test]
async fn test_consumption_limit_is_clamped() {
    let router = sample_router();
    let (_, body) = get_json(router.clone(), "/api/installations/INST001/consumption?limit=0").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = get_json(router, "/api/installations/INST001/consumption?limit=100000").await;
    assert_eq!(body.as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_non_numeric_limit_is_400() {
    let (status, _) = get_json(
        sample_router(),
        "/api/installations/INST001/consumption?limit=many",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_installation_sub_resources_are_empty() {
    let router = sample_router();
    for path in ["consumption", "frauds", "service-notes"] {
        let (status, body) = get_json(router.clone(), &format!("/api/installations/NOPE/{}", path)).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        assert_eq!(body, json!([]), "{}", path);
    }
}

#[tokio::test]
async fn test_frauds_and_service_notes() {
    let router = sample_router();

    let (status, body) = get_json(router.clone(), "/api/installations/INST001/frauds").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["fraud_type"], "Ligação direta");
    assert_eq!(body[0]["recovered_value"], 1250.0);

    let (status, body) = get_json(router, "/api/installations/INST001/service-notes?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let notes = body.as_array().unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["note_number"], "NS20240003");
}

#[tokio::test]
async fn test_status_from_fixture() {
    let (status, body) = get_json(sample_router(), "/api/installations/INST001/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "to_verify");
    assert_eq!(body["user"], "analista");
}

#[tokio::test]
async fn test_status_missing_is_404() {
    let (status, _) = get_json(sample_router(), "/api/installations/INST002/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_status_then_get() {
    let router = router_for(sample_repository());

    let (status, body) = send_json(
        router.clone(),
        Method::PUT,
        "/api/installations/INST001/status",
        json!({"status": "selected", "user": "maria", "notes": "Visita agendada"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "selected");
    assert_eq!(body["installation_id"], "INST001");

    let (_, current) = get_json(router.clone(), "/api/installations/INST001/status").await;
    assert_eq!(current["status"], "selected");
    assert_eq!(current["user"], "maria");
    assert_eq!(current["notes"], "Visita agendada");

    let (status, history) = get_json(router, "/api/installations/INST001/status/history").await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["selected", "to_verify"]);
}

#[tokio::test]
async fn test_put_status_accepts_portuguese_values() {
    let (status, body) = send_json(
        sample_router(),
        Method::PUT,
        "/api/installations/INST003/status",
        json!({"status": "nao_selecionado", "usuario": "joao"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_selected");
    assert_eq!(body["user"], "joao");
}

#[tokio::test]
async fn test_put_status_rejects_bad_input() {
    let router = sample_router();

    let (status, body) = send_json(
        router.clone(),
        Method::PUT,
        "/api/installations/INST001/status",
        json!({"status": "approved", "user": "maria"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send_json(
        router.clone(),
        Method::PUT,
        "/api/installations/INST001/status",
        json!({"status": "selected", "user": "   "}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        router,
        Method::PUT,
        "/api/installations/INST001/status",
        json!({"status": "selected"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_status_unknown_installation_is_404() {
    let router = sample_router();
    let (status, _) = send_json(
        router.clone(),
        Method::PUT,
        "/api/installations/NOPE/status",
        json!({"status": "selected", "user": "maria"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(router, "/api/installations/NOPE/status/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
