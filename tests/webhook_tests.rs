/// Router-level tests of the webhook endpoint contract: always HTTP 200,
/// status envelopes, and the dedup gate.
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use geodesist_dispatch::config::Config;
use geodesist_dispatch::crm_client::AmoCrmClient;
use geodesist_dispatch::dedup::DedupGuard;
use geodesist_dispatch::handlers::AppState;
use geodesist_dispatch::messaging::WappiMaxClient;
use geodesist_dispatch::pipeline::Dispatcher;
use geodesist_dispatch::status_resolver::StatusResolver;
use geodesist_dispatch::webhook_handler;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config() -> Config {
    Config {
        port: 8000,
        amocrm_domain: "example.amocrm.ru".to_string(),
        amocrm_access_token: "test_amo_token".to_string(),
        wappi_api_token: "test_wappi_token".to_string(),
        wappi_profile_id: "test_profile".to_string(),
        wappi_base_url: "https://wappi.pro".to_string(),
        assigned_status_name: "Assigned".to_string(),
        geodesist_field_name: "Геодезист".to_string(),
        work_type_field_name: "Тип работ".to_string(),
        address_field_name: "Адрес".to_string(),
        time_field_name: "Время выезда".to_string(),
        cadastral_field_names: vec!["Кадастровый номер".to_string()],
    }
}

/// Router wired to a mock CRM whose lead sits in a non-watched status, so
/// spawned background runs stop silently and tests stay deterministic.
async fn test_app(crm_server: &MockServer) -> Router {
    Mock::given(method("GET"))
        .and(path("/leads/555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 555, "status_id": 41, "pipeline_id": 9
        })))
        .mount(crm_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/leads/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"pipelines": [
                {"id": 9, "_embedded": {"statuses": [{"id": 42, "name": "Assigned"}]}}
            ]}
        })))
        .mount(crm_server)
        .await;

    let crm = AmoCrmClient::new(crm_server.uri(), "test_amo_token".to_string()).unwrap();
    let wappi = WappiMaxClient::new(
        "https://wappi.invalid".to_string(),
        "t".to_string(),
        "p".to_string(),
    )
    .unwrap();
    let resolver = StatusResolver::new(crm.clone());
    let dispatcher = Arc::new(Dispatcher::new(
        crm,
        wappi,
        resolver,
        Arc::new(create_test_config()),
    ));

    let state = Arc::new(AppState {
        config: create_test_config(),
        dedup: DedupGuard::new(),
        dispatcher,
    });

    Router::new()
        .route(
            "/webhook/amocrm/geodesist-assigned",
            post(webhook_handler::geodesist_assigned),
        )
        .with_state(state)
}

async fn post_webhook(app: Router, content_type: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/amocrm/geodesist-assigned")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn json_delivery_is_accepted() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) = post_webhook(
        app,
        "application/json",
        r#"{"lead_id": "555", "pipeline_id": "9"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "processing", "lead_id": 555}));
}

#[tokio::test]
async fn form_delivery_is_accepted() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) = post_webhook(
        app,
        "application/x-www-form-urlencoded",
        "leads%5Bstatus%5D%5B0%5D%5Bid%5D=555&leads%5Bstatus%5D%5B0%5D%5Bstatus_id%5D=42",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "processing", "lead_id": 555}));
}

#[tokio::test]
async fn identical_redelivery_is_deduplicated() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;
    let payload = "leads%5Bstatus%5D%5B0%5D%5Bid%5D=555&leads%5Bstatus%5D%5B0%5D%5Bstatus_id%5D=42&leads%5Bstatus%5D%5B0%5D%5Bupdated_at%5D=1700000000";

    let (status, body) =
        post_webhook(app.clone(), "application/x-www-form-urlencoded", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let (status, body) = post_webhook(app, "application/x-www-form-urlencoded", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored", "reason": "duplicate"}));
}

#[tokio::test]
async fn distinct_transitions_are_not_deduplicated() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (_, body) = post_webhook(
        app.clone(),
        "application/json",
        r#"{"lead_id": 555, "status_id": 41}"#,
    )
    .await;
    assert_eq!(body["status"], "processing");

    let (_, body) = post_webhook(
        app,
        "application/json",
        r#"{"lead_id": 555, "status_id": 42}"#,
    )
    .await;
    assert_eq!(body["status"], "processing");
}

#[tokio::test]
async fn missing_lead_id_answers_200_with_reason() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) = post_webhook(app, "application/json", r#"{"foo": 1}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "error", "reason": "lead_id_required"}));
}

#[tokio::test]
async fn non_numeric_lead_id_answers_200_with_reason() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) =
        post_webhook(app, "application/json", r#"{"lead_id": "abc"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "error", "reason": "lead_id_invalid"}));
}

#[tokio::test]
async fn form_without_lead_id_answers_200_with_reason() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) = post_webhook(
        app,
        "application/x-www-form-urlencoded",
        "account%5Bid%5D=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "error", "reason": "no_lead_id"}));
}

#[tokio::test]
async fn garbage_json_answers_bare_error_envelope() {
    let crm_server = MockServer::start().await;
    let app = test_app(&crm_server).await;

    let (status, body) = post_webhook(app, "application/json", "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "error"}));
}
