//! HTTP surface, exercised in-process.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use provenance_mint::ledger::{
    AssetName, AssetUnit, GatewayError, OutputRef, PolicyId, RejectionKind, SpendableInput,
    TxHash, Value,
};
use provenance_mint::{HttpServer, Shutdown};

mod common;
use common::{
    network_error, pure_input, test_config, ScriptedFactory, ScriptedGateway, PROVIDER_KEY,
    TEST_MNEMONIC,
};

fn app(gateway: ScriptedGateway) -> (Router, Arc<ScriptedFactory>) {
    let factory = ScriptedFactory::new(gateway);
    let server = HttpServer::new(test_config(), factory.clone(), Shutdown::new()).unwrap();
    (server.router(), factory)
}

fn post(path: &str, body: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn mint_body(name: &str) -> Json {
    json!({
        "blockfrostKey": PROVIDER_KEY,
        "secretSeed": TEST_MNEMONIC,
        "tokenName": name,
        "metadata": { "name": name, "farm": "La Esperanza" },
    })
}

async fn read_json(response: axum::response::Response) -> Json {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(ScriptedGateway::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["network"], "preprod");
}

#[tokio::test]
async fn test_mint_success() {
    let (app, factory) = app(ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)]));

    let response = app.oneshot(post("/mint", mint_body("Coffee#1"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["txHash"].as_str().unwrap().len(), 64);
    let unit = body["unit"].as_str().unwrap();
    assert!(unit.starts_with(body["policyId"].as_str().unwrap()));
    assert_eq!(factory.gateway.submits(), 1);
    assert_eq!(*factory.keys_seen.lock().unwrap(), vec![PROVIDER_KEY.to_string()]);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let (app, _) = app(ScriptedGateway::default());
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "batch-42")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "batch-42");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let (app, factory) = app(ScriptedGateway::default());
    let response = app
        .oneshot(post("/mint", json!({ "tokenName": "Coffee#1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["status"], "permanent_failure");
    assert_eq!(body["kind"], "invalid_input");
    assert_eq!(factory.gateway.listings(), 0);
}

#[tokio::test]
async fn test_invalid_seed_is_not_echoed() {
    let (app, _) = app(ScriptedGateway::default());
    let mut body = mint_body("Coffee#1");
    body["secretSeed"] = json!("correct horse battery staple");

    let response = app.oneshot(post("/mint", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = read_json(response).await.to_string();
    assert!(text.contains("invalid_seed"));
    assert!(!text.contains("horse"));
}

#[tokio::test]
async fn test_missing_provider_key_is_unauthorized() {
    let (app, _) = app(ScriptedGateway::default());
    let mut body = mint_body("Coffee#1");
    body["blockfrostKey"] = json!("");

    let response = app.oneshot(post("/mint", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["kind"], "unauthorized");
}

#[tokio::test]
async fn test_conflict_maps_to_409_with_retry_after() {
    let gateway = ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)]).then_submit(Err(
        GatewayError::Rejected {
            kind: RejectionKind::Conflict,
            reason: "BadInputsUTxO".into(),
        },
    ));
    let (app, _) = app(gateway);

    let response = app.oneshot(post("/mint", mint_body("Coffee#1"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()[header::RETRY_AFTER], "20");
    let body = read_json(response).await;
    assert_eq!(body["status"], "retry_later");
    assert_eq!(body["suggestedWaitMs"], 20_000);
}

#[tokio::test]
async fn test_no_funds_is_unprocessable() {
    let (app, _) = app(ScriptedGateway::default());
    let response = app.oneshot(post("/mint", mint_body("Coffee#1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await["kind"], "no_funds");
}

#[tokio::test]
async fn test_transfer_defaults_to_self() {
    let unit = AssetUnit::new(PolicyId([0x42; 28]), AssetName::new(b"Coffee#1".to_vec()).unwrap());
    let held = SpendableInput::new(
        OutputRef::new(TxHash([7; 32]), 0),
        Value::lovelace(4_000_000).with_asset(unit.clone(), 1),
    );
    let (app, factory) = app(ScriptedGateway::with_inputs(vec![held, pure_input(8, 0, 20_000_000)]));

    let body = json!({
        "blockfrostKey": PROVIDER_KEY,
        "secretSeed": TEST_MNEMONIC,
        "assetUnit": unit.to_string(),
        "metadata": { "status": "shipped", "note": "container MSCU-1" },
    });
    let response = app.oneshot(post("/transfer", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["unit"], unit.to_string());

    let submitted = factory.gateway.submitted.lock().unwrap();
    let tx = submitted[0].transaction();
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(tx.outputs[0].value.quantity_of(&unit), 1);
}

#[tokio::test]
async fn test_transfer_to_recipient_requires_address() {
    let (app, _) = app(ScriptedGateway::default());
    let body = json!({
        "blockfrostKey": PROVIDER_KEY,
        "secretSeed": TEST_MNEMONIC,
        "assetUnit": format!("{}{}", "42".repeat(28), hex::encode("Coffee#1")),
        "metadata": { "status": "sold" },
        "selfTransfer": false,
    });

    let response = app.oneshot(post("/transfer", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["kind"], "invalid_input");
}

#[tokio::test]
async fn test_shutdown_cancels_before_listing() {
    let factory = ScriptedFactory::new(ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)]));
    let shutdown = Shutdown::new();
    let server = HttpServer::new(test_config(), factory.clone(), shutdown.clone()).unwrap();
    shutdown.trigger();

    let response = server
        .router()
        .oneshot(post("/mint", mint_body("Coffee#1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["kind"], "cancelled");
    assert_eq!(factory.gateway.listings(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_refused_before_handling() {
    let (app, factory) = app(ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)]));
    let mut body = mint_body("Coffee#1");
    body["metadata"]["story"] = json!("x".repeat(300 * 1024));
    let text = body.to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/mint")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, text.len())
        .body(Body::from(text))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(factory.gateway.listings(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_keeps_result_of_submission_in_flight() {
    let factory = ScriptedFactory::new(
        ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)])
            .with_submit_delay(Duration::from_secs(20)),
    );
    let mut config = test_config();
    config.listener.request_timeout_secs = 5;
    let server = HttpServer::new(config, factory.clone(), Shutdown::new()).unwrap();

    let response = server
        .router()
        .oneshot(post("/mint", mint_body("Coffee#1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(factory.gateway.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_further_attempts() {
    let factory = ScriptedFactory::new(
        ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)])
            .with_submit_delay(Duration::from_secs(3))
            .then_submit(Err(network_error()))
            .then_submit(Err(network_error())),
    );
    let mut config = test_config();
    config.listener.request_timeout_secs = 2;
    let server = HttpServer::new(config, factory.clone(), Shutdown::new()).unwrap();

    let response = server
        .router()
        .oneshot(post("/mint", mint_body("Coffee#1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["kind"], "cancelled");
    assert_eq!(factory.gateway.submits(), 1);
}

#[tokio::test]
async fn test_conflict_after_timeout_is_accepted_with_tx_hash() {
    let gateway = ScriptedGateway::with_inputs(vec![pure_input(1, 0, 10_000_000)])
        .then_submit(Err(GatewayError::Timeout { after_ms: 5_000 }))
        .then_submit(Err(GatewayError::Rejected {
            kind: RejectionKind::Conflict,
            reason: "BadInputsUTxO".into(),
        }));
    let (app, factory) = app(gateway);

    let response = app.oneshot(post("/mint", mint_body("Coffee#1"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = read_json(response).await;
    assert_eq!(body["status"], "unconfirmed");
    let submitted = factory.gateway.submitted.lock().unwrap();
    assert_eq!(body["txHash"], submitted[0].id().to_hex());
}
