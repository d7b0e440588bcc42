use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use genstruct_backend::{
    AppState,
    algorithms::AlgorithmRegistry,
    config::Config,
    database::InMemoryCalculationStore,
    dispatcher::CycleOutcome,
    middleware::TRACE_ID_HEADER,
    router::create_router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const BASE: &str = "/api/v1/computational-experiments";

fn setup(config: Config) -> (Router, AppState) {
    let state = AppState::new(
        Arc::new(InMemoryCalculationStore::new()),
        AlgorithmRegistry::with_defaults(),
        config,
    );
    (create_router(state.clone()), state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bezier_request(requester: i64) -> Value {
    json!({
        "model_id": 1,
        "input_params": {"X": 1, "Y": 1, "FibreDiameter": 10, "DesiredPorosity": 0.5},
        "user_requester_id": requester
    })
}

#[tokio::test]
async fn submitted_request_is_calculated_by_one_dispatcher_cycle() {
    let (app, state) = setup(Config::default());

    let (status, body) = send(&app, post_json(BASE, bezier_request(5))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    let id = body["resp_data"]["calculation_request_id"].as_i64().unwrap();

    let (_, body) = send(&app, get(&format!("{BASE}/{id}/status?user_requester_id=5"))).await;
    assert_eq!(body["resp_data"]["status_id"], 1);
    assert_eq!(body["resp_data"]["status"], "New");

    let (status, _) = send(&app, get(&format!("{BASE}/{id}/result"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(&app, get(&format!("{BASE}/{id}/ready"))).await;
    assert_eq!(body["resp_data"], false);

    let outcome = state.dispatcher().run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Succeeded(done) if done == id));

    let (_, body) = send(&app, get(&format!("{BASE}/{id}/status"))).await;
    assert_eq!(body["resp_data"]["status"], "Success");
    let (_, body) = send(&app, get(&format!("{BASE}/{id}/ready?user_requester_id=5"))).await;
    assert_eq!(body["resp_data"], true);

    let (status, body) = send(&app, get(&format!("{BASE}/{id}/result?user_requester_id=5"))).await;
    assert_eq!(status, StatusCode::OK);
    let result = &body["resp_data"];
    assert_eq!(result["model_name"], "Bezier");
    assert_eq!(result["status_id"], 3);
    assert_eq!(result["input_params"]["FibreDiameter"], 10);
    assert_eq!(result["output_params"]["calc_result"], 1.0);
    assert!(result["output_params"].get("file").is_none());
}

#[tokio::test]
async fn other_requesters_cannot_see_a_request() {
    let (app, _) = setup(Config::default());
    let (_, body) = send(&app, post_json(BASE, bezier_request(5))).await;
    let id = body["resp_data"]["calculation_request_id"].as_i64().unwrap();

    let (status, body) = send(&app, get(&format!("{BASE}/{id}/status?user_requester_id=6"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 1004);

    let (status, _) = send(&app, get(&format!("{BASE}/999/status"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_input_is_rejected_with_every_error() {
    let (app, state) = setup(Config::default());
    let request = json!({
        "model_id": 1,
        "input_params": {"X": -1, "Y": 1, "FibreDiameter": -2, "DesiredPorosity": 0.5}
    });

    let (status, body) = send(&app, post_json(BASE, request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);
    assert_eq!(body["resp_data"].as_array().unwrap().len(), 2);

    assert!(matches!(
        state.dispatcher().run_cycle().await,
        CycleOutcome::Idle
    ));
}

#[tokio::test]
async fn unknown_or_unregistered_models_are_rejected() {
    let (app, _) = setup(Config::default());

    for model_id in [0, 2, 100] {
        let request = json!({"model_id": model_id, "input_params": {}});
        let (status, body) = send(&app, post_json(BASE, request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "model {model_id}");
        assert_eq!(body["code"], 1000);
    }
}

#[tokio::test]
async fn statuses_handbook_lists_all_statuses() {
    let (app, _) = setup(Config::default());
    let (status, body) = send(&app, get(&format!("{BASE}/statuses"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["resp_data"],
        json!({"1": "New", "2": "InProgress", "3": "Success", "4": "Error"})
    );
}

#[tokio::test]
async fn requests_over_the_limit_get_429_without_reaching_handlers() {
    let config = Config {
        rate_limit_requests: 2,
        ..Config::default()
    };
    let (app, state) = setup(config);

    for _ in 0..2 {
        let (status, _) = send(&app, post_json(BASE, bezier_request(1))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json(BASE, bezier_request(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 1005);

    // 被拒绝的请求没有入队
    let dispatcher = state.dispatcher();
    assert!(matches!(dispatcher.run_cycle().await, CycleOutcome::Succeeded(_)));
    assert!(matches!(dispatcher.run_cycle().await, CycleOutcome::Succeeded(_)));
    assert!(matches!(dispatcher.run_cycle().await, CycleOutcome::Idle));

    // 其他路径不受影响
    let (status, _) = send(&app, get(&format!("{BASE}/statuses"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn quota_is_tracked_per_client_when_proxy_headers_are_trusted() {
    let config = Config {
        rate_limit_requests: 1,
        rate_limit_trust_proxy_headers: true,
        ..Config::default()
    };
    let (app, _) = setup(config);
    let uri = format!("{BASE}/statuses");
    let from = |ip: &str| {
        Request::builder()
            .uri(&uri)
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, from("10.0.0.1")).await.0, StatusCode::OK);
    assert_eq!(
        send(&app, from("10.0.0.1")).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send(&app, from("10.0.0.2")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn exempt_paths_are_never_limited() {
    let config = Config {
        rate_limit_requests: 1,
        ..Config::default()
    };
    let (app, _) = setup(config);

    for _ in 0..5 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn responses_carry_a_trace_id() {
    let (app, _) = setup(Config::default());
    let trace_id = "3f2b8c1e-6a4d-4e8b-9a51-0c2d7e9f1a23";

    let request = Request::builder()
        .uri("/health")
        .header(TRACE_ID_HEADER, trace_id)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[TRACE_ID_HEADER], trace_id);

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key(TRACE_ID_HEADER));
}
