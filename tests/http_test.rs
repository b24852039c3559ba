mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::{body_json, get, post_json, test_app, test_app_with, test_config, test_store, TEST_KEY};
use memory_api::memory::store::MemoryStore;
use memory_api::memory::types::{RecordFilters, RecordKind, RecordQuery};
use serde_json::json;
use tower::ServiceExt;

async fn stored_count(store: &dyn MemoryStore, kind: RecordKind) -> usize {
    store
        .select(kind, &RecordQuery::new(RecordFilters::default(), 200))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn save_then_fetch_round_trip() {
    let (app, _store) = test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/save_memory",
            &json!({"user_id": "u1", "thread_id": "th1", "content": "hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved = body_json(response).await;
    assert_eq!(saved["ok"], true);
    assert_eq!(saved["status"], "saved");
    assert_eq!(saved["slide_id"], "t-001");

    let response = app
        .oneshot(get("/get_memory?user_id=u1&thread_id=th1&limit=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 1);
    let item = &body["items"][0];
    assert_eq!(item["content"], "hello");
    assert_eq!(item["role"], "assistant");
    assert_eq!(item["seal"], "lawful");
    let drift = item["drift_score"].as_f64().unwrap();
    assert!((0.0..=0.30).contains(&drift));
    assert_eq!(body["next_before_ts"], item["ts"]);
}

#[tokio::test]
async fn successive_saves_advance_slide_id() {
    let (app, _store) = test_app();
    let body = json!({"user_id": "u1", "thread_id": "th1", "content": "x"});

    let mut ids = Vec::new();
    for _ in 0..3 {
        let response = app.clone().oneshot(post_json("/save_memory", &body)).await.unwrap();
        ids.push(body_json(response).await["slide_id"].as_str().unwrap().to_string());
    }
    assert_eq!(ids, vec!["t-001", "t-002", "t-003"]);
}

#[tokio::test]
async fn client_slide_id_is_kept_when_well_formed() {
    let (app, _store) = test_app();
    let response = app
        .oneshot(post_json(
            "/save_memory",
            &json!({"user_id": "u1", "content": "x", "slide_id": "t-120"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["slide_id"], "t-120");
}

#[tokio::test]
async fn server_assigns_timestamp() {
    let (app, _store) = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/save_memory",
            &json!({"user_id": "u1", "content": "x", "ts": 1}),
        ))
        .await
        .unwrap();
    let saved = body_json(response).await;
    let ts = saved["ts"].as_i64().unwrap();
    assert!(ts > 1_600_000_000, "client ts must be ignored, got {ts}");

    let body = body_json(app.oneshot(get("/get_memory?user_id=u1")).await.unwrap()).await;
    assert_eq!(body["items"][0]["ts"], ts);
}

#[tokio::test]
async fn sanitizers_bound_stored_fields() {
    let (app, _store) = test_app();
    app.clone()
        .oneshot(post_json(
            "/save_memory",
            &json!({
                "user_id": "u1",
                "content": "x",
                "drift_score": 5,
                "seal": "bogus",
                "role": "",
                "glyph_echo": "abcdefghijklmnopqrstuvwxyz",
            }),
        ))
        .await
        .unwrap();

    let body = body_json(app.oneshot(get("/get_memory?user_id=u1")).await.unwrap()).await;
    let item = &body["items"][0];
    assert_eq!(item["drift_score"].as_f64().unwrap(), 0.30);
    assert_eq!(item["seal"], "lawful");
    assert_eq!(item["role"], "assistant");
    assert_eq!(item["glyph_echo"].as_str().unwrap().chars().count(), 16);
    assert_eq!(item["thread_id"], "general");
}

#[tokio::test]
async fn missing_key_is_rejected_without_writing() {
    let (app, store) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/save_memory")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"user_id": "u1", "content": "x"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], 401);
    assert_eq!(stored_count(store.as_ref(), RecordKind::Memory).await, 0);
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let (app, _store) = test_app();
    let request = Request::builder()
        .uri("/get_memory")
        .header("x-api-key", "not-the-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let (app, _store) = test_app();
    let request = Request::builder()
        .uri("/get_memory")
        .header(header::AUTHORIZATION, format!("Bearer {TEST_KEY}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversize_content_is_rejected_without_writing() {
    let store = test_store();
    let mut config = test_config();
    config.limits.max_content_chars = 10;
    let app = test_app_with(store.clone(), &config);

    let at_limit = app
        .clone()
        .oneshot(post_json(
            "/save_memory",
            &json!({"user_id": "u1", "content": "é".repeat(10)}),
        ))
        .await
        .unwrap();
    assert_eq!(at_limit.status(), StatusCode::CREATED);

    let over = app
        .oneshot(post_json(
            "/save_memory",
            &json!({"user_id": "u1", "content": "a".repeat(11)}),
        ))
        .await
        .unwrap();
    assert_eq!(over.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(over).await["code"], 413);
    assert_eq!(stored_count(store.as_ref(), RecordKind::Memory).await, 1);
}

#[tokio::test]
async fn invalid_bodies_are_bad_requests() {
    let (app, store) = test_app();
    let cases = [
        json!({"content": "no user"}),
        json!({"user_id": "u1"}),
        json!({"user_id": "  ", "content": "x"}),
        json!({"user_id": "u1", "content": "x", "thread_id": ["a"]}),
        json!(["not", "an", "object"]),
    ];
    for case in cases {
        let response = app.clone().oneshot(post_json("/save_memory", &case)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {case}");
    }

    let request = Request::builder()
        .method("POST")
        .uri("/save_memory")
        .header("x-api-key", TEST_KEY)
        .body(Body::from("{broken"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stored_count(store.as_ref(), RecordKind::Memory).await, 0);
}

#[tokio::test]
async fn malformed_query_numbers_are_bad_requests() {
    let (app, _store) = test_app();
    for uri in ["/get_memory?limit=abc", "/get_memory?before_ts=soon"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn cursor_walks_backwards_without_overlap() {
    let (app, store) = test_app();
    for (i, ts) in [100, 200, 300, 400, 500].into_iter().enumerate() {
        let mut rec = helpers::record("u1", "th1", &format!("t-{:03}", i + 1), ts);
        rec.content = format!("m{i}");
        store.insert(RecordKind::Memory, &rec).await.unwrap();
    }

    let first = body_json(
        app.clone()
            .oneshot(get("/get_memory?user_id=u1&limit=2"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["count"], 2);
    assert_eq!(first["next_before_ts"], 400);

    let second = body_json(
        app.clone()
            .oneshot(get("/get_memory?user_id=u1&limit=2&before_ts=400"))
            .await
            .unwrap(),
    )
    .await;
    let ts: Vec<i64> = second["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["ts"].as_i64().unwrap())
        .collect();
    assert_eq!(ts, vec![300, 200]);

    let last = body_json(
        app.oneshot(get("/get_memory?user_id=u1&limit=2&before_ts=100"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(last["count"], 0);
    assert!(last["next_before_ts"].is_null());
}

#[tokio::test]
async fn rate_limit_answers_429_with_retry_after() {
    let store = test_store();
    let mut config = test_config();
    config.security.rate_limit_max_requests = 2;
    let app = test_app_with(store, &config);

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/get_memory")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.oneshot(get("/get_memory")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(body_json(response).await["code"], 429);
}

#[tokio::test]
async fn cors_allows_listed_origin_only() {
    let store = test_store();
    let mut config = test_config();
    config.security.allowed_origins = vec!["https://app.example".to_string()];
    let app = test_app_with(store, &config);

    let allowed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example"
    );
    assert!(allowed.headers().contains_key(header::VARY));

    let denied = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(!denied
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn preflight_needs_no_key() {
    let (app, _store) = test_app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/save_memory")
        .header(header::ORIGIN, "https://anywhere.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,x-api-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn unknown_routes_and_methods_answer_json() {
    let (app, _store) = test_app();

    let response = app.clone().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], 404);

    let response = app.oneshot(get("/save_memory")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["code"], 405);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let (app, _store) = test_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn health_and_index_report_backend() {
    let (app, _store) = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let health = body_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(health["ok"], true);
    assert_eq!(health["backend"], "sqlite");
    assert!(health["ts"].as_i64().is_some());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let index = body_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(index["service"], "memory-api");
    assert!(index["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "POST /save_memory"));
}

#[tokio::test]
async fn reflections_keep_checksum_and_own_counter() {
    let (app, store) = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/save_reflection",
            &json!({"user_id": "u1", "thread_id": "th1", "content": "looking back", "checksum_kappa": "κ-77"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["slide_id"], "r-001");

    let body = body_json(
        app.oneshot(get("/get_reflections?user_id=u1"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["checksum_kappa"], "κ-77");
    assert_eq!(stored_count(store.as_ref(), RecordKind::Memory).await, 0);
}

#[tokio::test]
async fn reflection_id_is_derived_from_email() {
    let (app, _store) = test_app();
    let first = body_json(
        app.clone()
            .oneshot(post_json("/reflection_id", &json!({"email": "Someone@Example.com"})))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.clone()
            .oneshot(post_json("/reflection_id", &json!({"email": "someone@example.com"})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["reflection_id"], second["reflection_id"]);
    assert!(first["reflection_id"].as_str().unwrap().starts_with("GLYPH-"));

    let response = app
        .oneshot(post_json("/reflection_id", &json!({"email": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
