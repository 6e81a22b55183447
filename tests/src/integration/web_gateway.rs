//! # Web Gateway Integration
//!
//! Drives the full `/v1` router in-process with `tower::ServiceExt::oneshot`
//! against a real registry, allowlist authorizer and memory store.
//!
//! ## Stages Exercised
//!
//! ```text
//! RequestId -> Cors -> Timeout -> Subject -> Authorize -> handler -> audit
//! ```

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderMap, Method, Request, StatusCode};
    use axum::Router;
    use futures::future::join_all;
    use hg_01_module_registry::ModuleRegistry;
    use hg_02_authorization::AllowlistAuthorizer;
    use hg_06_web_gateway::{
        build_router, hash_token, AuthMode, GatewayConfig, GatewayState, TokenEntry,
    };
    use hg_07_state_store::MemoryStore;
    use serde_json::{json, Value};
    use shared_types::{
        AuditQuery, AuditStatus, CommandError, CommandProvider, MetricRecord, Response, Store,
    };
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const ORIGIN: &str = "https://admin.example";

    #[derive(Default)]
    struct DiagModule {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandProvider for DiagModule {
        fn name(&self) -> &str {
            "diag"
        }

        async fn execute(&self, command: &str, args: &[String]) -> Result<Response, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match command {
                "ping" => Ok(Response::ok(json!({ "pong": args }))),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Response::ok(Value::Null))
                }
                other => Err(CommandError::UnknownCommand(other.to_string())),
            }
        }
    }

    struct Noop;

    #[async_trait]
    impl CommandProvider for Noop {
        fn name(&self) -> &str {
            "alpha"
        }

        async fn execute(&self, _command: &str, _args: &[String]) -> Result<Response, CommandError> {
            Ok(Response::ok(Value::Null))
        }
    }

    fn token(id: &str, plaintext: &str, subject: &str, enabled: bool) -> TokenEntry {
        TokenEntry {
            id: id.into(),
            token_sha256: hash_token(plaintext),
            subject: subject.into(),
            roles: vec!["admin".into()],
            enabled,
        }
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig {
            request_timeout: Duration::from_millis(200),
            max_body_bytes: 256,
            ..GatewayConfig::default()
        };
        config.auth.tokens = vec![
            token("ops", "test-token", "alice", true),
            token("old", "old-token", "alice", false),
            token("orphan", "orphan-token", "", true),
            token("guest", "bob-token", "bob", true),
        ];
        config.cors.allowed_origins = vec![ORIGIN.into()];
        config
    }

    struct Fixture {
        router: Router,
        diag: Arc<DiagModule>,
        store: Arc<MemoryStore>,
    }

    async fn fixture_with(config: GatewayConfig) -> Fixture {
        let diag = Arc::new(DiagModule::default());
        let mut registry = ModuleRegistry::new();
        registry.register(diag.clone()).await.unwrap();
        registry.register(Arc::new(Noop)).await.unwrap();

        let authorizer = AllowlistAuthorizer::new([("web", vec!["alice", "u1"])]);
        let store = Arc::new(MemoryStore::new());
        let state = GatewayState::new(
            Arc::new(registry),
            Arc::new(authorizer),
            store.clone(),
            config,
        );
        Fixture {
            router: build_router(state),
            diag,
            store,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(config()).await
    }

    fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn execute(bearer: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/v1/commands/execute")
            .header("authorization", format!("Bearer {bearer}"))
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let res = router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn audit(store: &MemoryStore) -> Vec<shared_types::AuditEvent> {
        store
            .query_audit(AuditQuery {
                limit: 200,
                ..AuditQuery::default()
            })
            .await
            .unwrap()
    }

    // =============================================================================
    // PUBLIC ROUTES AND REQUEST IDS
    // =============================================================================

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let f = fixture().await;
        let (status, headers, body) = send(&f.router, get("/v1/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        let id = headers["x-request-id"].to_str().unwrap();
        assert_eq!(id.len(), 32);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_or_replaced() {
        let f = fixture().await;

        let req = Request::builder()
            .uri("/v1/me")
            .header("authorization", "Bearer test-token")
            .header("x-request-id", "ops-42.a:b_c")
            .body(Body::empty())
            .unwrap();
        let (_, headers, body) = send(&f.router, req).await;
        assert_eq!(headers["x-request-id"], "ops-42.a:b_c");
        assert_eq!(body["request_id"], "ops-42.a:b_c");
        assert_eq!(audit(&f.store).await[0].request_id, "ops-42.a:b_c");

        let req = Request::builder()
            .uri("/v1/health")
            .header("x-request-id", "bad id <script>")
            .body(Body::empty())
            .unwrap();
        let (_, headers, _) = send(&f.router, req).await;
        let id = headers["x-request-id"].to_str().unwrap();
        assert_ne!(id, "bad id <script>");
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    // =============================================================================
    // SUBJECT RESOLUTION
    // =============================================================================

    #[tokio::test]
    async fn test_missing_credentials_is_401_without_audit() {
        let f = fixture().await;
        let (status, headers, body) = send(&f.router, get("/v1/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "auth_required");
        assert_eq!(body["message"], "authentication is required");
        assert_eq!(body["request_id"], headers["x-request-id"].to_str().unwrap());
        assert!(audit(&f.store).await.is_empty());
    }

    #[tokio::test]
    async fn test_bearer_identity() {
        let f = fixture().await;
        let (status, _, body) = send(&f.router, get("/v1/me", Some("test-token"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["data"]["subject"], "alice");
        assert_eq!(body["data"]["roles"], json!(["admin"]));
        assert_eq!(body["data"]["auth_method"], "bearer");

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "web:me");
        assert_eq!(events[0].source, "web");
        assert_eq!(events[0].status, AuditStatus::Ok);
    }

    #[tokio::test]
    async fn test_bad_tokens_are_invalid() {
        let f = fixture().await;
        for bad in ["wrong-token", "old-token", "orphan-token"] {
            let (status, _, body) = send(&f.router, get("/v1/me", Some(bad))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{bad}");
            assert_eq!(body["error_code"], "invalid_token", "{bad}");
        }
    }

    #[tokio::test]
    async fn test_legacy_header_modes() {
        let legacy = || {
            Request::builder()
                .uri("/v1/me")
                .header("x-subject-id", "u1")
                .body(Body::empty())
                .unwrap()
        };

        let f = fixture().await;
        let (status, _, _) = send(&f.router, legacy()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut compat = config();
        compat.auth.allow_legacy_subject_header = true;
        let f = fixture_with(compat).await;
        let (status, _, body) = send(&f.router, legacy()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["subject"], "u1");
        assert_eq!(body["data"]["auth_method"], "legacy_header");
        assert_eq!(body["data"]["roles"], json!([]));
        assert_eq!(audit(&f.store).await[0].payload["auth_method"], "legacy_header");

        let mut strict = config();
        strict.auth.mode = AuthMode::Bearer;
        strict.auth.allow_legacy_subject_header = true;
        let f = fixture_with(strict).await;
        let (status, _, body) = send(&f.router, legacy()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "auth_required");
    }

    // =============================================================================
    // ROUTE AUTHORIZATION
    // =============================================================================

    #[tokio::test]
    async fn test_route_denial_is_audited() {
        let f = fixture().await;

        let (status, _, body) = send(&f.router, get("/v1/modules", Some("bob-token"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "access_denied");

        let (status, _, _) =
            send(&f.router, get("/v1/metrics/latest?module=host", Some("bob-token"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.status == AuditStatus::Denied && e.subject == "bob"));
        let metrics = events
            .iter()
            .find(|e| e.action == "web:metrics_latest")
            .unwrap();
        assert_eq!(metrics.payload["module"], "host");
    }

    #[tokio::test]
    async fn test_modules_sorted() {
        let f = fixture().await;
        let (status, _, body) = send(&f.router, get("/v1/modules", Some("test-token"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!(["alpha", "diag"]));
    }

    // =============================================================================
    // COMMAND EXECUTION
    // =============================================================================

    #[tokio::test]
    async fn test_execute_ok() {
        let f = fixture().await;
        let (status, _, body) = send(
            &f.router,
            execute("test-token", r#"{"module":"diag","command":"ping","args":["x"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["data"], json!({ "pong": ["x"] }));
        assert_eq!(body["error_code"], "");

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "diag:ping");
        assert_eq!(events[0].payload["args"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_execute_decode_failures() {
        let f = fixture().await;
        let cases = [
            ("{not json", "invalid_json"),
            (r#"{"module":"diag","command":"ping","extra":true}"#, "invalid_json"),
            (r#"{"module":"diag","command":"ping"} {}"#, "invalid_json"),
            (r#"{"module":"diag"}"#, "bad_command"),
            (r#"{"module":" ","command":"ping"}"#, "bad_command"),
        ];
        for (body, code) in cases {
            let (status, _, resp) = send(&f.router, execute("test-token", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(resp["error_code"], code, "{body}");
        }
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 0);

        let events = audit(&f.store).await;
        assert_eq!(events.len(), cases.len());
        assert!(events.iter().all(|e| e.action == "web:execute" && e.status == AuditStatus::Error));
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let f = fixture().await;
        let padding = "a".repeat(1024);
        let body = format!(r#"{{"module":"diag","command":"ping","args":["{padding}"]}}"#);
        let (status, _, resp) = send(&f.router, execute("test-token", body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(resp["error_code"], "payload_too_large");
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 0);

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["error_code"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_execute_denied_before_module_runs() {
        let f = fixture().await;
        let (status, _, _) = send(
            &f.router,
            execute("bob-token", r#"{"module":"diag","command":"ping"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 0);

        let events = audit(&f.store).await;
        assert_eq!(events[0].status, AuditStatus::Denied);
        assert_eq!(events[0].action, "diag:ping");
    }

    #[tokio::test]
    async fn test_command_errors_are_400() {
        let f = fixture().await;
        let (status, _, body) = send(
            &f.router,
            execute("test-token", r#"{"module":"ghost","command":"ping"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_code"], "module_not_found");
    }

    #[tokio::test]
    async fn test_slow_module_times_out_with_audit() {
        let f = fixture().await;
        let started = std::time::Instant::now();
        let (status, _, body) = send(
            &f.router,
            execute("test-token", r#"{"module":"diag","command":"slow"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error_code"], "request_timeout");
        assert_eq!(body["message"], "request timeout");
        assert!(started.elapsed() < Duration::from_secs(5));

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, AuditStatus::Error);
        assert_eq!(events[0].payload["error_code"], "request_timeout");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_each_audited_once() {
        let f = fixture().await;
        let requests = (0..16).map(|_| {
            let router = f.router.clone();
            async move {
                send(
                    &router,
                    execute("test-token", r#"{"module":"diag","command":"ping"}"#),
                )
                .await
            }
        });
        let results = join_all(requests).await;
        assert!(results.iter().all(|(status, _, _)| *status == StatusCode::OK));

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 16);
        let ids: HashSet<_> = events.iter().map(|e| e.request_id.clone()).collect();
        assert_eq!(ids.len(), 16);
    }

    // =============================================================================
    // CORS
    // =============================================================================

    fn preflight(origin: &str, method: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/commands/execute")
            .header("origin", origin)
            .header("access-control-request-method", method)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let f = fixture().await;

        let (status, _, body) = send(&f.router, preflight("https://evil.example", "POST")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "cors_denied");

        let (status, headers, body) = send(&f.router, preflight(ORIGIN, "DELETE")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "cors_method_denied");
        assert_eq!(headers["access-control-allow-origin"], ORIGIN);

        let (status, headers, _) = send(&f.router, preflight(ORIGIN, "POST")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers["access-control-allow-origin"], ORIGIN);
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert!(headers.contains_key("x-request-id"));

        assert!(audit(&f.store).await.is_empty());
    }

    #[tokio::test]
    async fn test_cors_on_regular_requests() {
        let f = fixture().await;

        let mut req = get("/v1/me", Some("test-token"));
        req.headers_mut().insert("origin", ORIGIN.parse().unwrap());
        let (status, headers, _) = send(&f.router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], ORIGIN);
        assert_eq!(headers["vary"], "Origin");

        let mut req = get("/v1/me", Some("test-token"));
        req.headers_mut().insert("origin", "https://evil.example".parse().unwrap());
        let (status, _, _) = send(&f.router, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        // Rejected before the handler ran.
        assert_eq!(audit(&f.store).await.len(), 1);
    }

    // =============================================================================
    // STORE READS
    // =============================================================================

    #[tokio::test]
    async fn test_latest_metric() {
        let f = fixture().await;

        let (status, _, body) = send(&f.router, get("/v1/metrics/latest", Some("test-token"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "module_required");

        let uri = "/v1/metrics/latest?module=host";
        let (status, _, body) = send(&f.router, get(uri, Some("test-token"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "metric_not_found");

        f.store
            .save_metric(MetricRecord::new("host", json!({ "load1": 0.5 })))
            .await
            .unwrap();
        let (status, _, body) = send(&f.router, get(uri, Some("test-token"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["module"], "host");
        assert_eq!(body["data"]["payload"]["load1"], 0.5);
        assert!(body["data"]["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_audit_query() {
        let f = fixture().await;
        for _ in 0..3 {
            send(&f.router, get("/v1/me", Some("test-token"))).await;
        }

        let (status, _, body) =
            send(&f.router, get("/v1/audit?subject=alice&limit=2", Some("test-token"))).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["data"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["subject"] == "alice" && i["action"] == "web:me"));
        assert!(items[0]["ts"].as_str().unwrap() >= items[1]["ts"].as_str().unwrap());

        let (status, _, body) =
            send(&f.router, get("/v1/audit?subject=nobody", Some("test-token"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));

        let (status, _, body) =
            send(&f.router, get("/v1/audit?from=yesterday", Some("test-token"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "bad_from");

        let (status, _, body) = send(
            &f.router,
            get("/v1/audit?to=2020-01-01T00:00:00Z", Some("test-token")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_after_auth() {
        let f = fixture().await;
        let (status, _, body) = send(&f.router, get("/v1/reboot", Some("test-token"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }
}
