//! # Chat Pipeline Integration
//!
//! Chat transports feeding the shared dispatch service, with a real
//! registry, allowlist authorizer, sliding-window limiter and memory store.
//!
//! ## Flow Tested
//!
//! ```text
//! ChatTransport::handle_command -> parse -> authorize -> rate-limit
//!     -> ModuleRegistry::execute -> one AuditEvent in MemoryStore
//! ```

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::future::join_all;
    use hg_01_module_registry::ModuleRegistry;
    use hg_02_authorization::AllowlistAuthorizer;
    use hg_03_rate_limiting::RateLimiter;
    use hg_04_command_dispatch::adapters::chat::{MAXBOT, TELEGRAM};
    use hg_04_command_dispatch::{ChatTransport, DispatchService};
    use hg_05_transport_manager::TransportManager;
    use hg_07_state_store::MemoryStore;
    use serde_json::json;
    use shared_types::{
        AuditQuery, AuditStatus, CommandError, CommandProvider, Response, Store, TransportAdapter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// `diag ping` answers ok, `diag fail` answers an error response,
    /// `diag hang` never finishes.
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
                "fail" => Ok(Response::error("diag_failed")),
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Response::ok(json!(null)))
                }
                other => Err(CommandError::UnknownCommand(other.to_string())),
            }
        }
    }

    struct Fixture {
        diag: Arc<DiagModule>,
        store: Arc<MemoryStore>,
        telegram: Arc<ChatTransport>,
        maxbot: Arc<ChatTransport>,
    }

    async fn fixture(limit: usize, window: Duration) -> Fixture {
        let diag = Arc::new(DiagModule::default());
        let mut registry = ModuleRegistry::new();
        registry.register(diag.clone()).await.unwrap();
        let registry = Arc::new(registry);

        let authorizer = Arc::new(AllowlistAuthorizer::new([
            (TELEGRAM, vec!["1001"]),
            (MAXBOT, vec!["1001", "2002"]),
        ]));
        let limiter = Arc::new(RateLimiter::new(limit, window));
        let store = Arc::new(MemoryStore::new());

        let transport = |source: &str| {
            Arc::new(ChatTransport::new(
                DispatchService::new(source, registry.clone(), authorizer.clone())
                    .with_limiter(limiter.clone())
                    .with_audit(store.clone())
                    .with_command_timeout(Duration::from_millis(200)),
            ))
        };

        Fixture {
            telegram: transport(TELEGRAM),
            maxbot: transport(MAXBOT),
            diag,
            store,
        }
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
    // GATING
    // =============================================================================

    #[tokio::test]
    async fn test_allowed_then_rate_limited() {
        let f = fixture(1, Duration::from_secs(60)).await;

        let resp = f.telegram.handle_command("1001", "/diag ping a").await.unwrap();
        assert_eq!(resp.data, json!({ "pong": ["a"] }));

        let err = f.telegram.handle_command("1001", "/diag ping").await.unwrap_err();
        assert_eq!(err.error_code(), "rate_limited");
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 1);

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.source == "telegram" && e.subject == "1001"));
        assert!(events.iter().all(|e| e.action == "diag:ping"));
        let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
        assert!(statuses.contains(&AuditStatus::Ok));
        assert!(statuses.contains(&AuditStatus::RateLimited));
        assert_ne!(events[0].request_id, events[1].request_id);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_denied_before_execution() {
        let f = fixture(5, Duration::from_secs(1)).await;

        let err = f.telegram.handle_command("9999", "diag ping").await.unwrap_err();
        assert_eq!(err.error_code(), "access_denied");
        // Allowed on maxbot, not on telegram.
        let err = f.telegram.handle_command("2002", "diag ping").await.unwrap_err();
        assert_eq!(err.error_code(), "access_denied");
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 0);

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.status == AuditStatus::Denied));
    }

    #[tokio::test]
    async fn test_sources_have_independent_limits() {
        let f = fixture(1, Duration::from_secs(60)).await;

        assert!(f.telegram.handle_command("1001", "diag ping").await.is_ok());
        assert!(f.maxbot.handle_command("1001", "diag ping").await.is_ok());
        assert!(f.maxbot.handle_command("2002", "diag ping").await.is_ok());
        assert!(f.maxbot.handle_command("1001", "diag ping").await.is_err());
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_audited() {
        let f = fixture(5, Duration::from_secs(1)).await;

        let err = f.telegram.handle_command("1001", "  /diag  ").await.unwrap_err();
        assert_eq!(err.error_code(), "bad_command");
        assert!(audit(&f.store).await.is_empty());
    }

    // =============================================================================
    // EXECUTION OUTCOMES
    // =============================================================================

    #[tokio::test]
    async fn test_module_errors_are_audited_as_error() {
        let f = fixture(10, Duration::from_secs(1)).await;

        let resp = f.telegram.handle_command("1001", "diag fail").await.unwrap();
        assert!(resp.is_error());
        let err = f.telegram.handle_command("1001", "diag nope").await.unwrap_err();
        assert_eq!(err.error_code(), "unknown_command");
        let err = f.telegram.handle_command("1001", "nomod ping").await.unwrap_err();
        assert_eq!(err.error_code(), "module_not_found");

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.status == AuditStatus::Error));
        let codes: Vec<_> = events
            .iter()
            .map(|e| e.payload["error_code"].as_str().unwrap_or_default().to_string())
            .collect();
        for code in ["diag_failed", "unknown_command", "module_not_found"] {
            assert!(codes.iter().any(|c| c == code), "missing {code}");
        }
    }

    #[tokio::test]
    async fn test_hung_module_times_out_and_is_audited() {
        let f = fixture(5, Duration::from_secs(1)).await;

        let err = f.maxbot.handle_command("2002", "diag hang").await.unwrap_err();
        assert_eq!(err.error_code(), "request_timeout");

        let events = audit(&f.store).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, AuditStatus::Error);
        assert_eq!(events[0].payload["error_code"], "request_timeout");
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_window() {
        let f = fixture(5, Duration::from_secs(60)).await;

        let calls = (0..20).map(|_| {
            let telegram = f.telegram.clone();
            tokio::spawn(async move { telegram.handle_command("1001", "diag ping").await })
        });
        let results = join_all(calls).await;
        let accepted = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(accepted, 5);
        assert_eq!(f.diag.calls.load(Ordering::SeqCst), 5);
        assert_eq!(f.store.audit_len(), 20);
    }

    // =============================================================================
    // LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_transport_manager_drives_chat_transports() {
        let f = fixture(5, Duration::from_secs(1)).await;
        let manager = TransportManager::new();
        manager.register(f.telegram.clone()).unwrap();
        manager.register(f.maxbot.clone()).unwrap();
        assert!(manager.register(f.maxbot.clone()).is_err());

        manager.start_all().await.unwrap();
        assert!(f.telegram.is_running() && f.maxbot.is_running());
        assert_eq!(f.telegram.name(), "telegram");

        manager.stop_one("telegram").await.unwrap();
        assert!(!f.telegram.is_running());
        assert!(f.maxbot.is_running());

        manager.stop_all().await.unwrap();
        assert!(!f.maxbot.is_running());
    }
}
