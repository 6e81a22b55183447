//! Router assembly and the `web` transport.

use crate::audit::Auditor;
use crate::domain::config::GatewayConfig;
use crate::handlers;
use crate::middleware::{
    ActionRule, AuthorizeLayer, CorsLayer, RequestIdLayer, SubjectLayer, SubjectResolver,
    TimeoutLayer,
};
use crate::WEB_SOURCE;
use async_trait::async_trait;
use axum::{
    http::header,
    routing::{get, post},
    Router,
};
use hg_01_module_registry::ModuleRegistry;
use hg_02_authorization::Authorizer;
use hg_03_rate_limiting::RateLimiter;
use parking_lot::Mutex;
use shared_types::{Action, AdapterError, Store, TransportAdapter};
use std::io;
use std::iter::once;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ModuleRegistry>,
    pub authorizer: Arc<dyn Authorizer>,
    pub store: Arc<dyn Store>,
    pub auditor: Auditor,
    /// Present only when `rate_limit.enabled`.
    pub limiter: Option<Arc<RateLimiter>>,
    pub config: Arc<GatewayConfig>,
}

impl GatewayState {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        authorizer: Arc<dyn Authorizer>,
        store: Arc<dyn Store>,
        config: GatewayConfig,
    ) -> Self {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(config.rate_limit.limit, config.rate_limit.window)));
        Self {
            registry,
            authorizer,
            auditor: Auditor::new(Arc::clone(&store)),
            store,
            limiter,
            config: Arc::new(config),
        }
    }
}

/// Build the `/v1` router with the full middleware chain.
pub fn build_router(state: GatewayState) -> Router {
    let authorize = |rule: ActionRule, audit_action: &'static str| {
        AuthorizeLayer::new(
            Arc::clone(&state.authorizer),
            state.auditor.clone(),
            rule,
            audit_action,
        )
    };

    let protected = Router::new()
        .route(
            "/v1/me",
            get(handlers::me).layer(authorize(
                ActionRule::Fixed(Action::new("web", "me")),
                handlers::ACTION_ME,
            )),
        )
        .route(
            "/v1/modules",
            get(handlers::modules).layer(authorize(
                ActionRule::Fixed(Action::new("web", "modules")),
                handlers::ACTION_MODULES,
            )),
        )
        .route("/v1/commands/execute", post(handlers::execute))
        .route(
            "/v1/metrics/latest",
            get(handlers::latest_metric).layer(authorize(
                ActionRule::QueryModule("read_metrics"),
                handlers::ACTION_METRICS_LATEST,
            )),
        )
        .route(
            "/v1/audit",
            get(handlers::audit_query).layer(authorize(
                ActionRule::Fixed(Action::new("audit", "read")),
                handlers::ACTION_AUDIT_QUERY,
            )),
        )
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(state.config.request_timeout))
                .layer(SubjectLayer::new(SubjectResolver::from_config(
                    &state.config.auth,
                ))),
        );

    Router::new()
        .route("/v1/health", get(handlers::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(RequestIdLayer::new())
                .layer(SetSensitiveRequestHeadersLayer::new(once(header::AUTHORIZATION)))
                .layer(CorsLayer::new(&state.config.cors)),
        )
        .with_state(state)
}

struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<io::Result<()>>,
    local_addr: SocketAddr,
}

/// HTTP front-end managed by the transport manager.
pub struct WebTransport {
    state: GatewayState,
    running: Mutex<Option<Running>>,
}

impl WebTransport {
    pub fn new(state: GatewayState) -> Self {
        Self {
            state,
            running: Mutex::new(None),
        }
    }

    /// Bound address while serving; useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.local_addr)
    }

    fn io_error(&self, source: io::Error) -> AdapterError {
        AdapterError::Io {
            name: WEB_SOURCE.to_string(),
            source,
        }
    }
}

#[async_trait]
impl TransportAdapter for WebTransport {
    fn name(&self) -> &str {
        WEB_SOURCE
    }

    async fn start(&self) -> Result<(), AdapterError> {
        if self.running.lock().is_some() {
            return Err(AdapterError::AlreadyStarted(WEB_SOURCE.to_string()));
        }

        let listener = TcpListener::bind(self.state.config.listen_addr.as_str())
            .await
            .map_err(|e| self.io_error(e))?;
        let local_addr = listener.local_addr().map_err(|e| self.io_error(e))?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let router = build_router(self.state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let mut running = self.running.lock();
        if running.is_some() {
            // Lost a concurrent start.
            handle.abort();
            return Err(AdapterError::AlreadyStarted(WEB_SOURCE.to_string()));
        }
        *running = Some(Running {
            shutdown,
            handle,
            local_addr,
        });
        info!(addr = %local_addr, "Web transport listening");
        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        let Some(Running {
            shutdown,
            mut handle,
            local_addr,
        }) = self.running.lock().take()
        else {
            return Ok(());
        };

        let _ = shutdown.send(());
        let shutdown_timeout = self.state.config.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => {
                info!(addr = %local_addr, "Web transport stopped");
                Ok(())
            }
            Ok(Ok(Err(source))) => Err(self.io_error(source)),
            Ok(Err(join)) => Err(AdapterError::Other {
                name: WEB_SOURCE.to_string(),
                message: join.to_string(),
            }),
            Err(_) => {
                error!(
                    addr = %local_addr,
                    timeout_ms = shutdown_timeout.as_millis() as u64,
                    "Web transport did not drain in time"
                );
                handle.abort();
                Err(AdapterError::ShutdownTimeout(WEB_SOURCE.to_string()))
            }
        }
    }
}
