//! Wiring of the dispatch core, the store and the front-ends.

use crate::config::RuntimeConfig;
use crate::scheduler::MetricsScheduler;
use anyhow::{Context, Result};
use hg_01_module_registry::ModuleRegistry;
use hg_02_authorization::{AllowlistAuthorizer, Authorizer};
use hg_03_rate_limiting::{cleanup_task, RateLimiter};
use hg_04_command_dispatch::adapters::chat::{MAXBOT, TELEGRAM};
use hg_04_command_dispatch::{ChatTransport, DispatchError, DispatchService, ParsedCommand};
use hg_05_transport_manager::TransportManager;
use hg_06_web_gateway::{GatewayState, WebTransport};
use hg_07_state_store::MemoryStore;
use hg_08_host_metrics::HostModule;
use shared_types::{Response, Store};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Source name of the local command line front-end.
pub const CLI_SOURCE: &str = "cli";

const LIMITER_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Fully wired application.
pub struct App {
    pub config: RuntimeConfig,
    pub registry: Arc<ModuleRegistry>,
    pub authorizer: Arc<dyn Authorizer>,
    /// Shared by the chat transports and the CLI.
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<MemoryStore>,
    pub transports: TransportManager,
    /// Registered chat transports, for bot front-ends to feed messages into.
    pub chat: Vec<Arc<ChatTransport>>,
}

impl App {
    /// Register modules and transports. Any registration failure is fatal.
    pub async fn build(config: RuntimeConfig) -> Result<Self> {
        let mut registry = ModuleRegistry::new();
        registry
            .register(Arc::new(HostModule::new()))
            .await
            .context("failed to register host module")?;
        let registry = Arc::new(registry);

        let authorizer: Arc<dyn Authorizer> = Arc::new(AllowlistAuthorizer::new(
            config.security.auth_allowlist.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.effective_limit(),
            config.rate_limit.window,
        ));
        let store = Arc::new(MemoryStore::new());

        let mut app = Self {
            registry,
            authorizer,
            limiter,
            store,
            transports: TransportManager::new(),
            chat: Vec::new(),
            config,
        };

        let chat_sources = [
            (TELEGRAM, app.config.transports.telegram),
            (MAXBOT, app.config.transports.maxbot),
        ];
        for (source, enabled) in chat_sources {
            if !enabled {
                continue;
            }
            let transport = Arc::new(ChatTransport::new(app.dispatch(source)));
            app.transports
                .register(transport.clone())
                .with_context(|| format!("failed to register {source} transport"))?;
            app.chat.push(transport);
        }

        if app.config.web.enabled {
            let state = GatewayState::new(
                Arc::clone(&app.registry),
                Arc::clone(&app.authorizer),
                app.store.clone(),
                app.config.web.gateway.clone(),
            );
            app.transports
                .register(Arc::new(WebTransport::new(state)))
                .context("failed to register web transport")?;
        }

        info!(
            modules = ?app.registry.providers(),
            transports = ?app.transports.names(),
            "Application wired"
        );
        Ok(app)
    }

    /// Dispatch pipeline for `source`, sharing the registry, authorizer,
    /// limiter and audit store.
    pub fn dispatch(&self, source: &str) -> DispatchService {
        DispatchService::new(source, Arc::clone(&self.registry), Arc::clone(&self.authorizer))
            .with_limiter(Arc::clone(&self.limiter))
            .with_audit(self.store.clone())
            .with_command_timeout(self.config.web.gateway.request_timeout)
    }

    /// Run one command as `subject` through the `cli` pipeline.
    pub async fn exec(
        &self,
        subject: &str,
        module: &str,
        command: &str,
        args: Vec<String>,
    ) -> Result<Response, DispatchError> {
        let cmd = ParsedCommand {
            module: module.to_string(),
            command: command.to_string(),
            args,
        };
        self.dispatch(CLI_SOURCE).execute(subject, cmd).await
    }

    /// Start every transport and the scheduler, wait for `shutdown`, then
    /// stop everything within the web shutdown timeout.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        // Transports started before a failure keep running; the caller exits.
        self.transports
            .start_all()
            .await
            .context("failed to start transports")?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let scheduler = MetricsScheduler::new(
            Arc::clone(&self.registry),
            self.store.clone() as Arc<dyn Store>,
            self.config.scheduler.interval,
            self.config.scheduler.job_timeout,
        );
        let scheduler = tokio::spawn(scheduler.run(stop_rx));
        let cleanup = tokio::spawn(cleanup_task(
            Arc::clone(&self.limiter),
            LIMITER_PURGE_INTERVAL,
        ));

        info!("HostGate running");
        shutdown.await;
        info!("Shutdown requested");

        let _ = stop_tx.send(true);
        cleanup.abort();
        let shutdown_timeout = self.config.web.gateway.shutdown_timeout;
        let stopped = tokio::time::timeout(shutdown_timeout, self.transports.stop_all()).await;
        if let Err(err) = scheduler.await {
            warn!(error = %err, "Metrics scheduler task failed");
        }

        match stopped {
            Ok(result) => result.context("failed to stop transports")?,
            Err(_) => warn!(
                timeout_ms = shutdown_timeout.as_millis() as u64,
                "Transports did not stop in time"
            ),
        }
        info!("HostGate stopped");
        Ok(())
    }
}
