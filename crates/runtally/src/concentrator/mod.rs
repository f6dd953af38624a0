//! HTTP progress concentrator.
//!
//! Test processes post [`ProgressInfo`](crate::model::ProgressInfo) documents
//! to a single local endpoint; every postback is merged into the shared
//! [`ResultRecorder`]. When forwarding is configured a background worker
//! posts the current run summary upstream on a fixed interval.
//!
//! Both workers share one [`CancellationToken`]. [`RunningConcentrator`]
//! cancels it on [`shutdown`](RunningConcentrator::shutdown) or when dropped.

mod forwarder;
mod handler;

pub use forwarder::{merged_headers, ForwardTarget};

use crate::config::{ConcentratorConfig, ForwardingInfo};
use crate::error::{RecorderError, RecorderResult};
use crate::recorder::ResultRecorder;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the postback router. Every path and method lands on the same
/// handler.
pub fn postback_router(recorder: Arc<ResultRecorder>, max_concurrent: Option<usize>) -> Router {
    let router = Router::new()
        .fallback(handler::handle_postback)
        .with_state(recorder)
        .layer(TraceLayer::new_for_http());
    match max_concurrent {
        Some(limit) => router.layer(GlobalConcurrencyLimitLayer::new(limit.max(1))),
        None => router,
    }
}

pub struct ProgressConcentratorServer {
    recorder: Arc<ResultRecorder>,
    config: ConcentratorConfig,
    forwarding: Option<ForwardingInfo>,
}

impl ProgressConcentratorServer {
    pub fn new(
        recorder: Arc<ResultRecorder>,
        config: ConcentratorConfig,
        forwarding: Option<ForwardingInfo>,
    ) -> Self {
        Self {
            recorder,
            config,
            forwarding,
        }
    }

    pub fn recorder(&self) -> &Arc<ResultRecorder> {
        &self.recorder
    }

    /// Start the forwarding worker (if configured) and the listener.
    ///
    /// Returns once both are running. The forwarder is started first and
    /// must capture its settings before the listener is bound.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Config`] for unusable forwarding settings and
    /// [`RecorderError::Server`] when the listener cannot be bound or a
    /// worker exits before signalling readiness.
    pub async fn start(self) -> RecorderResult<RunningConcentrator> {
        let cancel = CancellationToken::new();
        // Cancels any worker already spawned if start bails out early.
        let guard = cancel.clone().drop_guard();

        let forwarder = match self.forwarding.clone() {
            Some(info) => Some(self.spawn_forwarder(info, &cancel).await?),
            None => None,
        };

        let listener = TcpListener::bind(self.config.bind).await.map_err(|err| {
            RecorderError::server(format!("failed to bind {}: {err}", self.config.bind))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| RecorderError::io("reading concentrator address", err))?;

        let router = postback_router(
            Arc::clone(&self.recorder),
            self.config.max_concurrent_postbacks,
        );
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let shutdown = cancel.clone();
        let server = tokio::spawn(async move {
            let _ = ready_tx.send(());
            let serving = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(err) = serving.await {
                tracing::error!(error = %err, "progress concentrator failed");
            }
        });
        ready_rx
            .await
            .map_err(|_| RecorderError::server("listener exited before it started"))?;

        tracing::info!(%local_addr, forwarding = forwarder.is_some(), "progress concentrator listening");
        Ok(RunningConcentrator {
            local_addr,
            cancel,
            server,
            forwarder,
            _guard: guard,
        })
    }

    async fn spawn_forwarder(
        &self,
        info: ForwardingInfo,
        cancel: &CancellationToken,
    ) -> RecorderResult<JoinHandle<()>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(forwarder::run_forwarder(
            Arc::clone(&self.recorder),
            info,
            cancel.clone(),
            ready_tx,
        ));
        ready_rx
            .await
            .map_err(|_| RecorderError::server("forwarding worker exited before it started"))??;
        Ok(handle)
    }
}

/// Handle to a started concentrator.
pub struct RunningConcentrator {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<()>,
    forwarder: Option<JoinHandle<()>>,
    _guard: DropGuard,
}

impl RunningConcentrator {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Postback URL for child processes.
    pub fn url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarder.is_some()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting postbacks, stop forwarding, and wait for both workers.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Server`] if a worker panicked.
    pub async fn shutdown(self) -> RecorderResult<()> {
        self.cancel.cancel();
        self.server
            .await
            .map_err(|err| RecorderError::server(format!("listener task failed: {err}")))?;
        if let Some(forwarder) = self.forwarder {
            forwarder
                .await
                .map_err(|err| RecorderError::server(format!("forwarding task failed: {err}")))?;
        }
        tracing::info!(local_addr = %self.local_addr, "progress concentrator stopped");
        Ok(())
    }
}
