//! Server module for managing HTTP server lifecycle
//!
//! Wires the status store, dispatcher, notifier and job queue together,
//! serves the HTTP surface and shuts everything down in order.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;

use crate::api::create_router;
use crate::config::{Environment, Settings};
use crate::dispatcher::RateLimitedDispatcher;
use crate::jobs::JobQueue;
use crate::notify::build_notifier;
use crate::state::AppState;
use crate::store::{JobStatusStore, build_backend};

/// HTTP server manager
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Builds the engine components described by `settings` and starts the
    /// queue worker.
    pub async fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
        let backend = build_backend(&settings.store)
            .await
            .context("Failed to initialize status store")?;
        let store = JobStatusStore::new(backend);

        let notifier = build_notifier(&settings.notifier).context("Failed to initialize notifier")?;
        let dispatcher = RateLimitedDispatcher::new(&settings.dispatcher);
        let queue = JobQueue::new(settings.queue.clone(), store, notifier);
        queue.start().await?;

        Ok(AppState::new(queue, dispatcher))
    }

    /// Start the server and run until shutdown signal
    ///
    /// On shutdown the queue stops accepting work and lets the active job
    /// finish, then the dispatcher drains; each step is bounded by
    /// `server.shutdown_grace_secs`.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = &self.settings;

        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            environment = %Environment::from_env(),
            "Application starting"
        );
        tracing::info!(
            batch_size = settings.queue.batch_size,
            inter_batch_delay_ms = settings.queue.inter_batch_delay_ms,
            job_types = settings.queue.job_types.len(),
            "Queue configuration loaded"
        );
        tracing::info!(
            backend = ?settings.store.backend,
            key_prefix = %settings.store.key_prefix,
            "Store configuration loaded"
        );

        let state = Self::build_state(settings).await?;
        let queue = state.queue.clone();
        let dispatcher = state.dispatcher.clone();

        let router = create_router(state);
        tracing::info!("Router configured");

        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        tracing::info!(address = %address, "Server listening");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        if let Err(ref e) = served {
            tracing::error!(error = %e, "HTTP server stopped with an error");
        }

        shutdown_engine(&queue, &dispatcher, settings.server.shutdown_grace()).await;
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Stops the queue, then drains the dispatcher, each bounded by `grace`.
async fn shutdown_engine(queue: &JobQueue, dispatcher: &RateLimitedDispatcher, grace: Duration) {
    if tokio::time::timeout(grace, queue.stop()).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Active job did not finish before shutdown");
    }
    if tokio::time::timeout(grace, dispatcher.drain()).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Dispatcher still busy at shutdown");
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
