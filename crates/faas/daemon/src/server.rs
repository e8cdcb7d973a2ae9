//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::platform::PlatformSimulator;
use crate::queue::WorkQueue;
use crate::scheduler::Scheduler;
use faas_controller::{InMemoryStore, Reconciler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// FaaS Daemon Server
pub struct Server {
    config: DaemonConfig,
    store: Arc<InMemoryStore>,
    scheduler: Arc<Scheduler>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(WorkQueue::new(&config.queue));
        let reconciler = Arc::new(Reconciler::new(store.clone(), config.controller.clone()));
        let scheduler = Scheduler::new(config.queue.clone(), reconciler, store.clone(), queue);

        Ok(Self {
            config,
            store,
            scheduler,
        })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.store.clone(), self.scheduler.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("FaaS daemon listening on {}", addr);

        // Background tasks
        let background = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let scheduler_handle = tokio::spawn(async move { scheduler.start().await });

        let simulator = PlatformSimulator::new(
            self.store.clone(),
            self.scheduler.queue().clone(),
            self.config.platform.clone(),
        );
        let simulator_handle = tokio::spawn(simulator.run(background.clone()));

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("FaaS daemon shutting down");

        self.scheduler.stop();
        background.cancel();

        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
        if let Err(e) = simulator_handle.await {
            tracing::error!(error = %e, "Simulator task failed");
        }

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
