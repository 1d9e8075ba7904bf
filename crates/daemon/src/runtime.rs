use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::config::DaemonConfig;
use crate::search::SearchTools;
use crate::service::AnnotatorService;
use crate::store::DirStore;

/// Page served from the plots directory for the annotator client.
pub const CLIENT_PAGE: &str = "annotate.html";

/// A server running on a background task.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Wire the store, search backend and service into a router.
pub fn build_app(config: &DaemonConfig) -> Result<Router> {
    let plots_dir = config.resolved_plots_dir().context("failed to resolve plots directory")?;
    let store = DirStore::new(&plots_dir)
        .with_context(|| format!("failed to prepare plots directory `{}`", plots_dir.display()))?;
    let tools = SearchTools::from_config(&config.search);
    info!(
        plots_dir = %plots_dir.display(),
        backend = ?config.search.backend,
        "annotator store ready"
    );

    let service = AnnotatorService::new(Arc::new(store), tools, config.search.clone());
    Ok(api::router(service, &plots_dir, config.max_body_bytes))
}

/// Serve on the loopback interface until Ctrl-C or SIGTERM.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let app = build_app(&config)?;
    let listener = bind(config.port).await?;
    let addr = listener.local_addr().context("failed to read listener address")?;
    info!(listen_addr = %addr, "open http://{addr}/{CLIENT_PAGE}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("annotator server exited unexpectedly")
}

/// Serve on a background task; used by embedders and tests. Port 0 picks a
/// free port.
pub async fn start(config: DaemonConfig) -> Result<ServerHandle> {
    let app = build_app(&config)?;
    let listener = bind(config.port).await?;
    let local_addr = listener.local_addr().context("failed to read listener address")?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(4);
    let task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };
        if let Err(error) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            warn!(?error, "annotator server terminated unexpectedly");
        }
    });

    info!(listen_addr = %local_addr, "annotator server started");
    Ok(ServerHandle { local_addr, shutdown_tx, task: Some(task) })
}

async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr).await.with_context(|| format!("failed to bind listener on {addr}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
