//! ---
//! twin_section: "05-networking-external-interfaces"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Single listener serving the WebSocket and REST surfaces."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use arm_twin_sim::TwinEngine;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{rest, websocket};

/// Builder for the twin's network surface.
#[derive(Debug, Clone)]
pub struct TwinServerBuilder {
    listen: SocketAddr,
    engine: Arc<TwinEngine>,
}

impl TwinServerBuilder {
    pub fn new(listen: SocketAddr, engine: Arc<TwinEngine>) -> Self {
        Self { listen, engine }
    }

    /// Router with every route and layer attached, for embedding or tests.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(websocket::router())
            .merge(rest::router())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.engine.clone())
    }

    /// Bind the listener and serve until the returned handle is shut down.
    pub async fn spawn(self) -> anyhow::Result<TwinServerHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "twin server listening");

        let app = self.router();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(err) = server.await {
                warn!(error = %err, "twin server exited with error");
            }
        });

        Ok(TwinServerHandle {
            address: local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running server.
#[derive(Debug)]
pub struct TwinServerHandle {
    address: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TwinServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Trigger graceful shutdown and await completion.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(err) => Err(anyhow::anyhow!(err)),
        }
    }
}
