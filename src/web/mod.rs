//! Read-only status server.

mod handlers;

pub use handlers::*;

use crate::db::Store;
use crate::monitor::MonitorEngine;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub store: Arc<Store>,
}

/// Web server exposing current status and history.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, engine: Arc<MonitorEngine>, store: Arc<Store>) -> Self {
        Self {
            port,
            state: AppState { engine, store },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        routes(self.state.clone())
    }

    /// Serve until `shutdown` fires.
    pub async fn start(
        &self,
        shutdown: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        Ok(())
    }
}

pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/", get(handlers::handle_dashboard))
        .route("/api/status", get(handlers::handle_status))
        .route("/api/targets", get(handlers::handle_get_targets))
        .route(
            "/api/targets/{name}/history",
            get(handlers::handle_history),
        )
        .route("/api/alerts", get(handlers::handle_alerts))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
