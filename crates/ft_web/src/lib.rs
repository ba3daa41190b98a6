use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/startups", get(handlers::list_startups))
        .route("/api/startups/stats", get(handlers::startup_stats))
        .route("/api/logs", get(handlers::list_logs))
        .route("/api/export/csv", get(handlers::export_csv))
        .route("/api/runs/trigger", post(handlers::trigger_run))
        .route("/api/sources", get(handlers::list_sources))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> ft_core::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "🌐 API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use ft_core::{Result, Storage};
}
