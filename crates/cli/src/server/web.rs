//! Health and stats endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use prismdns_infrastructure::dns::QueryHandler;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
struct AppState {
    handler: Arc<QueryHandler>,
}

pub async fn serve(
    bind_addr: SocketAddr,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(AppState { handler });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind_address = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "prismdns" }))
}

async fn stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let runtime = state.handler.snapshot();
    let snapshot = state.handler.metrics().snapshot(&runtime.caches);
    Json(serde_json::to_value(snapshot).unwrap_or_default())
}
