//! Health and pool statistics over HTTP

use crate::storage::{AllocationStore, PoolStats};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the health handlers
#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<dyn AllocationStore>,
}

#[derive(Debug, Serialize)]
struct StatsBody {
    #[serde(flatten)]
    stats: PoolStats,
    available: u64,
}

/// Create the health router
pub fn create_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn stats_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.store.pool_stats().await {
        Ok(stats) => Ok(Json(StatsBody {
            available: stats.available(),
            stats,
        })),
        Err(e) => {
            error!(error = %e, "Failed to read pool stats");
            Err((StatusCode::SERVICE_UNAVAILABLE, "storage unavailable"))
        }
    }
}

/// Serve the health router until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: HealthState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Health endpoint listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_health_over_http() {
        let store = Arc::new(MemoryStore::new());
        store.seed(["u1", "u2", "u3"]);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(HealthState { store });
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        let stats: serde_json::Value = reqwest::get(format!("http://{}/stats", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["assigned"], 0);
        assert_eq!(stats["available"], 3);

        server.abort();
    }
}
