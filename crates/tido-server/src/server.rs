use axum::extract::{FromRef, State};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tido_auth::TokenKeys;
use tido_store::Database;

use crate::handlers;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7070,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub keys: TokenKeys,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/lists",
            get(handlers::lists::index).post(handlers::lists::create),
        )
        .route(
            "/lists/{id}",
            put(handlers::lists::rename).delete(handlers::lists::remove),
        )
        .route(
            "/lists/{id}/tasks",
            get(handlers::tasks::index).post(handlers::tasks::create),
        )
        .route("/lists/{id}/tasks/reorder", patch(handlers::tasks::reorder))
        .route(
            "/tasks/{id}",
            patch(handlers::tasks::update).delete(handlers::tasks::remove),
        )
        .route("/tasks/important", get(handlers::tasks::important))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "tido server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// GET /health — liveness probe, no auth.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    // A database round-trip proves the pool is serviceable.
    let healthy = state.db.with_conn(|conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(tido_store::StoreError::from)
    });

    match healthy {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({"status": "ok"})),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "unavailable"})),
            )
        }
    }
}
