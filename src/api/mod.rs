//! HTTP API.
//!
//! - `/tasks` - task CRUD and `POST /tasks/:id/complete`
//! - `/projects` - project CRUD
//! - `/notes` - note CRUD

pub mod notes;
pub mod projects;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{StoreError, TaskError};
use crate::storage::JsonStore;

/// Shared application state.
pub struct AppState {
    pub store: JsonStore,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: JsonStore, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self { store, clock })
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Start the HTTP server.
pub async fn serve(config: &Config, store: JsonStore) -> anyhow::Result<()> {
    let state = AppState::new(store, Arc::new(SystemClock));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Starting server on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300));

    Router::new()
        .route("/", get(|| async { "welcome" }))
        .route("/health", get(health))
        .nest("/tasks", tasks::routes())
        .nest("/projects", projects::routes())
        .nest("/notes", notes::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Maps an error to a status code and a plain-text body.
pub(crate) fn error_response(err: TaskError) -> (StatusCode, String) {
    let status = match &err {
        TaskError::NotFound(_) | TaskError::Store(StoreError::NotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        TaskError::InvalidRecurrence(_) | TaskError::Invalid(_) => StatusCode::BAD_REQUEST,
        TaskError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        TaskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::warn!(error = %err, "request rejected");
    }
    (status, err.to_string())
}
