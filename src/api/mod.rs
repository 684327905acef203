// src/api/mod.rs — HTTP surface for the compose-surface client

pub mod auth;
pub mod handlers;
pub mod types;

use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::infra::config::ServerConfig;
use crate::infra::errors::TimeslipError;
use crate::session::{SendCoordinator, SessionRegistry};
use types::ErrorResponse;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
    pub coordinator: Arc<SendCoordinator>,
    pub token: Option<String>,
    pub allowed_origins: Vec<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto a status code and error body.
pub fn error_response(e: TimeslipError) -> ApiError {
    let status = match &e {
        TimeslipError::Validation(_) => StatusCode::BAD_REQUEST,
        TimeslipError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        TimeslipError::AlreadyStopped { .. }
        | TimeslipError::AlreadySent { .. }
        | TimeslipError::AlreadyTracking => StatusCode::CONFLICT,
        TimeslipError::Provider { .. } | TimeslipError::RateLimited { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse::new(e.to_string())))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/email-tracking/start", post(handlers::start))
        .route("/email-tracking/activity", post(handlers::activity))
        .route("/email-tracking/pause", post(handlers::pause))
        .route("/email-tracking/stop", post(handlers::stop))
        .route("/email-tracking/send", post(handlers::send))
        .route("/email-tracking/sessions", get(handlers::list_sessions))
        .route("/email-tracking/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn start_server(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Tracking API listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
