// src/infra/errors.rs — Error types for timeslip

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeslipError {
    // Caller errors (never retried)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Session '{session_id}' not found")]
    SessionNotFound { session_id: String },

    #[error("Session '{session_id}' is already stopped")]
    AlreadyStopped { session_id: String },

    #[error("Session '{session_id}' has already been sent and logged")]
    AlreadySent { session_id: String },

    #[error("Timer is already tracking")]
    AlreadyTracking,

    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TimeslipError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TimeslipError::Provider {
                retriable: true,
                ..
            } | TimeslipError::RateLimited { .. }
        )
    }

    pub fn not_found(session_id: &str) -> Self {
        TimeslipError::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }
}
