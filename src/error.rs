use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message returned when the request body carries no usable `messages` array.
pub const MISSING_MESSAGES: &str = "Messages array is required";

/// Message returned when the provider gave no usable error text.
pub const UPSTREAM_FALLBACK: &str = "Failed to fetch response from Gemini API";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn upstream_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Upstream {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to hand back to the caller.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(m) => m.clone(),
            Self::Upstream { message, .. } => message.clone(),
            Self::Config(_) => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Upstream { status_code, .. } => {
                error!(upstream_status = ?status_code, error = %self, "upstream call failed");
            }
            Self::Config(_) => error!(error = %self, "request failed"),
            Self::Validation(_) => {}
        }
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = Error::validation(MISSING_MESSAGES);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.client_message(), "Messages array is required");
    }

    #[test]
    fn upstream_keeps_provider_message() {
        let err = Error::upstream_with_status("API key not valid", 400);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "API key not valid");
    }

    #[test]
    fn config_error_is_not_leaked() {
        let err = Error::config("failed to read /etc/secret/config.toml");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.client_message().contains("/etc/secret"));
    }
}
