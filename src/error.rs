use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Central application error type. Each variant corresponds to one of the
/// failure domains in the error taxonomy: validation, not-found, source
/// unavailable, controller failure, or an opaque internal error.
#[derive(Error, Debug)]
pub enum RcpError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("schema validation failed: {0:?}")]
    Schema(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("source: {0}")]
    Source(String),

    #[error("controller: {0}")]
    Controller(String),

    #[error("scm: {0}")]
    Scm(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RcpResult<T> = Result<T, RcpError>;

impl RcpError {
    /// Wraps the error with an operation-path prefix, matching the Go
    /// convention of `fmt.Errorf("get: %w", err)` used throughout the
    /// original so the full call path remains visible in logs and bodies.
    pub fn wrap(self, op: &str) -> Self {
        match self {
            RcpError::NotFound(msg) => RcpError::NotFound(format!("{op}: {msg}")),
            other => RcpError::Internal(format!("{op}: {other}")),
        }
    }
}

impl ResponseError for RcpError {
    fn error_response(&self) -> HttpResponse {
        tracing::error!(error = %self, "request failed");

        let status = self.status_code();
        let body = match self {
            RcpError::Schema(errors) => serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
                "schemaErrors": errors,
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            }),
        };

        HttpResponse::build(status)
            .content_type("application/json")
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RcpError::Validation(_) | RcpError::Schema(_) | RcpError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            RcpError::NotFound(_) => StatusCode::NOT_FOUND,
            RcpError::Source(_) | RcpError::Scm(_) | RcpError::Controller(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RcpError::Config(_) | RcpError::Json(_) | RcpError::Io(_) | RcpError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<String> for RcpError {
    fn from(s: String) -> Self {
        RcpError::Internal(s)
    }
}

impl From<&str> for RcpError {
    fn from(s: &str) -> Self {
        RcpError::Internal(s.to_string())
    }
}

impl From<octocrab::Error> for RcpError {
    fn from(e: octocrab::Error) -> Self {
        RcpError::Scm(format!("octocrab: {e}"))
    }
}

impl From<git2::Error> for RcpError {
    fn from(e: git2::Error) -> Self {
        RcpError::Source(format!("git2: {e}"))
    }
}
