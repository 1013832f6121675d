use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Coarse classification of a [`CoreError`], used by callers that only care
/// about how to react, not about the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    Expired,
    Inconsistent,
    NotFound,
    Unauthorized,
    Forbidden,
    Storage,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("expired: {0}")]
    Expired(String),
    #[error("ledger does not reconcile, discrepancy of {discrepancy}")]
    Inconsistent { discrepancy: Decimal },
    #[error("{0} not found")]
    NotFound(String),
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Expired(_) => ErrorKind::Expired,
            CoreError::Inconsistent { .. } => ErrorKind::Inconsistent,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Unauthorized => ErrorKind::Unauthorized,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<mongodb::error::Error> for CoreError {
    fn from(err: mongodb::error::Error) -> Self {
        log::error!("MongoDB operation failed: {}", err);
        CoreError::Storage(err.to_string())
    }
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Expired => StatusCode::GONE,
            ErrorKind::Inconsistent | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details stay in the logs
        let message = match self {
            CoreError::Storage(_) => "storage unavailable".to_string(),
            other => other.to_string(),
        };
        let mut body = json!({ "error": self.kind(), "message": message });
        if let CoreError::Inconsistent { discrepancy } = self {
            body["discrepancy"] = json!(discrepancy.to_string());
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
