//! Error types for Toyshop
//!
//! Every handler failure funnels through [`ToyshopError`]; the server turns it
//! into a status code and a JSON body in one place.

use hyper::StatusCode;
use serde::Serialize;

/// Main error type for Toyshop operations
#[derive(Debug, thiserror::Error)]
pub enum ToyshopError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ToyshopError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::InvalidId(_) => "INVALID_ID",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Database(_) => "DB_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure was caused by the client
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Build the response body. Server-side details stay in the logs.
    pub fn to_body(&self) -> ErrorBody {
        let error = match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let details = match self {
            Self::Validation(violations) => Some(violations.clone()),
            _ => None,
        };

        ErrorBody {
            error,
            code: self.code(),
            details,
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for ToyshopError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ToyshopError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

impl From<mongodb::error::Error> for ToyshopError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::oid::Error> for ToyshopError {
    fn from(err: bson::oid::Error) -> Self {
        Self::InvalidId(err.to_string())
    }
}

/// Result type alias for Toyshop operations
pub type Result<T> = std::result::Result<T, ToyshopError>;
