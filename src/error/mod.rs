//! Unified error handling for kcsync core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy shared by the admin client and the reconcile engine
#[derive(Error, Debug)]
pub enum AppError {
    /// Login or re-authentication failed; fatal for the current pass
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A named role, client, realm or user required by the desired state is absent remotely
    #[error("Unresolved {kind} reference: {name}")]
    Reference { kind: String, name: String },

    /// Network failure, deadline expiry or a retryable server status
    #[error("Transient error: {0}")]
    Transient(String),

    /// The desired specification is internally inconsistent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unexpected non-success status from the admin API
    #[error("Keycloak API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse error classification persisted alongside a failing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    NotFound,
    Conflict,
    Reference,
    Transient,
    Validation,
    Api,
    Config,
    Internal,
}

impl AppError {
    pub fn reference(kind: impl Into<String>, name: impl Into<String>) -> Self {
        AppError::Reference {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth(_) => ErrorKind::Auth,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Reference { .. } => ErrorKind::Reference,
            AppError::Transient(_) => ErrorKind::Transient,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Api { .. } => ErrorKind::Api,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Identifier of the offending remote entity, when the error names one
    pub fn offender(&self) -> Option<&str> {
        match self {
            AppError::Reference { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Only the outer scheduler retries, and only these
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::Api {
                status: e.status().map(|s| s.as_u16()).unwrap_or_default(),
                message: format!("Malformed response body: {}", e),
            }
        } else {
            // timeouts, connect/reset failures and body read errors
            AppError::Transient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(anyhow::Error::new(e).context("JSON serialization failed"))
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
