//! Run error types

use crate::collection::{ConfigError, TemplateError};

/// Token acquisition, refresh, or variable substitution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential variable: {0}")]
    MissingCredential(String),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    EndpointStatus { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Token endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Unresolved variable '{variable}' in request '{request}'")]
    UnresolvedVariable { request: String, variable: String },
}

impl AuthError {
    pub(crate) fn unresolved(request: &str, err: TemplateError) -> Self {
        match err {
            TemplateError::UndefinedVariable(variable) => AuthError::UnresolvedVariable {
                request: request.to_string(),
                variable,
            },
        }
    }
}

/// Network failure or timeout on a single request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors returned by the request executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}
