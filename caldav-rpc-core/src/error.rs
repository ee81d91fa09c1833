//! Error types for caldav-rpc.
//!
//! Each layer has its own error enum. They are only turned into protocol
//! error codes when the envelope encodes a response.

use serde_json::{Value, json};
use thiserror::Error;

use crate::kind::ResourceKind;

/// Stable protocol error codes.
pub mod code {
    pub const INVALID_PARAMETERS: i64 = 1001;
    pub const RESOURCE_NOT_FOUND: i64 = 1002;
    pub const AUTHENTICATION_FAILED: i64 = 1003;
    pub const INTERNAL_ERROR: i64 = 1004;
    pub const OPERATION_NOT_SUPPORTED: i64 = 1005;
    /// JSON-RPC "Invalid Request".
    pub const MALFORMED_REQUEST: i64 = -32600;
}

/// Failures reported by a [`Store`](crate::store::Store).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Unreadable or invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// Failures while reading iCalendar text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid iCalendar data: {0}")]
    Malformed(String),

    #[error("Expected a {expected} component, found {found}")]
    ComponentMismatch { expected: &'static str, found: String },

    #[error("Missing required property {0}")]
    MissingProperty(&'static str),

    #[error("Invalid value for {property}: {value}")]
    InvalidProperty { property: String, value: String },
}

/// Every failure a request can end in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid parameter '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("{0}")]
    Store(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Unknown resource kind '{resource}' in method '{method}'")]
    UnknownResource { method: String, resource: String },

    #[error("Unsupported method: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error")]
    Internal,
}

impl RpcError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RpcError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            RpcError::MalformedRequest(_) => code::MALFORMED_REQUEST,
            RpcError::Validation { .. } => code::INVALID_PARAMETERS,
            RpcError::NotFound { .. } => code::RESOURCE_NOT_FOUND,
            RpcError::AuthFailure(_) => code::AUTHENTICATION_FAILED,
            RpcError::Store(_) | RpcError::Codec(_) | RpcError::Internal => code::INTERNAL_ERROR,
            RpcError::UnknownResource { .. } | RpcError::UnsupportedOperation(_) => {
                code::OPERATION_NOT_SUPPORTED
            }
        }
    }

    /// Structured detail for the `error.data` member, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            RpcError::Validation { field, .. } => Some(json!({ "field": field })),
            RpcError::NotFound { kind, id } => Some(json!({ "kind": kind, "id": id })),
            RpcError::UnknownResource { method, .. } => Some(json!({ "method": method })),
            RpcError::UnsupportedOperation(method) => Some(json!({ "method": method })),
            _ => None,
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Auth(msg) => RpcError::AuthFailure(msg),
            StoreError::Backend(_) => RpcError::Store(err.to_string()),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
