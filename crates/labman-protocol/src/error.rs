//! Wire error type and JSON-RPC 2.0 error codes, plus the lab-specific range.

use serde::{Deserialize, Serialize};

/// Standard JSON-RPC 2.0 error codes plus lab manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    // JSON-RPC 2.0 standard errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    // Server errors
    ServerError,
    ServerNotInitialized,
    ServerShuttingDown,

    // Lab errors
    LabNotFound,
    TemplateMissing,
    IoFailure,
    NotRunning,
    AlreadyRunning,
    InvalidName,

    Custom(i32),
}

impl RpcErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::ServerNotInitialized => -32001,
            Self::ServerShuttingDown => -32002,
            Self::LabNotFound => -32010,
            Self::TemplateMissing => -32011,
            Self::IoFailure => -32012,
            Self::NotRunning => -32013,
            Self::AlreadyRunning => -32014,
            Self::InvalidName => -32015,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -32001 => Self::ServerNotInitialized,
            -32002 => Self::ServerShuttingDown,
            -32010 => Self::LabNotFound,
            -32011 => Self::TemplateMissing,
            -32012 => Self::IoFailure,
            -32013 => Self::NotRunning,
            -32014 => Self::AlreadyRunning,
            -32015 => Self::InvalidName,
            c => Self::Custom(c),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("RPC error [{code}]: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(RpcErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(RpcErrorCode::ServerNotInitialized, "Server is not initialized")
    }

    pub fn shutting_down() -> Self {
        Self::new(RpcErrorCode::ServerShuttingDown, "Server is shutting down")
    }

    pub fn error_code(&self) -> RpcErrorCode {
        RpcErrorCode::from_code(self.code)
    }
}
