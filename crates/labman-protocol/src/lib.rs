//! labman protocol types
//!
//! JSON-RPC 2.0 compatible types spoken between the lab manager and an
//! embedding UI. This crate is the single source of truth for method
//! names, notification names, and error codes.

pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod notifications;

pub use error::{RpcError, RpcErrorCode};
pub use jsonrpc::{
    HandlerResult, RequestId, RpcErrorResponse, RpcNotification, RpcRequest, RpcResponse,
    RpcSuccessResponse,
};
pub use methods::{MethodName, Methods};
pub use notifications::{NotificationName, Notifications};
