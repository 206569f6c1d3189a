//! labman server: routes JSON-RPC requests to services.
//!
//! The server owns all services and provides the `RequestHandler`
//! implementation for the stdio transport.

pub mod router;
pub mod stdio;

pub use router::LabServer;
pub use stdio::{RequestHandler, serve};
