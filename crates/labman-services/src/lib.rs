//! labman service implementations
//!
//! The lab store, template materializer, notebook-server supervisor and
//! lifecycle notifier, plus the `LabManager` that wires them together and
//! the `LabService` that exposes it over JSON-RPC.

pub mod config;
pub mod dialog;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod opener;
pub mod service;
pub mod store;
pub mod supervisor;
pub mod template;

pub use config::{ConfigStore, LabConfig};
pub use error::{LabError, LabResult, TemplateKind};
pub use manager::LabManager;
pub use notifier::{LifecycleEvent, Notifier, NotifySender};
pub use service::LabService;
pub use store::LabStore;
pub use supervisor::{Supervisor, SupervisorConfig};

use labman_protocol::HandlerResult;

/// Trait implemented by all services.
///
/// Each service handles a namespace of methods (e.g., "lab/*").
/// The router passes the full method string to `handle`.
pub trait Service: Send + Sync {
    /// The namespace prefix this service handles (e.g., "lab").
    fn namespace(&self) -> &str;

    /// Handle a JSON-RPC request within this service's namespace.
    ///
    /// `method` is the full method string (e.g., "lab/create").
    /// `params` is the optional JSON parameters.
    fn handle(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;

    /// Initialize the service (called once at startup).
    fn init(&self) -> impl std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send {
        async { Ok(()) }
    }

    /// Shutdown the service (called once at server shutdown).
    fn shutdown(&self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}
