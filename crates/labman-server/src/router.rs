//! Router: dispatches JSON-RPC requests to services.

use labman_protocol::methods::is_known_method;
use labman_protocol::{HandlerResult, RpcError, RpcErrorCode, RpcNotification};
use labman_services::{Notifier, Service};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::stdio::RequestHandler;

/// The lab server: owns services and routes requests.
pub struct LabServer {
    /// Registered services (boxed for object safety)
    services: Vec<Box<dyn ServiceDyn>>,
    state: RwLock<ServerState>,
    /// Notification sender (for broadcasting to clients)
    notification_tx: Option<broadcast::Sender<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
    Shutdown,
}

/// Object-safe wrapper for the Service trait.
trait ServiceDyn: Send + Sync {
    fn namespace_dyn(&self) -> &str;
    fn handle_dyn<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>>;
    fn init_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send + '_>>;
    fn shutdown_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>;
}

impl<T: Service> ServiceDyn for T {
    fn namespace_dyn(&self) -> &str {
        self.namespace()
    }
    fn handle_dyn<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(self.handle(method, params))
    }
    fn init_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send + '_>> {
        Box::pin(self.init())
    }
    fn shutdown_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(self.shutdown())
    }
}

impl LabServer {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            state: RwLock::new(ServerState::Uninitialized),
            notification_tx: None,
        }
    }

    /// Register a service with the server.
    pub fn register_service<S: Service + 'static>(&mut self, service: S) {
        info!("Registering service: {}", service.namespace());
        self.services.push(Box::new(service));
    }

    /// Set the notification sender for broadcasting.
    pub fn set_notification_sender(&mut self, tx: broadcast::Sender<String>) {
        self.notification_tx = Some(tx);
    }

    /// Forward every lifecycle event published on `notifier` to clients.
    pub fn attach_notifier(&self, notifier: &Notifier) {
        if let Some(tx) = self.notification_tx.clone() {
            notifier.subscribe(Arc::new(move |method: &str, params: Value| {
                emit(&tx, method, Some(params));
            }));
        }
    }

    /// Initialize all services.
    pub async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for service in &self.services {
            service.init_dyn().await?;
        }

        *self.state.write() = ServerState::Running;
        info!("Lab server initialized ({} services)", self.services.len());
        Ok(())
    }

    /// Shutdown all services.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == ServerState::Shutdown {
                return;
            }
            *state = ServerState::Shutdown;
        }

        info!("Shutting down lab server...");
        for service in &self.services {
            service.shutdown_dyn().await;
        }
        info!("Lab server shutdown complete");
    }

    /// Route a request to the appropriate service.
    async fn route_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        if !is_known_method(method) {
            return Err(RpcError::method_not_found(method));
        }
        let namespace = method.split('/').next().unwrap_or("");

        // First: exact namespace match
        for service in &self.services {
            if service.namespace_dyn() == namespace {
                return service.handle_dyn(method, params).await;
            }
        }

        // Fallback: try all services for multi-namespace handlers
        // (LabService also serves config/* and notebook/*)
        for service in &self.services {
            match service.handle_dyn(method, params.clone()).await {
                Err(e) if e.error_code() == RpcErrorCode::MethodNotFound => continue,
                result => return result,
            }
        }

        Err(RpcError::method_not_found(method))
    }
}

impl Default for LabServer {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(tx: &broadcast::Sender<String>, method: &str, params: Option<Value>) {
    let notification = RpcNotification::new(method, params);
    if let Ok(json) = serde_json::to_string(&notification) {
        // No receivers is fine: nobody is listening yet.
        let _ = tx.send(json);
    }
}

impl RequestHandler for LabServer {
    async fn handle_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        let state = *self.state.read();
        match state {
            ServerState::Shutdown => return Err(RpcError::shutting_down()),
            ServerState::Uninitialized => return Err(RpcError::not_initialized()),
            ServerState::Running => {}
        }

        self.route_request(method, params).await
    }
}
