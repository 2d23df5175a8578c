//! Server handle bundle
//!
//! One `Server` per process, created at startup and shared (via `Arc`) by
//! the acceptor, the admin console, every dispatched handler task and the
//! shutdown coordinator. Nothing in here is reachable through globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::hooks::{NullHandler, RequestHandler};
use crate::config::ServerConfig;
use crate::persist::StateFiles;
use crate::registry::TaskRegistry;
use crate::store::SharedStore;

pub struct Server {
    /// Shared cache and blocklist maps
    pub store: SharedStore,
    /// Handles of in-flight handler tasks
    pub registry: TaskRegistry,
    /// Persistence manager for the two state files
    pub state_files: StateFiles,
    /// Request-handler collaborator, one call per accepted connection
    pub handler: Arc<dyn RequestHandler>,
    /// Runtime configuration
    pub config: ServerConfig,
    /// True while the acceptor should keep accepting. Written only by the
    /// shutdown coordinator; SeqCst so no task observes a stale value.
    running: AtomicBool,
    /// Cancels the acceptor's and console's pending waits at shutdown
    shutdown_token: CancellationToken,
    /// Guards the shutdown sequence against re-entry
    shutdown_started: AtomicBool,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the acceptor admitting new connections
    pub fn stop_running(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Claim the shutdown sequence. True for the first caller only; every
    /// later call is a no-op signal.
    pub fn begin_shutdown(&self) -> bool {
        !self.shutdown_started.swap(true, Ordering::SeqCst)
    }
}

/// Builder for constructing a Server
pub struct ServerBuilder {
    store: Option<SharedStore>,
    state_files: Option<StateFiles>,
    handler: Option<Arc<dyn RequestHandler>>,
    config: Option<ServerConfig>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            state_files: None,
            handler: None,
            config: None,
        }
    }

    /// Set the shared state store (defaults to a fresh empty store)
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the persistence manager
    pub fn state_files(mut self, state_files: StateFiles) -> Self {
        self.state_files = Some(state_files);
        self
    }

    /// Set the request handler (defaults to [`NullHandler`])
    pub fn handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the runtime configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the server
    ///
    /// Panics if state_files or config is not set
    pub fn build(self) -> Server {
        Server {
            store: self.store.unwrap_or_default(),
            registry: TaskRegistry::new(),
            state_files: self.state_files.expect("state_files is required"),
            handler: self.handler.unwrap_or_else(|| Arc::new(NullHandler)),
            config: self.config.expect("config is required"),
            running: AtomicBool::new(true),
            shutdown_token: CancellationToken::new(),
            shutdown_started: AtomicBool::new(false),
        }
    }
}
