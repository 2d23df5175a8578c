//! Resident control plane of a caching, filtering forwarding proxy
//!
//! Architecture:
//! - `core/`: Server handle bundle and the request-handler hook trait
//! - `store`: Shared cache and blocklist maps
//! - `persist`: Versioned snapshot files for warm restarts
//! - `registry`: Handles of dispatched handler tasks, drained at shutdown
//! - `server_runner`: Listener binding and the accept loop
//! - `console`: Operator command loop (blocklist edits, shutdown)
//! - `shutdown`: Ordered graceful-shutdown sequence

pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod logger;
pub mod persist;
pub mod registry;
pub mod server_runner;
pub mod shutdown;
pub mod store;

pub use crate::core::{NullHandler, RequestHandler, Server};
pub use crate::persist::StateFiles;
pub use crate::registry::TaskRegistry;
pub use crate::store::SharedStore;
