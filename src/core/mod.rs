//! Core server module
//!
//! - Hook trait for the external per-connection request handler
//! - Server handle bundle shared by the acceptor, console and shutdown path

pub mod hooks;
mod server;

pub use hooks::{NullHandler, RequestHandler};
pub use server::Server;
