//! Graceful shutdown sequence
//!
//! Invoked from the console (`close`) or the signal handler; whichever
//! arrives first runs the sequence, later invocations are no-ops. Order:
//! stop admitting, persist both stores, drain in-flight handler tasks,
//! release the listening socket.

use crate::core::Server;
use crate::logger::log;

/// Run the ordered shutdown sequence exactly once.
///
/// Each persistence step is fail-soft: a save error is logged and the
/// sequence continues. The task drain is bounded by the configured drain
/// timeout; tasks that outlive it are logged and left behind.
pub async fn shutdown(server: &Server) {
    if !server.begin_shutdown() {
        log::debug!("Shutdown already in progress, ignoring");
        return;
    }

    log::info!("Closing the server..");

    // 1. No new connections are admitted past this point
    server.stop_running();

    // 2. Persist both stores, independently and fail-soft
    if let Err(e) = server.state_files.save_cache(&server.store) {
        log::warn!(error = %e, "Failed to save cache store");
    }
    if let Err(e) = server.state_files.save_blocklist(&server.store) {
        log::warn!(error = %e, "Failed to save blocklist store");
    }

    // 3. Wait for in-flight handler tasks, bounded
    let pending = server.registry.drain(server.config.drain_timeout).await;
    if pending > 0 {
        log::warn!(pending, "Handler tasks abandoned after drain timeout");
    }

    // 4. Unblock the acceptor and the console; the accept loop drops the
    //    listener on its way out
    server.shutdown_token().cancel();

    log::info!("Shutdown sequence complete");
}
