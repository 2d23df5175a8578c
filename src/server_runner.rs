//! Listener binding and the accept loop
//!
//! A bind failure is fatal at startup. Once listening, every accepted
//! connection is dispatched to the request-handler collaborator as its own
//! task and its handle recorded in the task registry. The loop exits only
//! through the shutdown coordinator.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::core::Server;
use crate::error::ProxyError;
use crate::logger::log;

/// Bind the listening socket with SO_REUSEADDR for fast restarts.
/// Fatal on failure, there is no proxy without a listener.
pub fn bind_listener(config: &ServerConfig) -> crate::error::Result<TcpListener> {
    let addr = config.listen_addr();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|_| ProxyError::Bind(format!("invalid listen address {}", addr)))?;

    let socket = socket2::Socket::new(
        match socket_addr {
            std::net::SocketAddr::V4(_) => socket2::Domain::IPV4,
            std::net::SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    // Allow immediate rebind after restart (skip TIME_WAIT)
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&socket_addr.into())
        .map_err(|e| ProxyError::Bind(format!("failed to bind {}: {}", addr, e)))?;
    socket
        .listen(config.tcp_backlog)
        .map_err(|e| ProxyError::Bind(format!("failed to listen on {}: {}", addr, e)))?;

    let listener = TcpListener::from_std(socket.into())?;
    log::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}

/// Run the accept loop until shutdown
///
/// Accept errors are classified: an error while shutdown is in progress is
/// the expected termination signal and ends the loop cleanly; any other
/// accept error is logged and the loop keeps accepting. The listener is
/// dropped (socket released) when this returns.
pub async fn run_server(server: Arc<Server>, listener: TcpListener) -> Result<()> {
    let shutdown = server.shutdown_token();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Shutdown requested, listener closing");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    // The running flag drops at shutdown step 1, before the
                    // listener closes; connections racing the drain are
                    // refused here instead of being dispatched unsupervised.
                    if !server.is_running() {
                        log::debug!(peer = %peer, "Connection refused, shutdown in progress");
                        drop(stream);
                        continue;
                    }

                    let peer_addr = peer.to_string();
                    log::connection(&peer_addr, "new");

                    let handler = Arc::clone(&server.handler);
                    let store = server.store.clone();
                    let handle = tokio::spawn(async move {
                        if let Err(e) = handler.handle(stream, peer, store).await {
                            log::debug!(peer = %peer_addr, error = %e, "Handler task failed");
                        }
                        log::connection(&peer.to_string(), "closed");
                    });
                    server.registry.register(handle);
                }
                Err(e) => {
                    if shutdown.is_cancelled() || !server.is_running() {
                        // The listening socket was torn down on purpose
                        log::info!(error = %e, "Accept interrupted by shutdown");
                        break;
                    }
                    log::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    log::info!("Listener released");
    Ok(())
}
