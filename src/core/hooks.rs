//! Hook trait for the request-handler collaborator
//!
//! Protocol-level work (parsing the request, fetching or forwarding content,
//! writing the response) lives entirely behind this seam. The core only
//! dispatches accepted connections to it and lends it a store handle.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpStream;

use crate::store::SharedStore;

/// Per-connection request handler
///
/// One call per accepted connection, run as its own task. The handler owns
/// the connection for its whole lifetime and may call `lookup`, `insert`,
/// `is_blocked` and `add_blocked` on the store at any point. Errors are
/// logged by the dispatch wrapper and never propagate further.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        store: SharedStore,
    ) -> anyhow::Result<()>;
}

/// Handler that closes every connection immediately.
///
/// Builder default, so the control plane runs standalone before a real
/// forwarding handler is plugged in.
pub struct NullHandler;

#[async_trait]
impl RequestHandler for NullHandler {
    async fn handle(
        &self,
        stream: TcpStream,
        _peer: SocketAddr,
        _store: SharedStore,
    ) -> anyhow::Result<()> {
        drop(stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_null_handler_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, peer) = listener.accept().await.unwrap();

        let result = NullHandler
            .handle(stream, peer, SharedStore::new())
            .await;
        assert!(result.is_ok());

        // The peer observes EOF once the handler has dropped the stream
        let mut client = client.await.unwrap();
        let mut buf = [0u8; 1];
        use tokio::io::AsyncReadExt;
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
