//! Full-lifecycle tests: load, accept, dispatch, console, shutdown, persist.

use async_trait::async_trait;
use clap::Parser;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::Barrier;

use proxy_gate::config::{CliArgs, ServerConfig};
use proxy_gate::{
    console, server_runner, shutdown, RequestHandler, Server, SharedStore, StateFiles,
};

/// Handler that holds its connection open until every expected peer has
/// arrived, then records a completion marker in the cache.
struct BarrierHandler {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl RequestHandler for BarrierHandler {
    async fn handle(
        &self,
        _stream: TcpStream,
        peer: SocketAddr,
        store: SharedStore,
    ) -> anyhow::Result<()> {
        self.barrier.wait().await;
        // Simulate forwarding work still in flight when `close` arrives
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.insert(format!("completed:{}", peer.port()), PathBuf::from("-"));
        Ok(())
    }
}

fn build_server(dir: &TempDir, handler: Option<Arc<dyn RequestHandler>>) -> Arc<Server> {
    let cli = CliArgs::parse_from([
        "proxy-gate",
        "--host",
        "127.0.0.1",
        "--port",
        "0",
        "--drain-timeout",
        "5s",
    ]);
    let config = ServerConfig::from_cli(&cli);

    let state_files = StateFiles::new(dir.path().to_path_buf());
    state_files.ensure_data_dir().unwrap();
    let store = SharedStore::new();
    state_files.load_cache(&store);
    state_files.load_blocklist(&store);

    let mut builder = Server::builder()
        .store(store)
        .state_files(state_files)
        .config(config);
    if let Some(handler) = handler {
        builder = builder.handler(handler);
    }
    Arc::new(builder.build())
}

#[tokio::test]
async fn startup_with_no_files_creates_empty_stores_and_files() {
    let dir = TempDir::new().unwrap();
    let server = build_server(&dir, None);

    assert_eq!(server.store.cache_len(), 0);
    assert_eq!(server.store.blocked_len(), 0);
    assert!(server.state_files.cache_path().exists());
    assert!(server.state_files.blocklist_path().exists());
}

#[tokio::test]
async fn operator_block_command_end_to_end() {
    let dir = TempDir::new().unwrap();
    let server = build_server(&dir, None);

    let input = Cursor::new(b"badsite.com\nclose\n".to_vec());
    console::run_console(Arc::clone(&server), input).await;

    assert!(server.store.is_blocked("badsite.com"));
    assert!(!server.store.is_blocked("goodsite.com"));

    // The blocklist survives a warm restart
    let restarted = SharedStore::new();
    server.state_files.load_blocklist(&restarted);
    assert!(restarted.is_blocked("badsite.com"));
    assert!(!restarted.is_blocked("goodsite.com"));
}

#[tokio::test]
async fn close_with_two_inflight_connections_drains_and_persists() {
    let dir = TempDir::new().unwrap();
    // Two clients plus the test itself
    let barrier = Arc::new(Barrier::new(3));
    let handler = Arc::new(BarrierHandler {
        barrier: Arc::clone(&barrier),
    });
    let server = build_server(&dir, Some(handler));
    server
        .store
        .insert("http://example.com/".to_string(), PathBuf::from("cached/example_0"));

    let listener = server_runner::bind_listener(&server.config).unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_task = tokio::spawn(server_runner::run_server(Arc::clone(&server), listener));

    // Two connections being serviced
    let _c1 = TcpStream::connect(addr).await.unwrap();
    let _c2 = TcpStream::connect(addr).await.unwrap();
    barrier.wait().await;

    // Operator issues `close` while both are in flight
    let console_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            console::run_console(server, Cursor::new(b"close\n".to_vec())).await;
        })
    };
    console_task.await.unwrap();
    accept_task.await.unwrap().unwrap();

    // Both in-flight tasks ran to completion, zero tasks remain
    assert_eq!(server.store.cache_keys().iter().filter(|k| k.starts_with("completed:")).count(), 2);
    assert!(server.registry.is_empty());
    assert!(!server.is_running());

    // Both store files were written at shutdown
    let restarted = SharedStore::new();
    server.state_files.load_cache(&restarted);
    assert_eq!(
        restarted.lookup("http://example.com/"),
        Some(PathBuf::from("cached/example_0"))
    );

    // No further connections are accepted
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn warm_restart_reproduces_both_stores() {
    let dir = TempDir::new().unwrap();

    {
        let server = build_server(&dir, None);
        server.store.insert("url-a".to_string(), PathBuf::from("cached/a"));
        server.store.insert("url-b".to_string(), PathBuf::from("cached/b"));
        server.store.add_blocked("badsite.com".to_string());
        shutdown::shutdown(&server).await;
    }

    // Second process lifetime against the same data directory
    let server = build_server(&dir, None);
    assert_eq!(server.store.cache_len(), 2);
    assert_eq!(server.store.lookup("url-a"), Some(PathBuf::from("cached/a")));
    assert_eq!(server.store.lookup("url-b"), Some(PathBuf::from("cached/b")));
    assert!(server.store.is_blocked("badsite.com"));
    assert!(!server.store.is_blocked("url-a"));
}

#[tokio::test]
async fn corrupt_state_file_does_not_abort_startup() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cached_sites.bin"), b"\xde\xad\xbe\xef garbage").unwrap();

    let server = build_server(&dir, None);
    // Fail-soft: empty cache, blocklist unaffected
    assert_eq!(server.store.cache_len(), 0);
    assert_eq!(server.store.blocked_len(), 0);
}

#[tokio::test]
async fn handler_tasks_share_one_store_with_console() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(2));
    let handler = Arc::new(BarrierHandler {
        barrier: Arc::clone(&barrier),
    });
    let server = build_server(&dir, Some(handler));

    let listener = server_runner::bind_listener(&server.config).unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_task = tokio::spawn(server_runner::run_server(Arc::clone(&server), listener));

    let _client = TcpStream::connect(addr).await.unwrap();
    barrier.wait().await;

    // Console mutation is visible to everything holding the store
    let (_, _) = (
        console::execute_command(&server.store, "badsite.com"),
        console::execute_command(&server.store, "bloqueados"),
    );
    assert!(server.store.is_blocked("badsite.com"));

    shutdown::shutdown(&server).await;
    accept_task.await.unwrap().unwrap();

    // The handler observed the same store instance
    assert_eq!(
        server
            .store
            .cache_keys()
            .iter()
            .filter(|k| k.starts_with("completed:"))
            .count(),
        1
    );
}
