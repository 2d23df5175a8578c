//! proxy-gate binary
//!
//! Wires the control plane together: load persisted state, bind the
//! listener, start the admin console and the signal handler, then run the
//! accept loop until shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::BufReader;

use proxy_gate::logger::{self, log};
use proxy_gate::{config, console, server_runner, shutdown, Server, SharedStore, StateFiles};

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = config::CliArgs::parse_args();
    cli.validate()?;

    logger::init_logger(logger::LogLevel::from_str(&cli.log_mode));

    let server_config = config::ServerConfig::from_cli(&cli);
    log::info!(
        addr = %server_config.listen_addr(),
        data_dir = %server_config.data_dir.display(),
        drain_timeout = ?server_config.drain_timeout,
        "Starting proxy control plane"
    );

    // Persistence first: the stores must be warm before anything accepts
    let state_files = StateFiles::new(server_config.data_dir.clone());
    state_files.ensure_data_dir()?;
    let store = SharedStore::new();
    state_files.load_cache(&store);
    state_files.load_blocklist(&store);

    // Bind failure is fatal at startup
    let listener = server_runner::bind_listener(&server_config)?;

    let server = Arc::new(
        Server::builder()
            .store(store)
            .state_files(state_files)
            .config(server_config)
            .build(),
    );

    // Admin console on stdin
    let console_server = Arc::clone(&server);
    tokio::spawn(async move {
        console::run_console(console_server, BufReader::new(tokio::io::stdin())).await;
    });

    // Signals take the same shutdown path as the console `close` command
    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT");
            let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM");

            tokio::select! {
                _ = sigint.recv() => {
                    log::info!("SIGINT received, shutting down...");
                }
                _ = sigterm.recv() => {
                    log::info!("SIGTERM received, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            log::info!("Shutdown signal received...");
        }

        shutdown::shutdown(&signal_server).await;
    });

    // Accept loop; returns once the shutdown coordinator cancels it
    server_runner::run_server(server, listener).await
}
