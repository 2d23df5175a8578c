//! Admin console
//!
//! Line-oriented operator loop: list the blocklist or cache keys, add a
//! blocklist entry, or close the server. Runs against any buffered async
//! reader (stdin in the binary). The pending read is cancellable through the
//! shutdown token, so a console blocked on input never delays a shutdown
//! triggered by a signal.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::core::Server;
use crate::logger::log;
use crate::shutdown;
use crate::store::SharedStore;

/// Prompt printed before each read, matching the command table
pub const PROMPT: &str = "Enter a site to block, or \"bloqueados\" to list blocked sites, \
\"cache\" to list cached sites, or \"close\" to stop the server.";

/// What the loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Close,
}

/// Execute one operator command against the store.
///
/// Returns the action for the loop plus the response lines to print.
/// The listing keywords are case-insensitive; `close` is exact; anything
/// else is taken literally as a new blocklist entry. Blank input is ignored.
pub fn execute_command(store: &SharedStore, line: &str) -> (ConsoleAction, Vec<String>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return (ConsoleAction::Continue, Vec::new());
    }

    if trimmed.eq_ignore_ascii_case("bloqueados") {
        let mut out = vec!["Currently blocked sites:".to_string()];
        let mut keys = store.blocked_keys();
        keys.sort();
        out.extend(keys);
        return (ConsoleAction::Continue, out);
    }

    if trimmed.eq_ignore_ascii_case("cache") {
        let mut out = vec!["Currently cached sites:".to_string()];
        let mut keys = store.cache_keys();
        keys.sort();
        out.extend(keys);
        return (ConsoleAction::Continue, out);
    }

    if trimmed == "close" {
        return (ConsoleAction::Close, vec!["Closing the server..".to_string()]);
    }

    store.add_blocked(trimmed.to_string());
    (
        ConsoleAction::Continue,
        vec![format!("{} blocked successfully", trimmed)],
    )
}

/// Run the operator loop until `close`, reader EOF, or shutdown elsewhere
pub async fn run_console<R>(server: Arc<Server>, reader: R)
where
    R: AsyncBufRead + Unpin,
{
    let shutdown_token = server.shutdown_token();
    let mut lines = reader.lines();

    println!("{}", PROMPT);
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                log::debug!("Console loop cancelled by shutdown");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        log::debug!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        log::warn!(error = %e, "Console read failed");
                        break;
                    }
                };

                let (action, output) = execute_command(&server.store, &line);
                for out_line in output {
                    println!("{}", out_line);
                }
                if action == ConsoleAction::Close {
                    shutdown::shutdown(&server).await;
                    break;
                }
                println!("{}", PROMPT);
            }
        }
    }
}
