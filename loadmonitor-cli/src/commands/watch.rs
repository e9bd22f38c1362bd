//! Watch command - interactive client for a running server.
//!
//! Reads airport codes from stdin, sends each line as a subscription
//! request, and prints every update the server pushes. An empty line stops
//! watching without disconnecting; `exit` quits.

use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use loadmonitor::protocol::{AirportLoad, LoadRequest};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::format_update;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Default server to connect to.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:50051";

/// Arguments for the watch command.
pub struct WatchArgs {
    pub server: String,
}

/// Run the watch command.
pub fn run(
    args: WatchArgs,
    config_path: Option<&Path>,
    log_level: Option<&str>,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, log_level)?;
    runner.log_startup("watch");

    let shutdown = runner.shutdown_on_ctrlc()?;
    let runtime = runner.runtime()?;
    let result = runtime.block_on(watch(&args.server, shutdown));

    // A pending stdin read would otherwise hold the runtime open
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn watch(url: &str, shutdown: CancellationToken) -> Result<(), CliError> {
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    info!(url, "Connected");
    println!("Connected to {}", url);
    println!("Enter airport codes separated by spaces (empty line stops watching, 'exit' quits)");

    let (mut write, mut read) = ws.split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            frame = read.next() => match frame {
                None | Some(Ok(Message::Close(_))) => {
                    println!("Server closed the connection");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<AirportLoad>(&text) {
                    Ok(update) => println!("{}", format_update(&update)),
                    Err(e) => warn!(error = %e, "Ignoring unexpected message"),
                },
                Some(Ok(_)) => {}
            },

            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.map_err(CliError::Input)? else {
                    // Keep printing updates until Ctrl+C
                    stdin_open = false;
                    continue;
                };
                if line.trim().eq_ignore_ascii_case("exit") {
                    break;
                }

                let request = LoadRequest::from_line(&line);
                if request.airport_codes.is_empty() {
                    println!("Stopped watching");
                } else {
                    println!("Watching {}", request.airport_codes.join(" "));
                }
                let json = serde_json::to_string(&request)?;
                write.send(Message::Text(json)).await?;
            }
        }
    }

    let _ = write.send(Message::Close(None)).await;
    println!("Disconnected.");
    Ok(())
}
