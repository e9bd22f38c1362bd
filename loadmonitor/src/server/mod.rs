//! WebSocket transport.
//!
//! Every accepted connection is one subscriber session:
//!
//! - client → server: [`LoadRequest`] JSON text frames. The first non-empty
//!   request subscribes, later ones replace the watched set, an empty list
//!   unsubscribes while keeping the connection open.
//! - server → client: [`AirportLoad`](crate::protocol::AirportLoad) JSON text
//!   frames, pushed by the subscriber's delivery worker.
//!
//! Closing the connection unsubscribes. Malformed frames are logged and
//! ignored.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastCoordinator, CoordinatorError};
use crate::delivery::{Deliver, WebSocketSink};
use crate::protocol::LoadRequest;
use crate::subscription::{normalize_codes, SubscriberId};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:50051";

/// Errors from the WebSocket transport.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

/// Bind a listener for [`serve`].
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each connection runs in its own task under a child token, so shutdown
/// also closes every open session.
pub async fn serve(
    listener: TcpListener,
    coordinator: BroadcastCoordinator,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let local = listener.local_addr().map_err(ServerError::LocalAddr)?;
    info!(addr = %local, "Load server listening");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let coordinator = coordinator.clone();
                    let session_shutdown = shutdown.child_token();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, coordinator, session_shutdown).await {
                            debug!(peer = %peer, error = %e, "Session ended with error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            },
        }
    }

    info!(addr = %local, "Load server stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: BroadcastCoordinator,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    info!(peer = %peer, "Client connected");

    let (write, mut read) = ws.split();
    let sink = Arc::new(WebSocketSink::new(peer.to_string(), write));
    let deliver: Arc<dyn Deliver> = sink.clone();
    let mut subscriber: Option<SubscriberId> = None;

    let outcome = 'session: loop {
        let frame = tokio::select! {
            biased;

            _ = shutdown.cancelled() => break 'session Ok(()),

            frame = read.next() => frame,
        };

        match frame {
            None | Some(Ok(Message::Close(_))) => break Ok(()),
            Some(Err(e)) => {
                debug!(peer = %peer, error = %e, "Read failed");
                break Ok(());
            }
            Some(Ok(Message::Text(text))) => {
                let request = match serde_json::from_str::<LoadRequest>(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Ignoring malformed request");
                        continue;
                    }
                };
                if let Err(e) = apply_request(&coordinator, &mut subscriber, request, &deliver) {
                    break Err(e);
                }
            }
            Some(Ok(_)) => {}
        }
    };

    if let Some(id) = subscriber {
        let _ = coordinator.unsubscribe(id);
    }
    drop(deliver);
    sink.close().await;
    info!(peer = %peer, "Client disconnected");

    outcome.map_err(ServerError::from)
}

/// Apply one request to a session's subscription.
fn apply_request(
    coordinator: &BroadcastCoordinator,
    subscriber: &mut Option<SubscriberId>,
    request: LoadRequest,
    sink: &Arc<dyn Deliver>,
) -> Result<(), CoordinatorError> {
    let codes = normalize_codes(&request.airport_codes);

    if codes.is_empty() {
        if let Some(id) = subscriber.take() {
            let _ = coordinator.unsubscribe(id);
        }
        return Ok(());
    }

    if let Some(id) = *subscriber {
        match coordinator.update_subscription(id, &codes) {
            Ok(_) => return Ok(()),
            // Dropped after repeated delivery failures; start over
            Err(CoordinatorError::UnknownSubscriber(_)) => {}
            Err(e) => return Err(e),
        }
    }

    *subscriber = Some(coordinator.subscribe(&codes, Arc::clone(sink))?);
    Ok(())
}
