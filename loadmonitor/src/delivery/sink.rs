//! `Deliver` implementations.

use futures_util::{Sink, SinkExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::{BoxFuture, Deliver, DeliveryError};
use crate::protocol::AirportLoad;

/// Hands updates to an in-process receiver without waiting.
///
/// ```
/// use loadmonitor::delivery::{ChannelSink, Deliver};
/// use loadmonitor::protocol::AirportLoad;
/// use loadmonitor::tracker::EventSet;
///
/// # tokio_test_block(async {
/// let (sink, mut rx) = ChannelSink::new("console");
/// sink.deliver(AirportLoad::from_events("LAX", &EventSet::default())).await.unwrap();
/// assert_eq!(rx.recv().await.unwrap().airport_code, "LAX");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    name: String,
    tx: mpsc::UnboundedSender<AirportLoad>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes its updates.
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<AirportLoad>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

impl Deliver for ChannelSink {
    fn deliver(&self, update: AirportLoad) -> BoxFuture<'_, Result<(), DeliveryError>> {
        let result = self.tx.send(update).map_err(|_| DeliveryError::Closed);
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        format!("channel:{}", self.name)
    }
}

/// Wraps a synchronous push callback.
///
/// The callback receives the same summary the remote transports ship:
/// airport code, arrival count and ids, departure count and ids.
pub struct FnSink<F>
where
    F: Fn(&AirportLoad) -> Result<(), DeliveryError> + Send + Sync,
{
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(&AirportLoad) -> Result<(), DeliveryError> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Deliver for FnSink<F>
where
    F: Fn(&AirportLoad) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, update: AirportLoad) -> BoxFuture<'_, Result<(), DeliveryError>> {
        let result = (self.callback)(&update);
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        "callback".to_string()
    }
}

/// Persistent stream to one WebSocket client.
///
/// Owns the write half of the connection; the read half stays with the
/// server's connection handler.
pub struct WebSocketSink<S> {
    peer: String,
    sink: Mutex<S>,
}

impl<S> WebSocketSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    pub fn new(peer: impl Into<String>, sink: S) -> Self {
        Self {
            peer: peer.into(),
            sink: Mutex::new(sink),
        }
    }

    /// Send a close frame and flush. Errors are ignored; the peer may
    /// already be gone.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}

impl<S> Deliver for WebSocketSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    fn deliver(&self, update: AirportLoad) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async move {
            let json = serde_json::to_string(&update)?;
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(json)).await.map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => DeliveryError::Closed,
                other => DeliveryError::Transport(other.to_string()),
            })
        })
    }

    fn describe(&self) -> String {
        format!("ws:{}", self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::EventSet;
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn load(code: &str) -> AirportLoad {
        AirportLoad::from_events(code, &EventSet::default())
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new("test");
        sink.deliver(load("LAX")).await.unwrap();
        sink.deliver(load("JFK")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().airport_code, "LAX");
        assert_eq!(rx.recv().await.unwrap().airport_code, "JFK");
        assert_eq!(sink.describe(), "channel:test");
    }

    #[tokio::test]
    async fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelSink::new("test");
        drop(rx);
        assert!(matches!(
            sink.deliver(load("LAX")).await,
            Err(DeliveryError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_fn_sink_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sink = FnSink::new(move |update: &AirportLoad| {
            assert_eq!(update.airport_code, "SEA");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        sink.deliver(load("SEA")).await.unwrap();
        sink.deliver(load("SEA")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_websocket_sink_writes_json_text() {
        let (tx, mut rx) = fmpsc::unbounded::<Message>();
        let sink = WebSocketSink::new(
            "127.0.0.1:9999",
            tx.sink_map_err(|_| WsError::ConnectionClosed),
        );

        sink.deliver(load("ORD")).await.unwrap();

        let Some(Message::Text(text)) = rx.next().await else {
            panic!("expected a text frame");
        };
        let decoded: AirportLoad = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.airport_code, "ORD");
        assert_eq!(sink.describe(), "ws:127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_websocket_sink_closed_peer() {
        let (tx, rx) = fmpsc::unbounded::<Message>();
        drop(rx);
        let sink = WebSocketSink::new("peer", tx.sink_map_err(|_| WsError::ConnectionClosed));

        assert!(matches!(
            sink.deliver(load("ORD")).await,
            Err(DeliveryError::Closed)
        ));
    }
}
