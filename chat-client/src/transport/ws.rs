//! WebSocket transport.
//!
//! Each live event travels as one JSON text frame. A writer task owns the
//! sink half of the socket and a reader task decodes frames from the stream
//! half into [`Inbound`] signals.

use super::{Inbound, LiveTransport, TransportError};
use async_trait::async_trait;
use chat_types::{LiveEvent, WireError};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Live transport over a WebSocket connection.
#[derive(Default)]
pub struct WsTransport {
    connection: Mutex<Option<WsConnection>>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    connected: Arc<AtomicBool>,
}

struct WsConnection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsConnection {
    fn shutdown(self) {
        self.reader.abort();
        // Dropping the sender lets the writer flush and close the sink.
        drop(self.outbound);
        drop(self.writer);
    }
}

impl WsTransport {
    /// Create a transport with no connection.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        if let Some(previous) = self.connection.lock().await.take() {
            previous.shutdown();
        }
        // Marked before the reader starts so an immediate drop wins.
        self.connected.store(true, Ordering::SeqCst);
        let connected = Arc::clone(&self.connected);
        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => match LiveEvent::from_json(text.as_str()) {
                        Ok(event) => {
                            if in_tx.send(Inbound::Event(event)).is_err() {
                                return;
                            }
                        }
                        Err(WireError::UnknownEvent(name)) => {
                            debug!("Ignoring unknown live event '{}'", name);
                        }
                        Err(e) => warn!("Dropping malformed live frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                }
            };
            connected.store(false, Ordering::SeqCst);
            let _ = in_tx.send(Inbound::Dropped(reason));
        });

        *self.connection.lock().await = Some(WsConnection {
            outbound: out_tx,
            reader,
            writer,
        });
        *self.inbound.lock().await = Some(in_rx);
        Ok(())
    }

    async fn emit(&self, event: &LiveEvent) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let json = event.to_json()?;
        let connection = self.connection.lock().await;
        let connection = connection.as_ref().ok_or(TransportError::NotConnected)?;
        connection
            .outbound
            .send(Message::text(json))
            .map_err(|_| TransportError::SendFailed("writer task stopped".into()))
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        let mut inbound = self.inbound.lock().await;
        let receiver = inbound.as_mut().ok_or(TransportError::NotConnected)?;
        receiver.recv().await.ok_or(TransportError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(connection) = self.connection.lock().await.take() {
            connection.shutdown();
        }
        Ok(())
    }
}
