//! Socket transport: the packet sink seam and the tokio-tungstenite client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::packet::WirePacket;

/// Why the socket went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// This side closed the connection on purpose
    IntentionalLocal,
    /// The remote side closed the connection on purpose
    IntentionalRemote,
    /// Anything else; left to the socket layer's own reconnection
    Transient,
}

impl DisconnectReason {
    /// Whether tracked participants should be torn down
    pub fn is_intentional(&self) -> bool {
        matches!(self, Self::IntentionalLocal | Self::IntentionalRemote)
    }
}

/// Events surfaced by the socket reader
#[derive(Debug)]
pub enum SocketEvent {
    /// A decoded inbound packet
    Packet(WirePacket),
    /// The connection ended
    Disconnected(DisconnectReason),
}

/// Where outbound packets go.
///
/// Sending while disconnected is a silent no-op: the retry mechanism is the
/// recovery path, not an error.
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: &WirePacket);
    fn is_connected(&self) -> bool;
    fn close(&self);
}

enum Outbound {
    Packet(String),
    Close,
}

/// Production sink feeding the socket writer task
pub struct SocketSink {
    outbound: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl PacketSink for SocketSink {
    fn send(&self, packet: &WirePacket) {
        if !self.is_connected() {
            debug!(packet_id = %packet.id, "socket disconnected, dropping outbound packet");
            return;
        }
        match serde_json::to_string(packet) {
            Ok(text) => {
                let _ = self.outbound.send(Outbound::Packet(text));
            }
            Err(error) => warn!(%error, "failed to encode outbound packet"),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Establish the persistent socket connection.
///
/// Returns the sink for outbound packets and the inbound event stream; the
/// reader and writer tasks are spawned here and live until the connection
/// ends.
pub async fn connect(
    endpoint: &str,
) -> BridgeResult<(Arc<SocketSink>, mpsc::UnboundedReceiver<SocketEvent>)> {
    let (stream, _) = connect_async(endpoint)
        .await
        .map_err(|source| BridgeError::Connect {
            endpoint: endpoint.to_string(),
            source: Box::new(source),
        })?;
    debug!(%endpoint, "socket connected");

    let (mut writer, mut reader) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SocketEvent>();
    let connected = Arc::new(AtomicBool::new(true));

    // writer: drain outbound packets into the socket
    tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            let result = match outbound {
                Outbound::Packet(text) => writer.send(Message::Text(text)).await,
                Outbound::Close => {
                    let _ = writer.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(error) = result {
                warn!(%error, "socket write failed");
                break;
            }
        }
    });

    // reader: decode frames into packets until the connection ends
    let reader_connected = connected.clone();
    tokio::spawn(async move {
        let reason = loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WirePacket>(&text) {
                    Ok(packet) => {
                        let _ = event_tx.send(SocketEvent::Packet(packet));
                    }
                    Err(error) => warn!(%error, "ignoring malformed inbound packet"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let intentional = frame
                        .as_ref()
                        .map(|f| matches!(f.code, CloseCode::Normal | CloseCode::Away))
                        .unwrap_or(false);
                    break if intentional {
                        DisconnectReason::IntentionalRemote
                    } else {
                        DisconnectReason::Transient
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "socket read failed");
                    break DisconnectReason::Transient;
                }
                None => break DisconnectReason::Transient,
            }
        };
        reader_connected.store(false, Ordering::SeqCst);
        let _ = event_tx.send(SocketEvent::Disconnected(reason));
    });

    let sink = Arc::new(SocketSink {
        outbound: outbound_tx,
        connected,
    });
    Ok((sink, event_rx))
}
