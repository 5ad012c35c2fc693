//! Engine transport: outbound WebSocket connection plus the writer task.
//!
//! The connection is split on establishment. The read half goes to the
//! session driver; the write half is owned by a dedicated writer task fed
//! through a bounded channel, so a slow socket applies backpressure to the
//! queue and never to the driver. Frames are enqueued without awaiting; a
//! full queue drops the frame rather than stalling inbound processing.

use bytes::Bytes;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::core::error::{SessionError, SessionResult};
use crate::core::protocol::EngineCommand;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type EngineReadHalf = SplitStream<WsStream>;

const OUTBOUND_CHANNEL_CAPACITY: usize = 1024;

/// One unit of outbound work for the writer task.
#[derive(Debug)]
pub(crate) enum OutboundFrame {
    /// JSON control message
    Control(EngineCommand),
    /// Locally captured audio, forwarded unmodified
    Audio(Bytes),
    /// Reply to an engine ping
    Pong(Bytes),
    /// Orderly close
    Close,
}

/// Write half of an engine connection.
///
/// Exclusively owned by one session; `close` takes effect exactly once.
pub(crate) struct EngineConnection {
    out_tx: Option<mpsc::Sender<OutboundFrame>>,
}

impl EngineConnection {
    /// Establish the duplex transport to the engine.
    ///
    /// With an API key the handshake carries an `Authorization: Bearer`
    /// header; otherwise the URL is dialed as-is. Returns the write handle
    /// and the read half for the driver.
    pub(crate) async fn connect(
        engine_url: &str,
        api_key: Option<&str>,
    ) -> SessionResult<(Self, EngineReadHalf)> {
        let url = url::Url::parse(engine_url)
            .map_err(|e| SessionError::ConnectionFailed(format!("invalid engine URL: {e}")))?;

        let ws_stream = match api_key {
            Some(key) => {
                let host = match (url.host_str(), url.port()) {
                    (Some(host), Some(port)) => format!("{host}:{port}"),
                    (Some(host), None) => host.to_string(),
                    (None, _) => {
                        return Err(SessionError::ConnectionFailed(
                            "engine URL has no host".to_string(),
                        ));
                    }
                };
                let request = http::Request::builder()
                    .uri(url.as_str())
                    .header("Authorization", format!("Bearer {key}"))
                    .header(
                        "Sec-WebSocket-Key",
                        tungstenite::handshake::client::generate_key(),
                    )
                    .header("Sec-WebSocket-Version", "13")
                    .header("Connection", "Upgrade")
                    .header("Upgrade", "websocket")
                    .header("Host", host)
                    .body(())
                    .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
                let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
                    .await
                    .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
                ws_stream
            }
            None => {
                let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                    .await
                    .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
                ws_stream
            }
        };

        let (mut ws_sink, ws_read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let message = match frame {
                    OutboundFrame::Control(cmd) => match cmd.to_json() {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            tracing::error!("Failed to serialize engine command: {}", e);
                            continue;
                        }
                    },
                    OutboundFrame::Audio(bytes) => Message::Binary(bytes),
                    OutboundFrame::Pong(payload) => Message::Pong(payload),
                    OutboundFrame::Close => break,
                };
                if let Err(e) = ws_sink.send(message).await {
                    tracing::warn!("Engine send failed: {}", e);
                    break;
                }
            }
            let _ = ws_sink.send(Message::Close(None)).await;
        });

        Ok((
            Self {
                out_tx: Some(out_tx),
            },
            ws_read,
        ))
    }

    /// Enqueue a control message. Returns false if the frame was dropped.
    pub(crate) fn send_control(&self, cmd: EngineCommand) -> bool {
        self.enqueue(OutboundFrame::Control(cmd))
    }

    /// Enqueue a raw capture frame. Returns false if the frame was dropped.
    pub(crate) fn send_audio(&self, frame: Bytes) -> bool {
        self.enqueue(OutboundFrame::Audio(frame))
    }

    /// Enqueue a pong reply.
    pub(crate) fn send_pong(&self, payload: Bytes) {
        self.enqueue(OutboundFrame::Pong(payload));
    }

    /// Close the connection. Idempotent; the first call wins.
    ///
    /// The writer drains what is already queued, sends a close frame, and
    /// exits. Nothing can be enqueued afterwards.
    pub(crate) fn close(&mut self) {
        if let Some(tx) = self.out_tx.take() {
            let _ = tx.try_send(OutboundFrame::Close);
        }
    }

    fn enqueue(&self, frame: OutboundFrame) -> bool {
        let Some(tx) = &self.out_tx else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Engine outbound queue full; dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
