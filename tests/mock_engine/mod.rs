//! Mock conversational engine
//!
//! Simulates the engine's WebSocket wire protocol so session and bridge
//! tests run without a live deployment:
//! - `session_created` acknowledgment on connect
//! - `conversation_started` / `conversation_ended` replies to start/stop
//! - Arbitrary scripted frames (audio, transcripts, malformed payloads)
//! - Full capture of everything the peer sent

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Automatic replies the mock engine produces on its own.
#[derive(Debug, Clone, Copy)]
pub struct AutoReplies {
    /// Send `session_created` as soon as a connection is accepted
    pub ack_connect: bool,
    /// Reply `conversation_started` to a `start` control message
    pub ack_start: bool,
    /// Reply `conversation_ended` to a `stop` control message
    pub ack_stop: bool,
}

impl Default for AutoReplies {
    fn default() -> Self {
        Self {
            ack_connect: true,
            ack_start: true,
            ack_stop: true,
        }
    }
}

impl AutoReplies {
    /// Engine that acknowledges the connection but nothing else.
    pub fn silent_after_ack() -> Self {
        Self {
            ack_connect: true,
            ack_start: false,
            ack_stop: false,
        }
    }
}

/// What the mock engine observed from the peer.
#[derive(Debug)]
pub enum Observation {
    /// A parsed JSON control message
    Control(Value),
    /// A raw binary capture frame
    Audio(Vec<u8>),
    /// The peer closed or dropped the connection
    Closed,
}

/// Scripted frames pushed into the mock engine by a test.
#[derive(Debug)]
enum Action {
    SendJson(Value),
    SendRaw(String),
    SendBinary(Vec<u8>),
    Close,
}

/// Handle to a running mock engine.
///
/// Accepts connections sequentially; observations and scripted actions
/// share one channel pair across connections, which is all the tests need
/// since each exercises a single session.
pub struct MockEngine {
    addr: SocketAddr,
    action_tx: mpsc::UnboundedSender<Action>,
    observed_rx: mpsc::UnboundedReceiver<Observation>,
}

impl MockEngine {
    /// Bind on an ephemeral port and start accepting connections.
    pub async fn start(replies: AutoReplies) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock engine");
        let addr = listener.local_addr().unwrap();

        let (action_tx, mut action_rx) = mpsc::unbounded_channel();
        let (observed_tx, observed_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut connection_count = 0u64;
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                connection_count += 1;
                handle_connection(
                    stream,
                    connection_count,
                    replies,
                    &mut action_rx,
                    &observed_tx,
                )
                .await;
            }
        });

        Self {
            addr,
            action_tx,
            observed_rx,
        }
    }

    /// WebSocket URL the peer should dial.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push one JSON frame to the connected peer.
    pub fn send(&self, value: Value) {
        let _ = self.action_tx.send(Action::SendJson(value));
    }

    /// Push a raw text frame, bypassing JSON encoding.
    pub fn send_raw(&self, text: &str) {
        let _ = self.action_tx.send(Action::SendRaw(text.to_string()));
    }

    /// Push a binary frame.
    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.action_tx.send(Action::SendBinary(data));
    }

    /// Close the connection from the engine side.
    pub fn close(&self) {
        let _ = self.action_tx.send(Action::Close);
    }

    /// Next observation, failing the test after a timeout.
    pub async fn next(&mut self) -> Observation {
        timeout(EXPECT_TIMEOUT, self.observed_rx.recv())
            .await
            .expect("mock engine observed nothing in time")
            .expect("mock engine observation channel closed")
    }

    /// Expect the next observation to be a control message of `msg_type`.
    pub async fn expect_control(&mut self, msg_type: &str) -> Value {
        match self.next().await {
            Observation::Control(value) => {
                assert_eq!(
                    value.get("type").and_then(Value::as_str),
                    Some(msg_type),
                    "unexpected control message: {value}"
                );
                value
            }
            other => panic!("expected {msg_type} control message, got {other:?}"),
        }
    }

    /// Expect the next observation to be a binary capture frame.
    pub async fn expect_audio(&mut self) -> Vec<u8> {
        match self.next().await {
            Observation::Audio(data) => data,
            other => panic!("expected capture frame, got {other:?}"),
        }
    }

    /// Expect the peer to close the connection.
    pub async fn expect_closed(&mut self) {
        loop {
            match self.next().await {
                Observation::Closed => return,
                // A stop control racing the close is fine
                Observation::Control(_) => {}
                other => panic!("expected close, got {other:?}"),
            }
        }
    }

    /// Drain observations for `window` and fail if a `start` control shows up.
    pub async fn assert_never_started(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match timeout(remaining, self.observed_rx.recv()).await {
                Ok(Some(Observation::Control(value))) => {
                    assert_ne!(
                        value.get("type").and_then(Value::as_str),
                        Some("start"),
                        "engine received start after the session was stopped"
                    );
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return,
            }
        }
    }
}

/// Serve one connection until the peer goes away.
async fn handle_connection(
    stream: TcpStream,
    connection_id: u64,
    replies: AutoReplies,
    action_rx: &mut mpsc::UnboundedReceiver<Action>,
    observed_tx: &mpsc::UnboundedSender<Observation>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    if replies.ack_connect {
        let ack = json!({
            "type": "session_created",
            "session_id": format!("engine-{connection_id}"),
            "message": "Session created",
        });
        if write
            .send(Message::Text(ack.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    loop {
        tokio::select! {
            maybe_msg = read.next() => match maybe_msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let msg_type = value.get("type").and_then(Value::as_str).map(str::to_string);
                    let _ = observed_tx.send(Observation::Control(value));

                    match msg_type.as_deref() {
                        Some("start") if replies.ack_start => {
                            let reply = json!({
                                "type": "conversation_started",
                                "message": "Conversation started",
                            });
                            let _ = write.send(Message::Text(reply.to_string().into())).await;
                        }
                        Some("stop") if replies.ack_stop => {
                            let reply = json!({
                                "type": "conversation_ended",
                                "message": "Conversation ended",
                            });
                            let _ = write.send(Message::Text(reply.to_string().into())).await;
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = observed_tx.send(Observation::Audio(data.to_vec()));
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    let _ = observed_tx.send(Observation::Closed);
                    return;
                }
                Some(Ok(_)) => {}
            },
            maybe_action = action_rx.recv() => match maybe_action {
                Some(Action::SendJson(value)) => {
                    let _ = write.send(Message::Text(value.to_string().into())).await;
                }
                Some(Action::SendRaw(text)) => {
                    let _ = write.send(Message::Text(text.into())).await;
                }
                Some(Action::SendBinary(data)) => {
                    let _ = write.send(Message::Binary(data.into())).await;
                }
                Some(Action::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
                None => return,
            },
        }
    }
}
