//! The bridge connector.
//!
//! Opens one WebSocket per [`Connector::connect`] call, spawns the socket
//! loop and performs the `login` handshake. The loop never reconnects: when
//! the stream ends it emits a final connection-lost close (unless the bridge
//! already announced a close) and lets the event channel end, leaving the
//! retry decision to the supervisor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use asena_core::{
    BoxedMessageStore, ConnectRequest, ConnectionPhase, Connector, ProtocolEvent, Session,
    TransportError, TransportResult,
};

use crate::api_caller::{ApiCaller, DEFAULT_API_TIMEOUT};
use crate::frame::{BridgeRequest, Inbound, Response, classify};
use crate::socket::BridgeSocket;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connects to a protocol bridge at a `ws://` or `wss://` URL.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    url: String,
    api_timeout: Duration,
    event_buffer: usize,
}

impl BridgeConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_timeout: DEFAULT_API_TIMEOUT,
            event_buffer: 256,
        }
    }

    /// Sets how long outbound API calls wait for a response.
    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Sets the inbound event channel capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self, request: ConnectRequest) -> TransportResult<Session> {
        info!(url = %self.url, "Connecting to bridge");

        let (ws_stream, _response) =
            connect_async(&self.url)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })?;
        let (ws_tx, ws_rx) = ws_stream.split();

        let (frame_tx, frame_rx) = mpsc::channel::<String>(256);
        let (event_tx, event_rx) = mpsc::channel(self.event_buffer);
        let caller = Arc::new(ApiCaller::new(frame_tx, self.api_timeout));
        let socket = Arc::new(BridgeSocket::new(Arc::clone(&caller)));
        if let Some(creds) = &request.creds {
            socket.update_identity(creds);
        }

        tokio::spawn(run_bridge_loop(
            ws_tx,
            ws_rx,
            frame_rx,
            event_tx,
            Arc::clone(&socket),
            request.messages,
        ));

        let login = caller
            .call("login", json!({ "creds": request.creds }))
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        socket.update_identity(&login);

        info!(url = %self.url, "Bridge session established");
        Ok(Session {
            socket,
            events: event_rx,
        })
    }
}

/// Runs one bridge connection until the stream ends or the session is dropped.
///
/// Events are queued locally and handed to the session as channel capacity
/// frees up, so responses and outbound frames keep flowing while the
/// consumer is busy awaiting an API call.
async fn run_bridge_loop(
    mut ws_tx: WsSink,
    mut ws_rx: WsSource,
    mut frame_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<ProtocolEvent>,
    socket: Arc<BridgeSocket>,
    messages: BoxedMessageStore,
) {
    let caller = Arc::clone(socket.caller());
    let mut pending: VecDeque<ProtocolEvent> = VecDeque::new();
    let mut close_seen = false;

    let lost = loop {
        tokio::select! {
            _ = event_tx.closed() => {
                debug!("Session dropped, closing bridge socket");
                let _ = ws_tx.close().await;
                break None;
            }

            permit = event_tx.reserve(), if !pending.is_empty() => {
                let Ok(permit) = permit else {
                    break None;
                };
                if let Some(event) = pending.pop_front() {
                    permit.send(event);
                }
            }

            Some(frame) = frame_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    warn!(error = %e, "Failed to send frame");
                    break Some(format!("send failed: {e}"));
                }
            }

            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(len = data.len(), "Dropping non UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        trace!("Received ping, sending pong");
                        let _ = ws_tx.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(frame))) => {
                        info!("Bridge closed the connection");
                        break Some(frame.map_or_else(
                            || String::from("bridge closed the connection"),
                            |f| f.reason.as_str().to_owned(),
                        ));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Bridge socket error");
                        break Some(e.to_string());
                    }
                    None => {
                        info!("Bridge stream ended");
                        break Some(String::from("stream ended"));
                    }
                };

                match classify(&text) {
                    Ok(Inbound::Response(response)) => {
                        caller.on_response(response);
                    }
                    Ok(Inbound::Request(request)) => {
                        answer_request(request, Arc::clone(&messages), caller.frame_sender());
                    }
                    Ok(Inbound::Event(event)) => {
                        match &event {
                            ProtocolEvent::CredsUpdate(creds) => socket.update_identity(creds),
                            ProtocolEvent::ConnectionUpdate(update)
                                if update.connection == Some(ConnectionPhase::Close) =>
                            {
                                close_seen = true;
                            }
                            _ => {}
                        }
                        trace!(event = event.name(), queued = pending.len(), "Received event");
                        pending.push_back(event);
                    }
                    Ok(Inbound::Ignored(name)) => trace!(event = %name, "Ignoring frame"),
                    Err(e) => warn!(error = %e, "Malformed bridge frame"),
                }
            }
        }
    };

    caller.on_disconnect();
    let Some(reason) = lost else {
        return;
    };
    if !close_seen {
        pending.push_back(ProtocolEvent::connection_lost(reason));
    }
    for event in pending {
        if event_tx.send(event).await.is_err() {
            break;
        }
    }
}

/// Answers a bridge request from the message store.
fn answer_request(request: BridgeRequest, messages: BoxedMessageStore, frames: mpsc::Sender<String>) {
    tokio::spawn(async move {
        let BridgeRequest::GetMessage { id, echo } = request;
        let response = match messages.load_message(&id).await {
            Ok(stored) => Response::ok(
                echo,
                stored
                    .and_then(|m| m.get("message").cloned())
                    .unwrap_or_else(|| json!({ "conversation": Value::Null })),
            ),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to load message for bridge");
                Response::failed(echo, e.to_string())
            }
        };
        match serde_json::to_string(&response) {
            Ok(frame) => {
                let _ = frames.send(frame).await;
            }
            Err(e) => warn!(error = %e, "Failed to encode bridge reply"),
        }
    });
}
