//! Echo-matched request/response over the bridge socket.
//!
//! Each [`ApiCaller::call`]:
//! 1. takes the next echo id;
//! 2. registers a one-shot channel for it in the pending map;
//! 3. queues the request frame on the write channel;
//! 4. awaits the one-shot, resolved by [`ApiCaller::on_response`] when the
//!    bridge answers, or fails on timeout or disconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use asena_core::{ApiError, ApiResult, TransportError};

use crate::frame::{Request, Response, Status};

/// Default time to wait for a response.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiCaller {
    /// Serialized frames for the socket loop.
    frame_tx: mpsc::Sender<String>,
    /// echo -> waiting call.
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    echo_counter: AtomicU64,
    api_timeout: Duration,
}

impl ApiCaller {
    pub fn new(frame_tx: mpsc::Sender<String>, api_timeout: Duration) -> Self {
        Self {
            frame_tx,
            pending: Mutex::new(HashMap::new()),
            echo_counter: AtomicU64::new(1),
            api_timeout,
        }
    }

    /// Calls `action` and returns the response data.
    pub async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
        let echo = self.echo_counter.fetch_add(1, Ordering::Relaxed);

        // Register before sending so an early response is never missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(echo, tx);

        let frame = serde_json::to_string(&Request {
            action,
            params,
            echo,
        })?;
        debug!(action = %action, echo, "Calling bridge API");

        if let Err(e) = self.frame_tx.send(frame).await {
            self.pending.lock().remove(&echo);
            return Err(TransportError::SendFailed(e.to_string()).into());
        }

        match timeout(self.api_timeout, rx).await {
            Ok(Ok(response)) => match response.status {
                Status::Ok => Ok(response.data),
                Status::Failed => Err(ApiError::Remote {
                    action: action.to_string(),
                    message: response
                        .error
                        .unwrap_or_else(|| String::from("unknown error")),
                }),
            },
            Ok(Err(_)) => Err(ApiError::NotConnected),
            Err(_) => {
                self.pending.lock().remove(&echo);
                Err(ApiError::Timeout)
            }
        }
    }

    /// Routes a response to its waiting call. Returns `false` for unknown echoes.
    pub fn on_response(&self, response: Response) -> bool {
        let echo = response.echo;
        match self.pending.lock().remove(&echo) {
            Some(tx) => {
                let _ = tx.send(response);
                true
            }
            None => {
                warn!(echo, "Response for unknown echo (timed out?)");
                false
            }
        }
    }

    /// Fails every pending call with [`ApiError::NotConnected`].
    pub fn on_disconnect(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Dropping pending API calls on disconnect");
            pending.clear();
        }
    }

    /// Whether the socket loop is still accepting frames.
    pub fn is_connected(&self) -> bool {
        !self.frame_tx.is_closed()
    }

    pub(crate) fn frame_sender(&self) -> mpsc::Sender<String> {
        self.frame_tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn caller(timeout: Duration) -> (Arc<ApiCaller>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(ApiCaller::new(tx, timeout)), rx)
    }

    async fn next_echo(rx: &mut mpsc::Receiver<String>) -> u64 {
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        frame["echo"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_response_routed_by_echo() {
        let (caller, mut rx) = caller(DEFAULT_API_TIMEOUT);

        let a = tokio::spawn({
            let caller = caller.clone();
            async move { caller.call("groupMetadata", json!({"jid": "1@g.us"})).await }
        });
        let echo_a = next_echo(&mut rx).await;
        let b = tokio::spawn({
            let caller = caller.clone();
            async move { caller.call("sendMessage", json!({})).await }
        });
        let echo_b = next_echo(&mut rx).await;
        assert_ne!(echo_a, echo_b);

        assert!(caller.on_response(Response::ok(echo_b, json!("b"))));
        assert!(caller.on_response(Response::ok(echo_a, json!("a"))));

        assert_eq!(a.await.unwrap().unwrap(), json!("a"));
        assert_eq!(b.await.unwrap().unwrap(), json!("b"));
    }

    #[tokio::test]
    async fn test_failed_status_is_remote_error() {
        let (caller, mut rx) = caller(DEFAULT_API_TIMEOUT);
        let call = tokio::spawn({
            let caller = caller.clone();
            async move { caller.call("rejectCall", json!({})).await }
        });
        let echo = next_echo(&mut rx).await;
        caller.on_response(Response::failed(echo, "no such call"));

        match call.await.unwrap() {
            Err(ApiError::Remote { action, message }) => {
                assert_eq!(action, "rejectCall");
                assert_eq!(message, "no such call");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_and_unknown_echo() {
        let (caller, mut rx) = caller(Duration::from_millis(20));
        let result = caller.call("readMessages", json!({})).await;
        assert!(matches!(result, Err(ApiError::Timeout)));

        let echo = next_echo(&mut rx).await;
        assert!(!caller.on_response(Response::ok(echo, Value::Null)));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_calls() {
        let (caller, mut rx) = caller(DEFAULT_API_TIMEOUT);
        let call = tokio::spawn({
            let caller = caller.clone();
            async move { caller.call("sendPresenceUpdate", json!({})).await }
        });
        next_echo(&mut rx).await;
        caller.on_disconnect();
        assert!(matches!(call.await.unwrap(), Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_closed_channel_is_send_failure() {
        let (caller, rx) = caller(DEFAULT_API_TIMEOUT);
        drop(rx);
        assert!(!caller.is_connected());
        assert!(matches!(
            caller.call("sendMessage", json!({})).await,
            Err(ApiError::Transport(TransportError::SendFailed(_)))
        ));
    }
}
