//! End-to-end tests against an in-process bridge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use asena_core::{
    ConnectRequest, ConnectionPhase, Connector, DisconnectReason, Jid, MessageKey, MessageStore,
    OutgoingMessage, ProtocolEvent, StoreResult, WaSocket,
};
use asena_transport::BridgeConnector;

struct OneMessageStore;

#[async_trait]
impl MessageStore for OneMessageStore {
    async fn save_message(&self, _raw: &Value, _sender: &Jid) -> StoreResult<()> {
        Ok(())
    }

    async fn load_message(&self, id: &str) -> StoreResult<Option<Value>> {
        Ok((id == "KNOWN").then(|| json!({ "message": { "conversation": "stored" } })))
    }

    async fn save_chat(&self, _chat: &Value) -> StoreResult<()> {
        Ok(())
    }

    async fn name_of(&self, _jid: &Jid) -> StoreResult<Option<String>> {
        Ok(None)
    }
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

async fn next_json(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(t) => return serde_json::from_str(t.as_str()).unwrap(),
            _ => continue,
        }
    }
}

fn request(creds: Option<Value>) -> ConnectRequest {
    ConnectRequest {
        creds,
        messages: Arc::new(OneMessageStore),
    }
}

#[tokio::test]
async fn test_login_events_calls_and_lost_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let bridge = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let login = next_json(&mut ws).await;
        assert_eq!(login["action"], "login");
        assert_eq!(login["params"]["creds"], Value::Null);
        ws.send(text(json!({
            "echo": login["echo"],
            "status": "ok",
            "data": { "me": { "id": "999:3@s.whatsapp.net" } }
        })))
        .await
        .unwrap();

        ws.send(text(json!({
            "event": "connection.update",
            "data": { "connection": "open" }
        })))
        .await
        .unwrap();

        let send = next_json(&mut ws).await;
        assert_eq!(send["action"], "sendMessage");
        assert_eq!(send["params"]["content"]["text"], "hello");
        ws.send(text(json!({
            "echo": send["echo"],
            "status": "ok",
            "data": { "key": { "remoteJid": "1@s.whatsapp.net", "fromMe": true, "id": "OUT1" } }
        })))
        .await
        .unwrap();

        ws.send(text(json!({ "request": "getMessage", "id": "KNOWN", "echo": 41 })))
            .await
            .unwrap();
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["echo"], 41);
        assert_eq!(reply["data"]["conversation"], "stored");

        ws.send(text(json!({ "request": "getMessage", "id": "MISSING", "echo": 42 })))
            .await
            .unwrap();
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["data"], json!({ "conversation": null }));

        // Drop without a close update.
        drop(ws);
    });

    let connector = BridgeConnector::new(url).with_api_timeout(Duration::from_secs(5));
    let mut session = connector.connect(request(None)).await.unwrap();
    assert_eq!(
        session.socket.self_id().map(|j| j.without_device()),
        Some(Jid::new("999@s.whatsapp.net"))
    );

    match session.events.recv().await.unwrap() {
        ProtocolEvent::ConnectionUpdate(update) => {
            assert_eq!(update.connection, Some(ConnectionPhase::Open))
        }
        other => panic!("unexpected event {other:?}"),
    }

    let key = session
        .socket
        .send_message(&Jid::new("1@s.whatsapp.net"), OutgoingMessage::text("hello"))
        .await
        .unwrap();
    assert_eq!(key.id, "OUT1");

    bridge.await.unwrap();

    match session.events.recv().await.unwrap() {
        ProtocolEvent::ConnectionUpdate(update) => {
            assert_eq!(update.connection, Some(ConnectionPhase::Close));
            assert_eq!(
                update.last_disconnect.unwrap().reason(),
                DisconnectReason::ConnectionLost
            );
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(session.events.recv().await.is_none());
}

#[tokio::test]
async fn test_rejected_login_is_handshake_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let login = next_json(&mut ws).await;
        ws.send(text(json!({
            "echo": login["echo"],
            "status": "failed",
            "error": "bad creds"
        })))
        .await
        .unwrap();
        let _ = ws.next().await;
    });

    let err = BridgeConnector::new(url)
        .connect(request(Some(json!({ "me": { "id": "1@s.whatsapp.net" } }))))
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("bad creds"));
}

#[tokio::test]
async fn test_unreachable_bridge_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    assert!(BridgeConnector::new(url).connect(request(None)).await.is_err());
}

#[tokio::test]
async fn test_api_calls_complete_while_events_are_backlogged() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let bridge = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let login = next_json(&mut ws).await;
        ws.send(text(json!({ "echo": login["echo"], "status": "ok", "data": {} })))
            .await
            .unwrap();

        for n in 0..5 {
            ws.send(text(json!({
                "event": "chats.update",
                "data": [{ "id": format!("{n}@g.us"), "subject": "group" }]
            })))
            .await
            .unwrap();
        }

        // Answer every request until the client goes away.
        while let Some(Ok(Message::Text(frame))) = ws.next().await {
            let req: Value = serde_json::from_str(frame.as_str()).unwrap();
            ws.send(text(json!({ "echo": req["echo"], "status": "ok", "data": null })))
                .await
                .unwrap();
        }
    });

    let connector = BridgeConnector::new(url)
        .with_api_timeout(Duration::from_secs(2))
        .with_event_buffer(2);
    let mut session = connector.connect(request(None)).await.unwrap();

    assert!(matches!(
        session.events.recv().await.unwrap(),
        ProtocolEvent::ChatsUpdate(_)
    ));
    // Let the remaining events pile up behind the full channel.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let key = MessageKey {
        remote_jid: Jid::new("0@g.us"),
        from_me: false,
        id: "ABC".into(),
        participant: None,
    };
    tokio_test::assert_ok!(session.socket.read_messages(&[key]).await);

    for _ in 1..5 {
        assert!(matches!(
            session.events.recv().await.unwrap(),
            ProtocolEvent::ChatsUpdate(_)
        ));
    }

    drop(session);
    bridge.await.unwrap();
}
