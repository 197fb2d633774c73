//! `graphql-ws` over a real socket against the demo schema.

mod common;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use graphql_ws_gateway::config::ConnectionConfig;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

async fn connect(addr: SocketAddr) -> Socket {
    let mut request = assert_ok!(format!("ws://{addr}{}", common::WS_PATH).into_client_request());
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static("graphql-ws"),
    );
    let (socket, response) = assert_ok!(tokio_tungstenite::connect_async(request).await);
    assert_eq!(
        response
            .headers()
            .get("sec-websocket-protocol")
            .and_then(|v| v.to_str().ok()),
        Some("graphql-ws")
    );
    socket
}

async fn send(socket: &mut Socket, frame: Value) {
    assert_ok!(socket.send(Message::Text(frame.to_string().into())).await);
}

async fn start(socket: &mut Socket, id: &str, payload: Value) {
    send(socket, json!({"type": "start", "id": id, "payload": payload})).await;
}

#[allow(clippy::panic)]
async fn next(socket: &mut Socket) -> Value {
    loop {
        match timeout(FRAME_TIMEOUT, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return assert_ok!(serde_json::from_str(&text)),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    let next = timeout(Duration::from_millis(150), socket.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}

async fn acknowledged(addr: SocketAddr) -> Socket {
    let mut socket = connect(addr).await;
    send(&mut socket, json!({"type": "connection_init"})).await;
    assert_eq!(next(&mut socket).await, json!({"type": "connection_ack"}));
    socket
}

#[tokio::test]
async fn demo_example_then_stop() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    start(&mut socket, "demo", json!({"query": "subscription { example }"})).await;
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "data", "id": "demo", "payload": {"data": {"example": "Hi"}}})
    );

    send(&mut socket, json!({"type": "stop", "id": "demo"})).await;
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "complete", "id": "demo"})
    );
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn undefined_field_gets_one_error() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    start(&mut socket, "1", json!({"query": "subscription { notAField }"})).await;
    let reply = next(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "1");
    assert!(
        reply["payload"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("notAField")),
        "message should name the field: {reply}"
    );
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn unterminated_query_gets_syntax_error_at_eof() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    start(&mut socket, "1", json!({"query": "subscription { example "})).await;
    let reply = next(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "1");
    assert_eq!(reply["payload"]["message"], "Syntax Error: Unexpected <EOF>.");
    assert_eq!(reply["payload"]["locations"][0]["line"], 1);
    assert_eq!(reply["payload"]["path"], Value::Null);
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn deeply_nested_query_gets_one_error_and_the_server_survives() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    let query = format!("query {{ hello(name: {}) }}", "[".repeat(200_000));
    start(&mut socket, "deep", json!({ "query": query })).await;
    let reply = next(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "deep");
    assert!(
        reply["payload"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("maximum depth")),
        "unexpected reply {reply}"
    );
    assert_silent(&mut socket).await;

    let mut other = acknowledged(addr).await;
    start(&mut other, "ok", json!({"query": "{ hello }"})).await;
    assert_eq!(
        next(&mut other).await["payload"]["data"]["hello"],
        "Hello world!"
    );
}

#[tokio::test]
async fn operation_name_selects_the_operation() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    start(
        &mut socket,
        "named",
        json!({
            "query": "query A { hello(name: \"a\") } query B($who: String) { hello(name: $who) }",
            "variables": {"who": "b"},
            "operationName": "B"
        }),
    )
    .await;
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "data", "id": "named", "payload": {"data": {"hello": "Hello b!"}}})
    );
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "complete", "id": "named"})
    );
}

#[tokio::test]
async fn concurrent_operations_keep_per_id_order() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;

    start(
        &mut socket,
        "count",
        json!({"query": "subscription { counter(upTo: 3, intervalMs: 5) }"}),
    )
    .await;
    start(
        &mut socket,
        "echo",
        json!({"query": "subscription { echo(message: \"hey\", delayMs: 5) }"}),
    )
    .await;

    let mut frames: HashMap<String, Vec<Value>> = HashMap::new();
    let mut completed = 0;
    while completed < 2 {
        let frame = next(&mut socket).await;
        let id = frame["id"].as_str().unwrap_or_default().to_string();
        if frame["type"] == "complete" {
            completed += 1;
        }
        frames.entry(id).or_default().push(frame);
    }

    let counts: Vec<Value> = frames
        .get("count")
        .map(|f| f.iter().map(|x| x["payload"]["data"]["counter"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(counts, vec![json!(0), json!(1), json!(2), Value::Null]);
    assert_eq!(
        frames.get("echo").map(Vec::len),
        Some(2),
        "one data and one complete for echo"
    );
}

#[tokio::test]
async fn keep_alive_frames_when_configured() {
    let config = ConnectionConfig::default().with_keep_alive(Duration::from_millis(100));
    let addr = common::spawn_server(config).await;
    let mut socket = acknowledged(addr).await;

    assert_eq!(next(&mut socket).await, json!({"type": "ka"}));
    assert_eq!(next(&mut socket).await, json!({"type": "ka"}));
}

#[tokio::test]
async fn keep_alive_brackets_a_running_subscription() {
    let config = ConnectionConfig::default().with_keep_alive(Duration::from_millis(300));
    let addr = common::spawn_server(config).await;
    let mut socket = acknowledged(addr).await;
    assert_eq!(next(&mut socket).await, json!({"type": "ka"}));

    start(&mut socket, "demo", json!({"query": "subscription { example }"})).await;
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "data", "id": "demo", "payload": {"data": {"example": "Hi"}}})
    );
    assert_eq!(
        next(&mut socket).await,
        json!({"type": "complete", "id": "demo"})
    );
    assert_eq!(next(&mut socket).await, json!({"type": "ka"}));
}

#[tokio::test]
async fn connection_params_are_passed_through() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = connect(addr).await;
    send(
        &mut socket,
        json!({"type": "connection_init", "payload": {"authToken": "abc"}}),
    )
    .await;
    assert_eq!(next(&mut socket).await, json!({"type": "connection_ack"}));

    start(&mut socket, "p", json!({"query": "{ connectionParams }"})).await;
    assert_eq!(
        next(&mut socket).await["payload"]["data"]["connectionParams"],
        json!({"authToken": "abc"})
    );
}

#[tokio::test]
#[allow(clippy::panic)]
async fn terminate_closes_the_socket() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let mut socket = acknowledged(addr).await;
    start(
        &mut socket,
        "c",
        json!({"query": "subscription { counter(intervalMs: 10000) }"}),
    )
    .await;
    assert_eq!(next(&mut socket).await["type"], "data");

    send(&mut socket, json!({"type": "connection_terminate"})).await;
    loop {
        match timeout(FRAME_TIMEOUT, socket.next()).await {
            Ok(Some(Ok(Message::Close(_))) | None | Some(Err(_))) => break,
            Ok(Some(Ok(Message::Text(text)))) => {
                panic!("no frame may follow terminate, got {text}");
            }
            Ok(Some(Ok(_))) => {}
            Err(_) => panic!("socket was not closed"),
        }
    }
}

#[tokio::test]
#[allow(clippy::panic)]
async fn upgrade_without_subprotocol_is_rejected() {
    let addr = common::spawn_server(ConnectionConfig::default()).await;
    let result = tokio_tungstenite::connect_async(format!("ws://{addr}{}", common::WS_PATH)).await;

    let Err(Error::Http(response)) = result else {
        panic!("upgrade should fail with an HTTP error");
    };
    assert_eq!(response.status(), 400);
    if let Some(body) = response.body() {
        let body: Value = assert_ok!(serde_json::from_slice(body));
        assert_eq!(body["error"]["code"], 1002);
    }
}
