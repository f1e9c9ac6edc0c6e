//! WebSocket 端到端流程测试。
//!
//! 使用内存仓储在本地随机端口起一个完整的服务，
//! 用真实的 WebSocket 客户端验证握手、投递和错误协定。

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message as TungsteniteMessage},
};

use application::repository::memory::MemoryChatRepository;
use domain::{ChatId, UserId};
use web_api::{AppState, JwtConfig, JwtService};

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const CHAT: ChatId = ChatId(42);

struct TestServer {
    addr: std::net::SocketAddr,
    state: AppState,
    jwt_service: Arc<JwtService>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    fn token_for(&self, user_id: UserId) -> String {
        self.jwt_service.generate_token(user_id).expect("token")
    }
}

async fn start_server() -> TestServer {
    let repository = Arc::new(MemoryChatRepository::new());
    repository.add_user(ALICE, "alice").await;
    repository.add_user(BOB, "bob").await;
    repository.add_participant(CHAT, ALICE).await;
    repository.add_participant(CHAT, BOB).await;

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: "ws-flow-test-secret-key-of-sufficient-length".to_string(),
        expiration_hours: 1,
    }));
    let state = AppState::new(repository, jwt_service.clone());
    let router = web_api::router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        state,
        jwt_service,
        _shutdown: shutdown_tx,
    }
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(server: &TestServer, user_id: UserId) -> WsClient {
    let token = server.token_for(user_id);
    let (stream, _) = connect_async(server.ws_url(&token)).await.expect("connect");
    stream
}

/// 读取下一条文本帧并解析为 JSON。
async fn next_json(client: &mut WsClient) -> Value {
    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("frame within timeout")
        .expect("stream open")
        .expect("frame ok");
    match message {
        TungsteniteMessage::Text(text) => serde_json::from_str(text.as_str()).expect("valid json"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn expect_connected(client: &mut WsClient, user_id: UserId) {
    let frame = next_json(client).await;
    assert_eq!(frame["type"], "connected");
    assert_eq!(frame["userId"], user_id.to_string());
}

#[tokio::test]
async fn handshake_without_token_closes_with_policy_violation() {
    let server = start_server().await;

    let url = format!("ws://{}/ws", server.addr);
    let (mut client, _) = connect_async(url).await.expect("upgrade succeeds");

    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("frame within timeout")
        .expect("stream open")
        .expect("frame ok");
    match message {
        TungsteniteMessage::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert!(frame.reason.contains("token is required"), "{}", frame.reason);
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    // 被拒绝的握手不留下任何注册表条目
    assert_eq!(server.state.registry.connection_count().await, 0);
}

#[tokio::test]
async fn handshake_with_invalid_token_closes_with_policy_violation() {
    let server = start_server().await;

    let (mut client, _) = connect_async(server.ws_url("not-a-jwt"))
        .await
        .expect("upgrade succeeds");

    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("frame within timeout")
        .expect("stream open")
        .expect("frame ok");
    match message {
        TungsteniteMessage::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert!(frame.reason.contains("invalid token"), "{}", frame.reason);
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    // 被拒绝的握手不留下任何注册表条目
    assert_eq!(server.state.registry.connection_count().await, 0);
}

#[tokio::test]
async fn connected_is_first_frame_even_under_concurrent_traffic() {
    let server = start_server().await;

    let mut alice = connect(&server, ALICE).await;
    expect_connected(&mut alice, ALICE).await;

    // alice 持续向聊天里发消息，覆盖 bob 注册完成的整个窗口
    let flood = tokio::spawn(async move {
        for i in 0..50 {
            alice
                .send(TungsteniteMessage::Text(
                    json!({"type": "onetoone", "chatId": CHAT, "message": format!("burst {i}")})
                        .to_string()
                        .into(),
                ))
                .await
                .expect("send");
        }
        alice
    });

    let mut bob = connect(&server, BOB).await;

    // 无论注册瞬间有多少条消息在扇出，第一帧必须是 connected
    let first = next_json(&mut bob).await;
    assert_eq!(first["type"], "connected");
    assert_eq!(first["userId"], BOB.to_string());

    flood.await.expect("flood task");
}

#[tokio::test]
async fn message_is_delivered_to_recipient_and_acked_to_sender() {
    let server = start_server().await;

    let mut alice = connect(&server, ALICE).await;
    expect_connected(&mut alice, ALICE).await;
    let mut bob = connect(&server, BOB).await;
    expect_connected(&mut bob, BOB).await;

    alice
        .send(TungsteniteMessage::Text(
            json!({"type": "onetoone", "chatId": CHAT, "message": "hello bob"})
                .to_string()
                .into(),
        ))
        .await
        .expect("send");

    // 接收方拿到完整的消息视图
    let delivered = next_json(&mut bob).await;
    assert_eq!(delivered["type"], "message");
    let data = &delivered["data"];
    assert_eq!(data["content"], "hello bob");
    assert_eq!(data["senderId"], i64::from(ALICE));
    assert_eq!(data["senderUsername"], "alice");
    assert_eq!(data["chatId"], i64::from(CHAT));
    assert_eq!(data["isRead"], false);
    assert!(data["id"].is_i64());
    assert!(data["createdAt"].is_string());

    // 发送方只收到回执，不回显消息本身
    let ack = next_json(&mut alice).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["messageId"], data["id"]);
    assert_eq!(ack["chatId"], i64::from(CHAT));
}

#[tokio::test]
async fn malformed_payload_gets_error_and_connection_stays_open() {
    let server = start_server().await;

    let mut alice = connect(&server, ALICE).await;
    expect_connected(&mut alice, ALICE).await;
    let mut bob = connect(&server, BOB).await;
    expect_connected(&mut bob, BOB).await;

    alice
        .send(TungsteniteMessage::Text("this is not json".into()))
        .await
        .expect("send");

    let error = next_json(&mut alice).await;
    assert_eq!(error["error"], "Invalid message format");

    // 错误之后连接仍然可用
    alice
        .send(TungsteniteMessage::Text(
            json!({"type": "onetoone", "chatId": CHAT, "message": "still here"})
                .to_string()
                .into(),
        ))
        .await
        .expect("send");

    let delivered = next_json(&mut bob).await;
    assert_eq!(delivered["type"], "message");
    assert_eq!(delivered["data"]["content"], "still here");
}

#[tokio::test]
async fn non_participant_sender_gets_error_without_delivery() {
    let server = start_server().await;

    let outsider = UserId::new(99);
    let mut charlie = connect(&server, outsider).await;
    expect_connected(&mut charlie, outsider).await;
    let mut bob = connect(&server, BOB).await;
    expect_connected(&mut bob, BOB).await;

    charlie
        .send(TungsteniteMessage::Text(
            json!({"type": "onetoone", "chatId": CHAT, "message": "let me in"})
                .to_string()
                .into(),
        ))
        .await
        .expect("send");

    let error = next_json(&mut charlie).await;
    assert_eq!(error["error"], "You are not a participant of this chat");

    // bob 不应收到任何投递
    let nothing = timeout(Duration::from_millis(300), bob.next()).await;
    assert!(nothing.is_err(), "unexpected frame delivered to bob");
}

#[tokio::test]
async fn group_message_reaches_every_other_participant() {
    let server = start_server().await;

    let carol = UserId::new(3);

    let mut alice = connect(&server, ALICE).await;
    expect_connected(&mut alice, ALICE).await;
    let mut bob = connect(&server, BOB).await;
    expect_connected(&mut bob, BOB).await;

    // carol 不在聊天里，不应收到群发
    let mut carol_client = connect(&server, carol).await;
    expect_connected(&mut carol_client, carol).await;

    alice
        .send(TungsteniteMessage::Text(
            json!({"type": "group", "chatId": CHAT, "message": "hello everyone"})
                .to_string()
                .into(),
        ))
        .await
        .expect("send");

    let delivered = next_json(&mut bob).await;
    assert_eq!(delivered["type"], "message");
    assert_eq!(delivered["data"]["content"], "hello everyone");

    let ack = next_json(&mut alice).await;
    assert_eq!(ack["type"], "ack");

    let nothing = timeout(Duration::from_millis(300), carol_client.next()).await;
    assert!(nothing.is_err(), "unexpected frame delivered to carol");
}
