mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use chat_relay::config::Config;
use chat_relay::gateway::session::RoomId;

use common::{CONVERSATION, JOBSEEKER, OTHER_CONVERSATION, OTHER_USER, RECRUITER, STRANGER};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: open a gateway connection with an optional bearer token.
async fn connect(addr: SocketAddr, conversation_id: i64, token: Option<&str>) -> Client {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws/conversations/{conversation_id}?token={token}"),
        None => format!("ws://{addr}/ws/conversations/{conversation_id}"),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Helper: connect as a party of the conversation and wait until joined.
async fn join(
    ctx: &common::TestContext,
    addr: SocketAddr,
    conversation_id: i64,
    user_id: i64,
    expected_members: usize,
) -> Client {
    let token = common::mint_token(user_id);
    let ws = connect(addr, conversation_id, Some(&token)).await;
    common::wait_for_members(&ctx.state, conversation_id, expected_members).await;
    ws
}

/// Helper: read the next text frame as JSON, skipping pings.
async fn next_json(ws: &mut Client) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse message");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Helper: read until a close frame and return its code.
async fn expect_close(ws: &mut Client) -> CloseCode {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Close(Some(frame)) => return frame.code,
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected Close frame, got: {other:?}"),
        }
    }
}

/// Helper: assert nothing but keepalive traffic arrives for a short while.
async fn expect_silence(ws: &mut Client) {
    let deadline = time::Instant::now() + Duration::from_millis(300);
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(tungstenite::Message::Ping(_)))) => continue,
            Ok(other) => panic!("Expected no message, got: {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_reaches_room_members_only() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut sender = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    let mut peer = join(&ctx, addr, CONVERSATION, RECRUITER, 2).await;
    let mut outsider = join(&ctx, addr, OTHER_CONVERSATION, OTHER_USER, 1).await;

    sender
        .send(tungstenite::Message::Text("hello".into()))
        .await
        .expect("send message");

    let expected = serde_json::json!({
        "conversation_id": CONVERSATION,
        "sender_id": JOBSEEKER,
        "content": "hello",
    });
    assert_eq!(next_json(&mut peer).await, expected);
    assert_eq!(next_json(&mut sender).await, expected);
    expect_silence(&mut outsider).await;
}

#[tokio::test]
async fn message_is_persisted_with_verified_sender() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut sender = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    let mut peer = join(&ctx, addr, CONVERSATION, RECRUITER, 2).await;

    // The client claims to be the recruiter; the server must not believe it.
    let spoofed = serde_json::json!({ "content": "spoof?", "sender_id": RECRUITER });
    sender
        .send(tungstenite::Message::Text(spoofed.to_string().into()))
        .await
        .expect("send message");

    let received = next_json(&mut peer).await;
    assert_eq!(received["sender_id"], JOBSEEKER);
    assert_eq!(received["content"], "spoof?");

    let stored = ctx.messages.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].conversation_id, CONVERSATION);
    assert_eq!(stored[0].sender_id, JOBSEEKER);
    assert_eq!(stored[0].content, "spoof?");
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut sender = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    let mut peer = join(&ctx, addr, CONVERSATION, RECRUITER, 2).await;

    for i in 0..10 {
        sender
            .send(tungstenite::Message::Text(format!("m{i}").into()))
            .await
            .expect("send message");
    }

    for i in 0..10 {
        assert_eq!(next_json(&mut peer).await["content"], format!("m{i}"));
    }
}

#[tokio::test]
async fn expired_token_is_closed_with_policy_violation() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let token = common::mint_expired_token(JOBSEEKER);
    let mut ws = connect(addr, CONVERSATION, Some(&token)).await;

    assert_eq!(expect_close(&mut ws).await, CloseCode::Policy);
    assert_eq!(ctx.state.rooms.member_count(&RoomId::from(CONVERSATION)), 0);
    assert_eq!(ctx.state.rooms.room_count(), 0);
}

#[tokio::test]
async fn missing_or_invalid_token_is_closed_with_policy_violation() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut no_token = connect(addr, CONVERSATION, None).await;
    assert_eq!(expect_close(&mut no_token).await, CloseCode::Policy);

    let mut bad_token = connect(addr, CONVERSATION, Some("not-a-jwt")).await;
    assert_eq!(expect_close(&mut bad_token).await, CloseCode::Policy);

    assert_eq!(ctx.state.rooms.room_count(), 0);
}

#[tokio::test]
async fn non_member_is_closed_with_same_code() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let token = common::mint_token(STRANGER);
    let mut ws = connect(addr, CONVERSATION, Some(&token)).await;

    assert_eq!(expect_close(&mut ws).await, CloseCode::Policy);
    assert_eq!(ctx.state.rooms.member_count(&RoomId::from(CONVERSATION)), 0);

    // Unknown conversations look exactly the same.
    let token = common::mint_token(JOBSEEKER);
    let mut ws = connect(addr, 12345, Some(&token)).await;
    assert_eq!(expect_close(&mut ws).await, CloseCode::Policy);
    assert_eq!(ctx.state.rooms.room_count(), 0);
}

#[tokio::test]
async fn disconnect_removes_member_and_broadcast_continues() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut sender = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    let peer = join(&ctx, addr, CONVERSATION, RECRUITER, 2).await;

    // Drop the peer's transport without a close handshake.
    drop(peer);
    common::wait_for_members(&ctx.state, CONVERSATION, 1).await;

    sender
        .send(tungstenite::Message::Text("still here".into()))
        .await
        .expect("send message");

    let echo = next_json(&mut sender).await;
    assert_eq!(echo["content"], "still here");
    assert_eq!(ctx.messages.all().len(), 1);
}

#[tokio::test]
async fn graceful_close_empties_room() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut ws = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    assert_eq!(ctx.state.rooms.room_ids(), vec![RoomId::from(CONVERSATION)]);

    ws.close(None).await.expect("close");
    common::wait_for_members(&ctx.state, CONVERSATION, 0).await;
    assert!(ctx.state.rooms.room_ids().is_empty());
}

#[tokio::test]
async fn same_user_may_hold_several_connections() {
    let ctx = common::test_context();
    let addr = common::start_server(&ctx.state).await;

    let mut phone = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;
    let mut laptop = join(&ctx, addr, CONVERSATION, JOBSEEKER, 2).await;
    let mut peer = join(&ctx, addr, CONVERSATION, RECRUITER, 3).await;

    peer.send(tungstenite::Message::Text("hi both".into()))
        .await
        .expect("send message");

    assert_eq!(next_json(&mut phone).await["content"], "hi both");
    assert_eq!(next_json(&mut laptop).await["content"], "hi both");
}

#[tokio::test]
async fn idle_connection_is_closed_and_deregistered() {
    let mut config = Config::for_secret(common::TEST_SECRET);
    config.ping_interval = Duration::from_millis(200);
    config.idle_timeout = Duration::from_millis(500);
    let ctx = common::test_context_with(config);
    let addr = common::start_server(&ctx.state).await;

    let mut ws = join(&ctx, addr, CONVERSATION, JOBSEEKER, 1).await;

    // Stay silent: no reads means no pongs go back to the server.
    time::sleep(Duration::from_millis(1200)).await;
    common::wait_for_members(&ctx.state, CONVERSATION, 0).await;

    assert_eq!(expect_close(&mut ws).await, CloseCode::Away);
}
