#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use jsonwebtoken::{EncodingKey, Header};
use tokio::time;

use chat_relay::auth::tokens::Claims;
use chat_relay::config::Config;
use chat_relay::db::access::MemoryConversationAccess;
use chat_relay::db::messages::MemoryMessageStore;
use chat_relay::gateway::session::RoomId;
use chat_relay::AppState;

pub const TEST_SECRET: &str = "relay-test-secret-do-not-use";

/// Conversation 42 is between users 1 and 2.
pub const CONVERSATION: i64 = 42;
pub const JOBSEEKER: i64 = 1;
pub const RECRUITER: i64 = 2;

/// Conversation 7 is between users 3 and 4.
pub const OTHER_CONVERSATION: i64 = 7;
pub const OTHER_USER: i64 = 3;

/// A user who is party to no conversation.
pub const STRANGER: i64 = 99;

/// Test state plus handles on its in-memory collaborators.
pub struct TestContext {
    pub state: AppState,
    pub access: Arc<MemoryConversationAccess>,
    pub messages: Arc<MemoryMessageStore>,
}

pub fn test_context() -> TestContext {
    test_context_with(Config::for_secret(TEST_SECRET))
}

pub fn test_context_with(config: Config) -> TestContext {
    let access = Arc::new(MemoryConversationAccess::new());
    access.add_conversation(CONVERSATION, JOBSEEKER, RECRUITER);
    access.add_conversation(OTHER_CONVERSATION, OTHER_USER, 4);

    let messages = Arc::new(MemoryMessageStore::new());
    let state = AppState::new(config, access.clone(), messages.clone());

    TestContext {
        state,
        access,
        messages,
    }
}

/// Build the full application router wired to the given state.
pub fn test_app(state: &AppState) -> Router {
    chat_relay::routes::router().with_state(state.clone())
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_server(state: &AppState) -> SocketAddr {
    let app = test_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn mint(claims: &Claims) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

/// Mint a bearer token valid for five minutes.
pub fn mint_token(user_id: i64) -> String {
    mint(&Claims {
        user_id: Some(user_id),
        sub: None,
        exp: chrono::Utc::now().timestamp() + 300,
    })
}

/// Mint a bearer token that expired five minutes ago.
pub fn mint_expired_token(user_id: i64) -> String {
    mint(&Claims {
        user_id: Some(user_id),
        sub: None,
        exp: chrono::Utc::now().timestamp() - 300,
    })
}

/// Wait until the registry shows exactly `count` members in a conversation.
pub async fn wait_for_members(state: &AppState, conversation_id: i64, count: usize) {
    let room = RoomId::from(conversation_id);
    time::timeout(Duration::from_secs(5), async {
        while state.rooms.member_count(&room) != count {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "conversation {conversation_id} has {} members, expected {count}",
            state.rooms.member_count(&room)
        )
    });
}
