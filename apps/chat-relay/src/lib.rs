pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use auth::tokens::{JwtVerifier, TokenVerifier};
use config::Config;
use db::access::ConversationAccess;
use db::messages::MessageStore;
use gateway::fanout::Broadcaster;
use gateway::registry::RoomRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenVerifier>,
    pub access: Arc<dyn ConversationAccess>,
    pub messages: Arc<dyn MessageStore>,
    pub rooms: Arc<RoomRegistry>,
    pub broadcaster: Broadcaster,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the collaborators around a fresh room registry.
    pub fn new(
        config: Config,
        access: Arc<dyn ConversationAccess>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let tokens: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(&config.jwt_secret));
        let rooms = Arc::new(RoomRegistry::new());
        Self {
            tokens,
            access,
            messages,
            broadcaster: Broadcaster::new(rooms.clone()),
            rooms,
            config: Arc::new(config),
        }
    }
}
