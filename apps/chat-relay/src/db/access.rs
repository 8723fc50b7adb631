//! Conversation membership checks.

use async_trait::async_trait;
use dashmap::DashMap;
use diesel::prelude::*;
use diesel::result::OptionalExtension;

use crate::db::pool::DbPool;
use crate::db::schema::conversations;
use crate::error::ApiError;
use crate::models::conversation::Conversation;

/// Answers whether a user is a party to a conversation.
///
/// Callers must treat `Err` exactly like `Ok(false)`.
#[async_trait]
pub trait ConversationAccess: Send + Sync {
    async fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool, ApiError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgConversationAccess {
    db: DbPool,
}

impl PgConversationAccess {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationAccess for PgConversationAccess {
    async fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool, ApiError> {
        let mut conn = self.db.get().await?;

        let conversation: Option<Conversation> = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .find(conversation_id)
                .select(Conversation::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(conversation.is_some_and(|c| c.has_party(user_id)))
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (local runs / tests)
// ---------------------------------------------------------------------------

/// Conversation id → (jobseeker_id, recruiter_id).
pub struct MemoryConversationAccess {
    parties: DashMap<i64, (i64, i64)>,
}

impl MemoryConversationAccess {
    pub fn new() -> Self {
        Self {
            parties: DashMap::new(),
        }
    }

    /// Register a conversation between two users.
    pub fn add_conversation(&self, conversation_id: i64, jobseeker_id: i64, recruiter_id: i64) {
        self.parties
            .insert(conversation_id, (jobseeker_id, recruiter_id));
    }
}

impl Default for MemoryConversationAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationAccess for MemoryConversationAccess {
    async fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool, ApiError> {
        Ok(self
            .parties
            .get(&conversation_id)
            .is_some_and(|p| p.0 == user_id || p.1 == user_id))
    }
}
