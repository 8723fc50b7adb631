//! Message persistence and history queries.

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use parking_lot::Mutex;

use crate::db::pool::DbPool;
use crate::db::schema::messages;
use crate::error::ApiError;
use crate::models::message::{NewMessage, StoredMessage};

/// Durable record of chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store one message; the store assigns `id` and `created_at`.
    async fn persist(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, ApiError>;

    /// Up to `limit` messages older than `before` (or the newest ones),
    /// returned oldest first.
    async fn history(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgMessageStore {
    db: DbPool,
}

impl PgMessageStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn persist(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, ApiError> {
        let mut conn = self.db.get().await?;

        let message: StoredMessage = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    conversation_id,
                    sender_id,
                    content,
                })
                .returning(StoredMessage::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(message)
    }

    async fn history(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let mut conn = self.db.get().await?;

        let query =
            history_query(conversation_id, before, limit).select(StoredMessage::as_select());

        let mut rows: Vec<StoredMessage> = diesel_async::RunQueryDsl::load(query, &mut conn).await?;
        rows.reverse(); // Oldest first.

        Ok(rows)
    }
}

/// Newest-first page of a conversation, keyed on the message id.
///
/// `id` is the cursor and the sort key. `created_at` is the inserting
/// transaction's start time, so it can disagree with id order under
/// concurrent writers.
fn history_query(
    conversation_id: i64,
    before: Option<i64>,
    limit: i64,
) -> messages::BoxedQuery<'static, Pg> {
    let mut query = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .order(messages::id.desc())
        .limit(limit)
        .into_boxed();

    if let Some(before) = before {
        query = query.filter(messages::id.lt(before));
    }

    query
}

// ---------------------------------------------------------------------------
// In-memory implementation (local runs / tests)
// ---------------------------------------------------------------------------

pub struct MemoryMessageStore {
    rows: Mutex<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Every stored message, in insertion order.
    pub fn all(&self) -> Vec<StoredMessage> {
        self.rows.lock().clone()
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn persist(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, ApiError> {
        let mut rows = self.rows.lock();
        let message = StoredMessage {
            id: rows.len() as i64 + 1,
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        rows.push(message.clone());
        Ok(message)
    }

    async fn history(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let rows = self.rows.lock();
        let matching: Vec<&StoredMessage> = rows
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map_or(true, |b| m.id < b))
            .collect();

        let skip = matching.len().saturating_sub(limit.max(0) as usize);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}
