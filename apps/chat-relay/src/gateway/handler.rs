//! Connection admission and inbound message relay.

use crate::AppState;

use super::events::{parse_inbound, InboundError, OutboundMessage};
use super::fanout::DeliveryReport;
use super::session::Session;

/// Why a connection was refused before joining its room.
///
/// All variants are reported to the client with the same close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Token missing, invalid, expired, or without a user id.
    Unauthenticated,
    /// The user is not a party to the conversation.
    NotMember,
    /// The access check itself failed; treated as a denial.
    AccessLookupFailed,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Unauthenticated => "unauthenticated",
            Rejection::NotMember => "not a member",
            Rejection::AccessLookupFailed => "access lookup failed",
        }
    }
}

/// Authenticate the bearer token and authorize the user for the conversation.
///
/// Returns the verified user id. Fails closed: an access lookup error is a
/// rejection, never a pass.
pub async fn admit(
    state: &AppState,
    conversation_id: i64,
    token: Option<&str>,
) -> Result<i64, Rejection> {
    let user_id = token
        .filter(|t| !t.is_empty())
        .and_then(|t| state.tokens.authenticate(t))
        .ok_or(Rejection::Unauthenticated)?;

    match state.access.is_member(conversation_id, user_id).await {
        Ok(true) => Ok(user_id),
        Ok(false) => Err(Rejection::NotMember),
        Err(err) => {
            tracing::warn!(conversation_id, user_id, error = %err, "conversation access lookup failed");
            Err(Rejection::AccessLookupFailed)
        }
    }
}

/// Persist one inbound frame and broadcast it to the session's room.
///
/// The sender is always the session's verified user, whatever the frame
/// claims. Returns `None` when nothing was broadcast.
pub async fn relay_message(
    state: &AppState,
    session: &Session,
    conversation_id: i64,
    text: &str,
) -> Option<DeliveryReport> {
    let content = match parse_inbound(text) {
        Ok(content) => content,
        Err(InboundError::Empty) => return None,
        Err(err) => {
            tracing::info!(
                connection_id = %session.connection_id(),
                user_id = session.user_id(),
                error = %err,
                "inbound message rejected"
            );
            return None;
        }
    };

    match state
        .messages
        .persist(conversation_id, session.user_id(), &content)
        .await
    {
        Ok(stored) => {
            tracing::debug!(conversation_id, message_id = stored.id, "message persisted");
        }
        Err(err) if state.config.strict_persistence => {
            tracing::error!(
                conversation_id,
                user_id = session.user_id(),
                error = %err,
                "message persistence failed; dropping message"
            );
            return None;
        }
        Err(err) => {
            tracing::warn!(
                conversation_id,
                user_id = session.user_id(),
                error = %err,
                "message persistence failed; broadcasting anyway"
            );
        }
    }

    let message = OutboundMessage {
        conversation_id,
        sender_id: session.user_id(),
        content,
    };
    let report = state.broadcaster.broadcast(session.room_id(), &message);

    tracing::debug!(
        conversation_id,
        attempted = report.attempted,
        delivered = report.delivered,
        "message broadcast"
    );

    Some(report)
}
