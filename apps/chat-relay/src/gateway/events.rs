//! Wire formats and close codes for the chat gateway.

use axum::extract::ws::close_code;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Close codes
// ---------------------------------------------------------------------------

/// Sent for both authentication and authorization failures, so a client
/// cannot tell a bad token from a conversation it may not see.
pub const CLOSE_POLICY_VIOLATION: u16 = close_code::POLICY;
/// Sent when an idle client is disconnected.
pub const CLOSE_GOING_AWAY: u16 = close_code::AWAY;

/// Close reason paired with `CLOSE_POLICY_VIOLATION`.
pub const POLICY_VIOLATION_REASON: &str = "Policy violation";

/// Longest accepted message body, in characters.
pub const MAX_CONTENT_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A chat message fanned out to every member of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// JSON form of an inbound frame. Any other fields, `sender_id` included,
/// are ignored.
#[derive(Debug, Deserialize)]
struct InboundPayload {
    content: String,
}

/// Why an inbound frame was not relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    Empty,
    TooLong(usize),
}

impl std::fmt::Display for InboundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InboundError::Empty => f.write_str("message is empty"),
            InboundError::TooLong(n) => {
                write!(f, "message is {n} characters, limit is {MAX_CONTENT_LEN}")
            }
        }
    }
}

impl std::error::Error for InboundError {}

/// Extract the message body from an inbound text frame.
///
/// A JSON object with a string `content` field is unwrapped; anything else is
/// taken literally as the message body. Surrounding whitespace is trimmed.
pub fn parse_inbound(text: &str) -> Result<String, InboundError> {
    let trimmed = text.trim();
    let content = if trimmed.starts_with('{') {
        match serde_json::from_str::<InboundPayload>(trimmed) {
            Ok(payload) => payload.content,
            Err(_) => trimmed.to_string(),
        }
    } else {
        trimmed.to_string()
    };

    let content = content.trim();
    if content.is_empty() {
        return Err(InboundError::Empty);
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_LEN {
        return Err(InboundError::TooLong(len));
    }
    Ok(content.to_string())
}
