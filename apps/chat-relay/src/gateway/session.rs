//! Per-connection gateway session state.

use std::fmt;

use axum::extract::ws::Utf8Bytes;
use relay_common::id::{prefix, PrefixedId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Opaque handle identifying one accepted WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl PrefixedId for ConnectionId {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionId {
    /// Allocate a fresh `conn_` prefixed ULID.
    pub fn new() -> Self {
        Self(Self::generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room is keyed by the stringified conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for RoomId {
    fn from(conversation_id: i64) -> Self {
        Self(conversation_id.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a frame could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's writer has gone away.
    Disconnected,
    /// The connection is not draining its queue fast enough.
    QueueFull,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Disconnected => f.write_str("connection closed"),
            DeliveryError::QueueFull => f.write_str("outbound queue full"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One live connection bound to a verified user and a single room.
///
/// Cloning is cheap and every clone feeds the same outbound queue, which is
/// what lets the registry hand out membership snapshots.
#[derive(Debug, Clone)]
pub struct Session {
    connection_id: ConnectionId,
    user_id: i64,
    room_id: RoomId,
    outbound: mpsc::Sender<Utf8Bytes>,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn open(user_id: i64, room_id: RoomId, capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let session = Self {
            connection_id: ConnectionId::new(),
            user_id,
            room_id,
            outbound,
        };
        (session, rx)
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Queue a text frame without waiting.
    pub fn deliver(&self, frame: Utf8Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }
}
