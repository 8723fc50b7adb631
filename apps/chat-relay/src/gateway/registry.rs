//! Room registry: which live sessions belong to which conversation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::session::{ConnectionId, RoomId, Session};

type Members = HashMap<ConnectionId, Session>;

/// Shared registry of rooms and their live sessions.
///
/// One `parking_lot::RwLock` guards the whole map, so a join or leave is
/// atomic with respect to every other join, leave and snapshot. The lock is
/// eventually fair and is never held across an `.await`.
///
/// Invariant: no room with zero members is ever left in the map.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Members>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add `session` to its own room, creating the room if needed.
    ///
    /// A session is bound to one room when it is opened, so it can never be
    /// listed under any other. Members are keyed by connection id, so joining
    /// again with the same connection replaces the previous entry instead of
    /// duplicating it.
    pub fn join(&self, session: Session) {
        let room_id = session.room_id().clone();
        let connection_id = session.connection_id().clone();
        let mut rooms = self.rooms.write();
        let members = rooms.entry(room_id.clone()).or_default();
        if members.insert(connection_id.clone(), session).is_some() {
            tracing::debug!(room_id = %room_id, connection_id = %connection_id, "connection re-joined room");
        }
    }

    /// Remove a connection from a room, dropping the room once it is empty.
    ///
    /// Returns `true` if the connection was a member. Leaving a room that does
    /// not exist, or that the connection already left, is a no-op.
    pub fn leave(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let mut rooms = self.rooms.write();
        let Some(members) = rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(connection_id).is_some();
        if members.is_empty() {
            rooms.remove(room_id);
        }
        removed
    }

    /// Point-in-time copy of a room's members. Empty if the room is absent.
    pub fn members_of(&self, room_id: &RoomId) -> Vec<Session> {
        self.rooms
            .read()
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of every room with at least one member.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().keys().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.read().get(room_id).map_or(0, |m| m.len())
    }

    pub fn contains(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .read()
            .get(room_id)
            .is_some_and(|m| m.contains_key(connection_id))
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry membership held for the lifetime of a connection.
///
/// Dropping the guard leaves the room. Because it runs in `Drop`, the leave
/// happens exactly once on every exit path, including when the connection
/// task is cancelled.
pub struct RoomMembership {
    registry: Arc<RoomRegistry>,
    room_id: RoomId,
    connection_id: ConnectionId,
}

impl RoomMembership {
    /// Join the session's own room and return the guard.
    pub fn join(registry: Arc<RoomRegistry>, session: Session) -> Self {
        let room_id = session.room_id().clone();
        let connection_id = session.connection_id().clone();
        registry.join(session);
        Self {
            registry,
            room_id,
            connection_id,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }
}

impl Drop for RoomMembership {
    fn drop(&mut self) {
        if !self.registry.leave(&self.room_id, &self.connection_id) {
            tracing::debug!(
                room_id = %self.room_id,
                connection_id = %self.connection_id,
                "connection was already gone from room"
            );
        }
    }
}
