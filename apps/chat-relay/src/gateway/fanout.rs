//! Broadcast engine: delivers one message to every member of a room.
//!
//! Membership is snapshotted from the registry, the message is serialized
//! once, and each member gets a non-blocking `try_send` into its outbound
//! queue. A failure for one member never stops delivery to the rest.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;

use super::events::OutboundMessage;
use super::registry::RoomRegistry;
use super::session::{ConnectionId, DeliveryError, RoomId};

/// A member that could not be reached during a broadcast.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub connection_id: ConnectionId,
    pub user_id: i64,
    pub error: DeliveryError,
}

/// Outcome of one broadcast.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Members in the snapshot.
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The broadcast engine. Cheap to clone; one lives in `AppState`.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<RoomRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `message` to every session in `room_id` at the moment of the call.
    pub fn broadcast(&self, room_id: &RoomId, message: &OutboundMessage) -> DeliveryReport {
        let frame = match serde_json::to_string(message) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                tracing::error!(error = %e, room_id = %room_id, "failed to serialize outbound message");
                return DeliveryReport::default();
            }
        };
        self.broadcast_frame(room_id, frame)
    }

    /// Deliver a pre-serialized text frame to every session in `room_id`.
    pub fn broadcast_frame(&self, room_id: &RoomId, frame: Utf8Bytes) -> DeliveryReport {
        let members = self.registry.members_of(room_id);
        let mut report = DeliveryReport {
            attempted: members.len(),
            ..DeliveryReport::default()
        };

        for member in members {
            match member.deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        room_id = %room_id,
                        connection_id = %member.connection_id(),
                        user_id = member.user_id(),
                        %error,
                        "broadcast delivery failed"
                    );
                    report.failures.push(DeliveryFailure {
                        connection_id: member.connection_id().clone(),
                        user_id: member.user_id(),
                        error,
                    });
                }
            }
        }

        report
    }
}
