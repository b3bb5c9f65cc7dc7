use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::LiveStatus,
    dto::battle::{BattleView, LeaderView},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed events when absent.
    pub event: Option<String>,
    /// Serialized payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether the backend now runs without storage.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a battle has been committed.
pub struct BattleCreatedEvent {
    /// The committed battle.
    pub battle: BattleView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast after every accepted vote.
pub struct BattleVotedEvent {
    /// Battle the entry refers to.
    pub battle_id: Uuid,
    /// Votes of side A.
    pub item_a_votes: u64,
    /// Votes of side B.
    pub item_b_votes: u64,
    /// Votes on both sides.
    pub total_votes: u64,
    /// Current leader, if any vote was cast.
    pub leader: Option<LeaderView>,
    /// Closeness classification after the vote.
    pub live_status: LiveStatus,
}
