use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::BattleEntity,
    dto::{
        battle::{BattleView, LeaderView},
        sse::{BattleCreatedEvent, BattleVotedEvent, ServerEvent, SystemStatus},
    },
    services::scoring,
    state::SharedState,
};

/// Event name of battle creations.
pub const EVENT_BATTLE_CREATED: &str = "battle.created";
/// Event name of accepted votes.
pub const EVENT_BATTLE_VOTED: &str = "battle.voted";
/// Event name of degraded-mode changes.
pub const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Announce a freshly committed battle.
pub fn broadcast_battle_created(state: &SharedState, battle: &BattleEntity) {
    let payload = BattleCreatedEvent {
        battle: BattleView::from(battle),
    };
    send_public_event(state, EVENT_BATTLE_CREATED, &payload);
}

/// Push the standings of a battle after an accepted vote.
pub fn broadcast_battle_voted(state: &SharedState, battle: &BattleEntity) {
    let payload = BattleVotedEvent {
        battle_id: battle.id,
        item_a_votes: battle.item_a.votes,
        item_b_votes: battle.item_b.votes,
        total_votes: battle.total_votes,
        leader: battle.current_leader.as_ref().map(LeaderView::from),
        live_status: scoring::battle_live_status(battle),
    };
    send_public_event(state, EVENT_BATTLE_VOTED, &payload);
}

/// Tell clients whether the backend is running without storage.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
