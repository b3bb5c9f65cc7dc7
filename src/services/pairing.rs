//! Turning two chosen contents into a committed battle.

use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        battle_store::BattleStore,
        models::{BattleDraft, BattleEntity, MatchingMethod},
        storage::TxResult,
    },
    dto::identity::CurrentUser,
    services::sse_events,
    state::SharedState,
};

/// One pair ready to be committed.
#[derive(Debug, Clone)]
pub struct PairRequest {
    /// Content placed on side A.
    pub content_a: Uuid,
    /// Content placed on side B.
    pub content_b: Uuid,
    /// How the pair was formed.
    pub method: MatchingMethod,
    /// Pair score stored on the battle.
    pub score: f64,
}

/// Build the draft for `pair` on behalf of `initiator`.
pub fn draft_for(
    state: &SharedState,
    initiator: &CurrentUser,
    pair: &PairRequest,
    now: SystemTime,
) -> BattleDraft {
    BattleDraft {
        id: Uuid::new_v4(),
        content_a: pair.content_a,
        content_b: pair.content_b,
        initiator_id: initiator.id.clone(),
        initiator_name: initiator.display_name(),
        method: pair.method,
        score: pair.score,
        created_at: now,
        ends_at: now + state.config().battle_duration,
    }
}

/// Commit `pair` atomically and announce the battle on success.
pub async fn commit_pair(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    initiator: &CurrentUser,
    pair: PairRequest,
) -> TxResult<BattleEntity> {
    let draft = draft_for(state, initiator, &pair, SystemTime::now());
    let battle = store.commit_pair(draft).await?;

    info!(
        battle_id = %battle.id,
        content_a = %pair.content_a,
        content_b = %pair.content_b,
        method = ?pair.method,
        score = battle.matching_score,
        "battle created"
    );
    sse_events::broadcast_battle_created(state, &battle);

    Ok(battle)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn draft_ends_after_the_configured_duration() {
        let mut config = AppConfig::default();
        config.battle_duration = Duration::from_secs(3600);
        let state = AppState::new(config);
        let mut initiator = CurrentUser::new("u-1");
        initiator.email = Some("sam@example.com".into());
        let now = SystemTime::now();

        let draft = draft_for(
            &state,
            &initiator,
            &PairRequest {
                content_a: Uuid::new_v4(),
                content_b: Uuid::new_v4(),
                method: MatchingMethod::SmartAlgorithm,
                score: 12.5,
            },
            now,
        );

        assert_eq!(draft.ends_at, now + Duration::from_secs(3600));
        assert_eq!(draft.initiator_id, "u-1");
        assert_eq!(draft.initiator_name, "sam");
        assert_eq!(draft.score, 12.5);
    }
}
