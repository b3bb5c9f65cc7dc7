//! Vote processing: one vote per user, applied atomically to the stored battle.

use std::{sync::Arc, time::SystemTime};

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        battle_store::BattleMutation,
        models::{BattleEntity, BattleStatus, Side},
        storage::Abort,
    },
    dto::{
        battle::{HasVotedResponse, LeaderView, VoteResponse},
        identity::CurrentUser,
    },
    error::ServiceError,
    services::{scoring, sse_events},
    state::SharedState,
};

/// Calendar-day key (`YYYY-MM-DD`, UTC) of the daily vote buckets.
pub fn day_key(at: SystemTime) -> String {
    let date = OffsetDateTime::from(at).date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Apply one vote by `user_id` for `side` to `battle`.
///
/// Nothing is changed when the battle has ended or the user already voted.
pub fn apply_vote(
    battle: &mut BattleEntity,
    user_id: &str,
    side: Side,
    now: SystemTime,
) -> Result<(), Abort> {
    if battle.status != BattleStatus::Ongoing {
        return Err(Abort::BattleEnded(battle.id));
    }
    if battle.has_participant(user_id) {
        return Err(Abort::AlreadyVoted {
            battle_id: battle.id,
            user_id: user_id.to_owned(),
        });
    }

    battle.side_mut(side).votes += 1;
    battle.total_votes += 1;
    battle.participants.push(user_id.to_owned());
    battle
        .daily_votes
        .entry(day_key(now))
        .or_default()
        .record(side);

    battle.current_leader = Some(scoring::leader(
        battle.item_a.votes,
        battle.item_b.votes,
        now,
    ));
    battle.metrics.engagement_rate = scoring::round_to(
        battle.total_votes as f64 / battle.view_count.max(1) as f64,
        3,
    );
    battle.live_status = Some(scoring::battle_live_status(battle));
    battle.last_vote_at = Some(now);
    battle.updated_at = now;

    Ok(())
}

/// Cast a vote for `side` on `battle_id` as `user`.
pub async fn cast_vote(
    state: &SharedState,
    user: &CurrentUser,
    battle_id: Uuid,
    side: Side,
) -> Result<VoteResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let user_id = user.id.clone();
    let reader = store.clone();
    let voter = user.id.clone();

    let (battle, snapshot) = state
        .run_tentative_vote(
            battle_id,
            side,
            || async move {
                let mutation: BattleMutation = Arc::new(move |battle: &mut BattleEntity| {
                    apply_vote(battle, &user_id, side, SystemTime::now())
                });
                Ok(store.modify_battle(battle_id, mutation).await?)
            },
            || async move {
                let current = reader.find_battle(battle_id).await?;
                Ok(current.filter(|battle| battle.has_participant(&voter)))
            },
        )
        .await
        .inspect_err(|err| debug!(battle_id = %battle_id, error = %err, "vote rejected"))?;

    info!(
        battle_id = %battle_id,
        side = side.field(),
        total_votes = battle.total_votes,
        pending = snapshot.pending,
        "vote recorded"
    );
    sse_events::broadcast_battle_voted(state, &battle);

    Ok(VoteResponse {
        success: true,
        choice: side,
        new_vote_count: battle.side(side).votes,
        new_total_votes: battle.total_votes,
        current_leader: battle.current_leader.as_ref().map(LeaderView::from),
        live_status: scoring::battle_live_status(&battle),
    })
}

/// Whether `user` already voted on `battle_id`.
pub async fn has_voted(
    state: &SharedState,
    user: &CurrentUser,
    battle_id: Uuid,
) -> Result<HasVotedResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let battle = store
        .find_battle(battle_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("battle `{battle_id}` not found")))?;

    Ok(HasVotedResponse {
        battle_id,
        has_voted: battle.has_participant(&user.id),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::{
        models::{BattleDraft, MatchingMethod, Winner},
        test_support::content,
    };

    fn battle() -> BattleEntity {
        let a = content("alice", "music");
        let b = content("bob", "music");
        let now = SystemTime::now();
        BattleEntity::open(
            &a,
            &b,
            &BattleDraft {
                id: Uuid::new_v4(),
                content_a: a.id,
                content_b: b.id,
                initiator_id: "system".into(),
                initiator_name: "System".into(),
                method: MatchingMethod::FlexibleAlgorithm,
                score: 0.0,
                created_at: now,
                ends_at: now + Duration::from_secs(3600),
            },
        )
    }

    #[test]
    fn vote_updates_counts_and_derived_fields() {
        let mut battle = battle();
        battle.view_count = 4;
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        apply_vote(&mut battle, "u1", Side::ItemA, now).unwrap();
        apply_vote(&mut battle, "u2", Side::ItemA, now).unwrap();
        apply_vote(&mut battle, "u3", Side::ItemB, now).unwrap();

        assert_eq!(battle.item_a.votes, 2);
        assert_eq!(battle.item_b.votes, 1);
        assert_eq!(battle.total_votes, 3);
        assert_eq!(battle.participants.len(), 3);
        assert_eq!(battle.metrics.engagement_rate, 0.75);
        assert_eq!(battle.last_vote_at, Some(now));

        let bucket = &battle.daily_votes["2023-11-14"];
        assert_eq!((bucket.item_a, bucket.item_b, bucket.total), (2, 1, 3));

        let leader = battle.current_leader.as_ref().unwrap();
        assert_eq!(leader.winner, Winner::ItemA);
        assert_eq!(leader.percentage, 67);
        assert!(battle.live_status.is_some());
    }

    #[test]
    fn second_vote_by_same_user_is_rejected_without_changes() {
        let mut battle = battle();
        let now = SystemTime::now();
        apply_vote(&mut battle, "u1", Side::ItemB, now).unwrap();
        let before = battle.clone();

        let err = apply_vote(&mut battle, "u1", Side::ItemA, now).unwrap_err();
        assert!(matches!(err, Abort::AlreadyVoted { .. }));
        assert_eq!(battle, before);
    }

    #[test]
    fn ended_battle_rejects_votes() {
        let mut battle = battle();
        battle.status = BattleStatus::Ended;
        let before = battle.clone();

        let err = apply_vote(&mut battle, "u1", Side::ItemA, SystemTime::now()).unwrap_err();
        assert_eq!(err, Abort::BattleEnded(battle.id));
        assert_eq!(battle, before);
    }

    #[test]
    fn engagement_uses_at_least_one_view() {
        let mut battle = battle();
        apply_vote(&mut battle, "u1", Side::ItemA, SystemTime::now()).unwrap();
        apply_vote(&mut battle, "u2", Side::ItemA, SystemTime::now()).unwrap();
        assert_eq!(battle.metrics.engagement_rate, 2.0);
    }

    #[test]
    fn day_key_is_utc_calendar_date() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(86_399);
        assert_eq!(day_key(at), "1970-01-01");
        assert_eq!(day_key(at + Duration::from_secs(1)), "1970-01-02");
    }

    #[tokio::test]
    async fn votes_on_unknown_battles_are_not_cached() {
        use crate::{
            config::AppConfig,
            dao::battle_store::MemoryBattleStore,
            state::AppState,
        };

        let state = AppState::new(AppConfig::default());
        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;
        let voter = CurrentUser::new("drifter");

        for _ in 0..50 {
            let err = cast_vote(&state, &voter, Uuid::new_v4(), Side::ItemA)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::NotFound(_)));
        }
        assert_eq!(state.standings().tracked_battles(), 0);
    }
}
