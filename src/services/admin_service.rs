//! Administrative operations: forced pairing and content totals.

use tracing::{info, warn};

use crate::{
    dao::{
        battle_store::{ContentOrder, ContentQuery},
        models::{ContentEntity, ContentStatus, MatchingMethod},
        storage::{Abort, TxError},
    },
    dto::{
        admin::{ContentStatusResponse, ForcePairingRequest, ForcePairingResponse},
        battle::BattleView,
        identity::CurrentUser,
        matching::MatchingFailure,
    },
    error::ServiceError,
    services::pairing::{self, PairRequest},
    state::SharedState,
};

/// Identity recorded on battles forced by an administrator.
fn admin_initiator() -> CurrentUser {
    CurrentUser {
        id: "admin".into(),
        name: Some("Admin".into()),
        email: None,
    }
}

/// Pick two contents, preferring distinct creators and ignoring categories.
fn pick_pair(pool: &[ContentEntity]) -> Option<(usize, usize)> {
    for (i, a) in pool.iter().enumerate() {
        if let Some(offset) = pool[i + 1..]
            .iter()
            .position(|b| b.creator_id != a.creator_id)
        {
            return Some((i, i + 1 + offset));
        }
    }
    (pool.len() >= 2).then_some((0, 1))
}

/// Pair contents regardless of category, and of creator when nothing else is left.
pub async fn force_pairing(
    state: &SharedState,
    request: ForcePairingRequest,
) -> Result<ForcePairingResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let quota = request.quota.unwrap_or(1);
    let initiator = admin_initiator();
    let mut battles = Vec::new();

    let mut pool = store
        .query_contents(ContentQuery {
            order: ContentOrder::OldestFirst,
            limit: Some(state.config().matching.force_pool_size),
            ..ContentQuery::available()
        })
        .await?;
    if pool.len() < 2 {
        return Err(ServiceError::Matching(MatchingFailure::insufficient(
            pool.len(),
        )));
    }

    while battles.len() < quota {
        let Some((i, j)) = pick_pair(&pool) else {
            break;
        };
        let (a, b) = (pool[i].id, pool[j].id);
        let outcome = pairing::commit_pair(
            state,
            &store,
            &initiator,
            PairRequest {
                content_a: a,
                content_b: b,
                method: MatchingMethod::ForceMatching,
                score: 0.0,
            },
        )
        .await;

        match outcome {
            Ok(battle) => {
                pool.retain(|content| content.id != a && content.id != b);
                battles.push(battle);
            }
            Err(TxError::Aborted(Abort::ContentUnavailable(stale))) => {
                pool.retain(|content| content.id != stale);
            }
            Err(err) => {
                warn!(error = %err, "forced pairing commit failed");
                if battles.is_empty() {
                    return Err(err.into());
                }
                break;
            }
        }
    }

    if battles.is_empty() {
        return Err(ServiceError::Matching(MatchingFailure::insufficient(
            pool.len(),
        )));
    }

    info!(created = battles.len(), "forced pairing created battles");
    Ok(ForcePairingResponse {
        success: true,
        matches_created: battles.len(),
        battles: battles.iter().map(BattleView::from).collect(),
    })
}

/// Totals of contents per status.
pub async fn content_status(state: &SharedState) -> Result<ContentStatusResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let available = store.count_contents(ContentStatus::Available).await?;
    let in_battle = store.count_contents(ContentStatus::InBattle).await?;
    let deleted = store.count_contents(ContentStatus::Deleted).await?;

    Ok(ContentStatusResponse {
        available,
        in_battle,
        deleted,
        total: available + in_battle + deleted,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            battle_store::{BattleStore, MemoryBattleStore},
            test_support::content,
        },
        state::AppState,
    };

    #[test]
    fn pick_prefers_distinct_creators() {
        let pool = vec![
            content("alice", "music"),
            content("alice", "food"),
            content("bob", "pets"),
        ];
        assert_eq!(pick_pair(&pool), Some((0, 2)));

        let same = vec![content("alice", "music"), content("alice", "food")];
        assert_eq!(pick_pair(&same), Some((0, 1)));
        assert_eq!(pick_pair(&same[..1]), None);
    }

    #[tokio::test]
    async fn forced_battle_ignores_category() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryBattleStore::new();
        for content in [content("alice", "music"), content("bob", "food")] {
            store.insert_content(content).await.unwrap();
        }
        state.install_battle_store(Arc::new(store.clone())).await;

        let response = force_pairing(&state, ForcePairingRequest::default())
            .await
            .unwrap();
        assert_eq!(response.matches_created, 1);
        let battle = &response.battles[0];
        assert_eq!(battle.matching_method, MatchingMethod::ForceMatching);
        assert_eq!(battle.matching_score, 0.0);
        assert!(battle.is_cross_category);

        let status = content_status(&state).await.unwrap();
        assert_eq!((status.available, status.in_battle, status.total), (0, 2, 2));
    }
}
