//! Battle reads and manual battle creation.

use std::time::SystemTime;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        battle_store::{BattleOrder, BattleQuery},
        models::{BattleEntity, BattleStatus, MatchingMethod},
        storage::Abort,
    },
    dto::{
        battle::{
            BattleDetailResponse, BattleListResponse, BattleView, CreateBattleRequest,
            CreateBattleResponse, LiveStandingsResponse,
        },
        identity::CurrentUser,
    },
    error::ServiceError,
    services::{
        pairing::{self, PairRequest},
        scoring,
    },
    state::SharedState,
};

/// Create a battle between two chosen contents. Both must share a category and
/// come from different creators.
pub async fn create_battle(
    state: &SharedState,
    user: &CurrentUser,
    request: CreateBattleRequest,
) -> Result<CreateBattleResponse, ServiceError> {
    if request.content_a_id == request.content_b_id {
        return Err(ServiceError::InvalidInput(
            "a battle needs two different contents".into(),
        ));
    }

    let store = state.require_battle_store().await?;
    let mut contents = Vec::with_capacity(2);
    for id in [request.content_a_id, request.content_b_id] {
        let content = store
            .find_content(id)
            .await?
            .ok_or(Abort::ContentNotFound(id))?;
        contents.push(content);
    }
    let (a, b) = (&contents[0], &contents[1]);

    if a.pairing_category() != b.pairing_category() {
        return Err(ServiceError::InvalidInput(format!(
            "contents belong to different categories (`{}` and `{}`)",
            a.pairing_category(),
            b.pairing_category()
        )));
    }
    if a.creator_id == b.creator_id {
        return Err(ServiceError::InvalidInput(
            "contents from the same creator cannot battle".into(),
        ));
    }

    let score = scoring::match_score(a, b, SystemTime::now(), &mut rand::rng());
    let battle = pairing::commit_pair(
        state,
        &store,
        user,
        PairRequest {
            content_a: a.id,
            content_b: b.id,
            method: MatchingMethod::SmartAlgorithm,
            score,
        },
    )
    .await?;

    Ok(CreateBattleResponse {
        success: true,
        battle_id: battle.id,
        battle: BattleView::from(&battle),
    })
}

/// Load one battle and count a view for it shortly afterwards.
pub async fn battle_detail(
    state: &SharedState,
    viewer: Option<&CurrentUser>,
    id: Uuid,
) -> Result<BattleDetailResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let battle = store
        .find_battle(id)
        .await?
        .ok_or(Abort::BattleNotFound(id))?;

    state.standings().seed(&battle);
    schedule_view(state.clone(), id, viewer.map(|viewer| viewer.id.clone()));

    let now = SystemTime::now();
    Ok(BattleDetailResponse {
        success: true,
        battle: BattleView::from(&battle).with_trending(&battle, now),
    })
}

/// Count a view after the configured delay. Failures are only logged.
fn schedule_view(state: SharedState, battle_id: Uuid, viewer: Option<String>) {
    let delay = state.config().view_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let store = match state.require_battle_store().await {
            Ok(store) => store,
            Err(err) => {
                debug!(battle_id = %battle_id, error = %err, "skipping view count");
                return;
            }
        };
        match store.record_view(battle_id, viewer, SystemTime::now()).await {
            Ok(counted) => debug!(battle_id = %battle_id, counted, "view recorded"),
            Err(err) => warn!(battle_id = %battle_id, error = %err, "failed to record view"),
        }
    });
}

async fn list(
    state: &SharedState,
    query: BattleQuery,
    decorate: impl Fn(&BattleEntity, SystemTime) -> BattleView,
) -> BattleListResponse {
    let store = match state.require_battle_store().await {
        Ok(store) => store,
        Err(err) => return BattleListResponse::failed(err),
    };
    match store.query_battles(query).await {
        Ok(battles) => {
            let now = SystemTime::now();
            BattleListResponse::ok(battles.iter().map(|battle| decorate(battle, now)).collect())
        }
        Err(err) => {
            warn!(error = %err, "battle listing failed");
            BattleListResponse::failed(err)
        }
    }
}

fn plain(battle: &BattleEntity, _now: SystemTime) -> BattleView {
    BattleView::from(battle)
}

/// Ongoing battles with the most votes, flagged hot when recently active.
pub async fn trending(state: &SharedState, limit: Option<usize>) -> BattleListResponse {
    let query = BattleQuery {
        status: Some(BattleStatus::Ongoing),
        order: BattleOrder::MostVoted,
        limit: Some(state.config().listing.clamp(limit)),
        ..BattleQuery::default()
    };
    list(state, query, |battle, now| {
        BattleView::from(battle)
            .with_trending(battle, now)
            .with_hot(battle, now)
    })
    .await
}

/// Most voted battles in a category, excluding `battle_id`.
///
/// The category defaults to the one of `battle_id`.
pub async fn related(
    state: &SharedState,
    battle_id: Uuid,
    category: Option<String>,
    limit: Option<usize>,
) -> BattleListResponse {
    let category = match category.filter(|category| !category.trim().is_empty()) {
        Some(category) => category,
        None => {
            let store = match state.require_battle_store().await {
                Ok(store) => store,
                Err(err) => return BattleListResponse::failed(err),
            };
            match store.find_battle(battle_id).await {
                Ok(Some(battle)) => battle.category,
                Ok(None) => return BattleListResponse::failed(Abort::BattleNotFound(battle_id)),
                Err(err) => return BattleListResponse::failed(err),
            }
        }
    };

    let query = BattleQuery {
        category: Some(category),
        exclude: Some(battle_id),
        order: BattleOrder::MostVoted,
        limit: Some(state.config().listing.clamp(limit)),
        ..BattleQuery::default()
    };
    list(state, query, plain).await
}

/// All battles by votes, then views.
pub async fn popular(state: &SharedState, limit: Option<usize>) -> BattleListResponse {
    let query = BattleQuery {
        order: BattleOrder::MostVoted,
        limit: Some(state.config().listing.clamp(limit)),
        ..BattleQuery::default()
    };
    list(state, query, plain).await
}

/// Newest battles whose title or side titles contain `term`.
pub async fn search(
    state: &SharedState,
    term: String,
    category: Option<String>,
    limit: Option<usize>,
) -> BattleListResponse {
    let term = term.trim().to_owned();
    if term.is_empty() {
        return BattleListResponse::ok(Vec::new());
    }
    let query = BattleQuery {
        category: category.filter(|category| !category.trim().is_empty()),
        search: Some(term),
        limit: Some(state.config().listing.clamp(limit)),
        ..BattleQuery::default()
    };
    list(state, query, plain).await
}

/// Battles created by `user_id`, newest first.
pub async fn user_battles(
    state: &SharedState,
    user_id: String,
    limit: Option<usize>,
) -> BattleListResponse {
    let query = BattleQuery {
        creator_id: Some(user_id),
        limit: Some(state.config().listing.clamp(limit)),
        ..BattleQuery::default()
    };
    list(state, query, plain).await
}

/// Live standings from the cache, seeded from the store on first access.
pub async fn live_standings(
    state: &SharedState,
    battle_id: Uuid,
) -> Result<LiveStandingsResponse, ServiceError> {
    if let Some(snapshot) = state.standings().snapshot(battle_id) {
        return Ok(LiveStandingsResponse::new(battle_id, snapshot));
    }

    let store = state.require_battle_store().await?;
    let battle = store
        .find_battle(battle_id)
        .await?
        .ok_or(Abort::BattleNotFound(battle_id))?;
    let snapshot = state.standings().seed(&battle);
    Ok(LiveStandingsResponse::new(battle_id, snapshot))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            battle_store::{BattleStore, MemoryBattleStore},
            models::ContentEntity,
            test_support::content,
        },
        state::AppState,
    };

    async fn setup(contents: &[ContentEntity]) -> (SharedState, MemoryBattleStore) {
        let mut config = AppConfig::default();
        config.view_delay = Duration::from_millis(10);
        let state = AppState::new(config);
        let store = MemoryBattleStore::new();
        for content in contents {
            store.insert_content(content.clone()).await.unwrap();
        }
        state.install_battle_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn manual_battle_requires_same_category_and_distinct_creators() {
        let a = content("alice", "music");
        let b = content("bob", "food");
        let c = content("alice", "music");
        let d = content("dave", "music");
        let (state, _store) = setup(&[a.clone(), b.clone(), c.clone(), d.clone()]).await;
        let user = CurrentUser::new("maker");

        let cross = CreateBattleRequest {
            content_a_id: a.id,
            content_b_id: b.id,
        };
        assert!(matches!(
            create_battle(&state, &user, cross).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let same_creator = CreateBattleRequest {
            content_a_id: a.id,
            content_b_id: c.id,
        };
        assert!(matches!(
            create_battle(&state, &user, same_creator).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let created = create_battle(
            &state,
            &user,
            CreateBattleRequest {
                content_a_id: a.id,
                content_b_id: d.id,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.battle.matching_method, MatchingMethod::SmartAlgorithm);
        assert_eq!(created.battle.creator_id, "maker");

        let again = create_battle(
            &state,
            &user,
            CreateBattleRequest {
                content_a_id: d.id,
                content_b_id: c.id,
            },
        )
        .await;
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn missing_content_is_not_found() {
        let a = content("alice", "music");
        let (state, _store) = setup(&[a.clone()]).await;
        let err = create_battle(
            &state,
            &CurrentUser::new("maker"),
            CreateBattleRequest {
                content_a_id: a.id,
                content_b_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn detail_schedules_a_view() {
        let a = content("alice", "music");
        let b = content("bob", "music");
        let (state, store) = setup(&[a.clone(), b.clone()]).await;
        let created = create_battle(
            &state,
            &CurrentUser::new("maker"),
            CreateBattleRequest {
                content_a_id: a.id,
                content_b_id: b.id,
            },
        )
        .await
        .unwrap();

        let viewer = CurrentUser::new("viewer");
        let detail = battle_detail(&state, Some(&viewer), created.battle_id)
            .await
            .unwrap();
        assert!(detail.battle.trending_score.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stored = store.find_battle(created.battle_id).await.unwrap().unwrap();
        assert_eq!(stored.view_count, 1);
        assert_eq!(stored.unique_viewers, vec!["viewer".to_string()]);
    }

    #[tokio::test]
    async fn related_defaults_to_the_battle_category_and_excludes_it() {
        let contents: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|creator| content(creator, "music"))
            .collect();
        let (state, _store) = setup(&contents).await;
        let user = CurrentUser::new("maker");
        let mut ids = Vec::new();
        for pair in contents.chunks(2) {
            let created = create_battle(
                &state,
                &user,
                CreateBattleRequest {
                    content_a_id: pair[0].id,
                    content_b_id: pair[1].id,
                },
            )
            .await
            .unwrap();
            ids.push(created.battle_id);
        }

        let related = related(&state, ids[0], None, None).await;
        assert!(related.success);
        assert_eq!(related.battles.len(), 1);
        assert_eq!(related.battles[0].id, ids[1]);

        let missing = super::related(&state, Uuid::new_v4(), None, None).await;
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn search_matches_side_titles_case_insensitively() {
        let mut a = content("alice", "music");
        a.title = "Midnight Jazz".into();
        let b = content("bob", "music");
        let (state, _store) = setup(&[a.clone(), b.clone()]).await;
        create_battle(
            &state,
            &CurrentUser::new("maker"),
            CreateBattleRequest {
                content_a_id: a.id,
                content_b_id: b.id,
            },
        )
        .await
        .unwrap();

        assert_eq!(search(&state, "JAZZ".into(), None, None).await.battles.len(), 1);
        assert!(search(&state, "polka".into(), None, None).await.battles.is_empty());
        assert_eq!(
            user_battles(&state, "maker".into(), None).await.battles.len(),
            1
        );
        let trending = trending(&state, None).await;
        assert_eq!(trending.battles[0].is_hot, Some(false));
    }
}
