//! Matchmaker: pairs available contents into battles under a relaxable
//! constraint ladder.
//!
//! Planning ([`plan_matches`]) is pure and works on an owned copy of the pool.
//! [`run_matching`] reads the pool, plans, and commits pairs one by one; a pair
//! whose content was claimed elsewhere since the read is dropped and the rest
//! of the pool is re-planned.

use std::{
    collections::HashSet,
    sync::Arc,
    time::SystemTime,
};

use indexmap::IndexMap;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        battle_store::{BattleStore, ContentOrder, ContentQuery},
        models::{BattleEntity, BattleStatus, ContentEntity, ContentStatus, MatchingMethod},
        storage::{Abort, TxError},
    },
    dto::{
        identity::CurrentUser,
        matching::{
            CategoryCount, MatchingDiagnostics, MatchingFailure, MatchingFailureReason,
            MatchingStatistics,
        },
    },
    error::ServiceError,
    services::{
        pairing::{self, PairRequest},
        scoring,
    },
    state::SharedState,
};

/// Penalty applied to pairs formed by the cross-category pass.
const CROSS_CATEGORY_PENALTY: f64 = -20.0;
/// Upper bound of the pool read by [`matching_statistics`].
const STATISTICS_SAMPLE: usize = 1_000;

/// Relaxations a matching run may use beyond the strict pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchConstraints {
    /// Allow both sides to come from the same creator.
    pub allow_same_creator: bool,
    /// Allow sides from different categories.
    pub allow_cross_category: bool,
}

impl MatchConstraints {
    /// Every relaxation enabled.
    pub const MOST_PERMISSIVE: Self = Self {
        allow_same_creator: true,
        allow_cross_category: true,
    };

    /// Whether no further relaxation is possible.
    pub fn is_most_permissive(&self) -> bool {
        *self == Self::MOST_PERMISSIVE
    }
}

/// Rung of the constraint ladder that produced a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    /// Same category, distinct creators.
    Strict,
    /// Same category, creator check dropped.
    SameCreator,
    /// Any category.
    CrossCategory,
}

impl MatchPass {
    fn ladder(constraints: MatchConstraints) -> Vec<MatchPass> {
        let mut passes = vec![MatchPass::Strict];
        if constraints.allow_same_creator {
            passes.push(MatchPass::SameCreator);
        }
        if constraints.allow_cross_category {
            passes.push(MatchPass::CrossCategory);
        }
        passes
    }

    fn checks_creator(self, constraints: MatchConstraints) -> bool {
        match self {
            MatchPass::Strict => true,
            MatchPass::SameCreator => false,
            MatchPass::CrossCategory => !constraints.allow_same_creator,
        }
    }

    fn score_adjustment(self) -> f64 {
        match self {
            MatchPass::CrossCategory => CROSS_CATEGORY_PENALTY,
            MatchPass::Strict | MatchPass::SameCreator => 0.0,
        }
    }
}

/// Pair chosen by the planner.
#[derive(Debug, Clone)]
pub struct PlannedPair {
    /// Content placed on side A.
    pub a: ContentEntity,
    /// Content placed on side B.
    pub b: ContentEntity,
    /// Pass of the ladder that produced the pair.
    pub pass: MatchPass,
    /// Pair score, pass adjustment included.
    pub score: f64,
}

/// Planner output: the chosen pairs and the contents left available.
#[derive(Debug, Clone, Default)]
pub struct MatchPlan {
    /// Pairs to commit, best first.
    pub pairs: Vec<PlannedPair>,
    /// Contents that stay available.
    pub leftover: Vec<ContentEntity>,
}

/// Choose up to `quota` pairs from `pool`.
///
/// Same-category passes group contents by category in order of first
/// appearance, shuffle each group and pair consecutive items. A pair is skipped
/// when either side was already claimed in this plan or, where the pass checks
/// creators, when both share a creator.
pub fn plan_matches<R: Rng + ?Sized>(
    pool: &[ContentEntity],
    quota: usize,
    constraints: MatchConstraints,
    now: SystemTime,
    rng: &mut R,
) -> MatchPlan {
    let mut working = pool.to_vec();
    let mut pairs = Vec::new();

    for pass in MatchPass::ladder(constraints) {
        if pairs.len() >= quota {
            break;
        }

        let groups: Vec<Vec<usize>> = match pass {
            MatchPass::Strict | MatchPass::SameCreator => {
                let mut by_category: IndexMap<&str, Vec<usize>> = IndexMap::new();
                for (index, content) in working.iter().enumerate() {
                    by_category
                        .entry(content.pairing_category())
                        .or_default()
                        .push(index);
                }
                by_category.into_values().collect()
            }
            MatchPass::CrossCategory => vec![
                working
                    .iter()
                    .enumerate()
                    .filter(|(_, content)| content.is_available())
                    .map(|(index, _)| index)
                    .collect(),
            ],
        };

        for mut group in groups {
            if pairs.len() >= quota {
                break;
            }
            if group.len() < 2 {
                continue;
            }
            group.shuffle(rng);

            for chunk in group.chunks_exact(2) {
                if pairs.len() >= quota {
                    break;
                }
                let (i, j) = (chunk[0], chunk[1]);
                let (a, b) = (&working[i], &working[j]);
                if !a.is_available() || !b.is_available() {
                    continue;
                }
                if pass.checks_creator(constraints) && a.creator_id == b.creator_id {
                    continue;
                }

                let score = scoring::match_score(a, b, now, rng) + pass.score_adjustment();
                pairs.push(PlannedPair {
                    a: a.clone(),
                    b: b.clone(),
                    pass,
                    score,
                });
                working[i].status = ContentStatus::InBattle;
                working[j].status = ContentStatus::InBattle;
            }
        }
    }

    let leftover = working
        .into_iter()
        .filter(ContentEntity::is_available)
        .collect();
    MatchPlan { pairs, leftover }
}

/// Describe why `pool` yields no pair.
pub fn diagnose(pool: &[ContentEntity]) -> MatchingDiagnostics {
    let categories = category_counts(pool);
    let unique_creators = pool
        .iter()
        .map(|content| content.creator_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut possible_reasons = Vec::new();
    if categories.iter().all(|entry| entry.count < 2) {
        possible_reasons.push("every category has fewer than 2 available contents".to_owned());
    }
    if unique_creators == 1 {
        possible_reasons.push("all available contents share one creator".to_owned());
    }
    if possible_reasons.is_empty() {
        possible_reasons.push("candidate contents were claimed by a concurrent run".to_owned());
    }

    MatchingDiagnostics {
        total_contenders: pool.len(),
        categories,
        unique_creators,
        possible_reasons,
    }
}

fn category_counts(pool: &[ContentEntity]) -> Vec<CategoryCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for content in pool {
        *counts.entry(content.pairing_category()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_owned(),
            count,
        })
        .collect()
}

/// Parameters of one matching run.
#[derive(Debug, Clone, Copy)]
pub struct MatchRequest {
    /// Maximum battles to create.
    pub quota: usize,
    /// Relaxations allowed for this run.
    pub constraints: MatchConstraints,
}

/// Battles created by a matching run.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Battles in listing order.
    pub battles: Vec<BattleEntity>,
    /// Set when the battles came from the permissive fallback run.
    pub used_fallback: bool,
}

struct AttemptReport {
    pool: Vec<ContentEntity>,
    battles: Vec<BattleEntity>,
    storage_failures: usize,
}

/// Run the matchmaker on behalf of `initiator`.
///
/// When the requested constraints produce nothing, one more attempt runs with
/// quota 1 and every relaxation enabled.
pub async fn run_matching(
    state: &SharedState,
    initiator: &CurrentUser,
    request: MatchRequest,
) -> Result<MatchOutcome, ServiceError> {
    let store = state.require_battle_store().await?;

    let first = attempt(state, &store, initiator, request).await?;
    if !first.battles.is_empty() {
        info!(
            created = first.battles.len(),
            quota = request.quota,
            "matching run created battles"
        );
        return Ok(MatchOutcome {
            battles: first.battles,
            used_fallback: false,
        });
    }

    let mut storage_failures = first.storage_failures;
    if !request.constraints.is_most_permissive() {
        debug!("no pair under requested constraints; retrying with every relaxation");
        let fallback = MatchRequest {
            quota: 1,
            constraints: MatchConstraints::MOST_PERMISSIVE,
        };
        match attempt(state, &store, initiator, fallback).await {
            Ok(report) if !report.battles.is_empty() => {
                info!(
                    created = report.battles.len(),
                    "permissive fallback created battles"
                );
                return Ok(MatchOutcome {
                    battles: report.battles,
                    used_fallback: true,
                });
            }
            Ok(report) => storage_failures += report.storage_failures,
            Err(ServiceError::Matching(failure))
                if failure.reason == MatchingFailureReason::InsufficientContenders => {}
            Err(err) => return Err(err),
        }
    }

    if storage_failures > 0 {
        return Err(ServiceError::Matching(MatchingFailure::system_error(format!(
            "{storage_failures} battle commits failed"
        ))));
    }

    let diagnostics = diagnose(&first.pool);
    info!(
        total = diagnostics.total_contenders,
        creators = diagnostics.unique_creators,
        "matching run found no valid pair"
    );
    Err(ServiceError::Matching(MatchingFailure::no_valid_matches(
        diagnostics,
    )))
}

async fn attempt(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    initiator: &CurrentUser,
    request: MatchRequest,
) -> Result<AttemptReport, ServiceError> {
    let query = ContentQuery {
        order: ContentOrder::OldestFirst,
        limit: Some(state.config().matching.pool_size(request.quota)),
        ..ContentQuery::available()
    };
    let pool = store.query_contents(query).await.map_err(|err| {
        warn!(error = %err, "failed to read the matching pool");
        ServiceError::Matching(MatchingFailure::system_error(err.to_string()))
    })?;

    if pool.len() < 2 {
        return Err(ServiceError::Matching(MatchingFailure::insufficient(
            pool.len(),
        )));
    }

    let mut rng = StdRng::from_os_rng();
    let (battles, storage_failures) =
        commit_plan(state, store, initiator, pool.clone(), request, &mut rng).await;

    Ok(AttemptReport {
        pool,
        battles,
        storage_failures,
    })
}

/// Plan and commit until the quota is met or nothing pairable remains.
async fn commit_plan(
    state: &SharedState,
    store: &Arc<dyn BattleStore>,
    initiator: &CurrentUser,
    mut remaining: Vec<ContentEntity>,
    request: MatchRequest,
    rng: &mut StdRng,
) -> (Vec<BattleEntity>, usize) {
    let mut battles = Vec::new();
    let mut storage_failures = 0;

    loop {
        let quota_left = request.quota.saturating_sub(battles.len());
        if quota_left == 0 || remaining.len() < 2 {
            break;
        }

        let plan = plan_matches(
            &remaining,
            quota_left,
            request.constraints,
            SystemTime::now(),
            rng,
        );
        if plan.pairs.is_empty() {
            break;
        }

        let mut consumed: HashSet<Uuid> = HashSet::new();
        let mut replan = false;
        for pair in plan.pairs {
            let (a, b) = (pair.a.id, pair.b.id);
            let outcome = pairing::commit_pair(
                state,
                store,
                initiator,
                PairRequest {
                    content_a: a,
                    content_b: b,
                    method: MatchingMethod::FlexibleAlgorithm,
                    score: pair.score,
                },
            )
            .await;

            match outcome {
                Ok(battle) => {
                    debug!(battle_id = %battle.id, pass = ?pair.pass, "pair committed");
                    consumed.extend([a, b]);
                    battles.push(battle);
                }
                Err(TxError::Aborted(Abort::ContentUnavailable(stale))) => {
                    debug!(content_id = %stale, "content claimed since the pool read; re-planning");
                    consumed.insert(stale);
                    replan = true;
                    break;
                }
                Err(err) => {
                    warn!(content_a = %a, content_b = %b, error = %err, "failed to commit pair");
                    storage_failures += 1;
                    consumed.extend([a, b]);
                }
            }
        }

        remaining.retain(|content| !consumed.contains(&content.id));
        if !replan {
            break;
        }
    }

    (battles, storage_failures)
}

/// Size of the pool and of the running battles.
pub async fn matching_statistics(state: &SharedState) -> Result<MatchingStatistics, ServiceError> {
    let store = state.require_battle_store().await?;
    let available_contents = store.count_contents(ContentStatus::Available).await?;
    let ongoing_battles = store.count_battles(BattleStatus::Ongoing).await?;
    let pool = store
        .query_contents(ContentQuery {
            limit: Some(STATISTICS_SAMPLE),
            ..ContentQuery::available()
        })
        .await?;

    Ok(MatchingStatistics {
        available_contents,
        ongoing_battles,
        category_distribution: category_counts(&pool),
    })
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{battle_store::MemoryBattleStore, test_support::content},
        state::AppState,
    };

    const STRICT: MatchConstraints = MatchConstraints {
        allow_same_creator: false,
        allow_cross_category: false,
    };

    fn plan(pool: &[ContentEntity], quota: usize, constraints: MatchConstraints, seed: u64) -> MatchPlan {
        plan_matches(
            pool,
            quota,
            constraints,
            SystemTime::now(),
            &mut StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn strict_pass_pairs_within_category_and_across_creators() {
        let pool = vec![
            content("alice", "music"),
            content("bob", "music"),
            content("carol", "food"),
            content("dave", "food"),
        ];

        for seed in 0..20 {
            let plan = plan(&pool, 2, STRICT, seed);
            assert_eq!(plan.pairs.len(), 2);
            assert!(plan.leftover.is_empty());
            for pair in &plan.pairs {
                assert_eq!(pair.pass, MatchPass::Strict);
                assert_eq!(pair.a.category, pair.b.category);
                assert_ne!(pair.a.creator_id, pair.b.creator_id);
            }
        }
    }

    #[test]
    fn quota_limits_the_number_of_pairs() {
        let pool: Vec<_> = (0..6)
            .map(|i| content(&format!("creator-{i}"), "music"))
            .collect();
        let plan = plan(&pool, 1, STRICT, 3);
        assert_eq!(plan.pairs.len(), 1);
        assert_eq!(plan.leftover.len(), 4);
    }

    #[test]
    fn same_creator_pair_needs_the_relaxation() {
        let pool = vec![content("alice", "music"), content("alice", "music")];

        assert!(plan(&pool, 1, STRICT, 1).pairs.is_empty());

        let relaxed = MatchConstraints {
            allow_same_creator: true,
            ..STRICT
        };
        let plan = plan(&pool, 1, relaxed, 1);
        assert_eq!(plan.pairs.len(), 1);
        assert_eq!(plan.pairs[0].pass, MatchPass::SameCreator);
    }

    #[test]
    fn cross_category_pass_is_penalised() {
        let pool = vec![content("alice", "music"), content("bob", "food")];
        assert!(plan(&pool, 1, STRICT, 2).pairs.is_empty());

        let relaxed = MatchConstraints {
            allow_cross_category: true,
            ..STRICT
        };
        let plan = plan(&pool, 1, relaxed, 2);
        let pair = &plan.pairs[0];
        assert_eq!(pair.pass, MatchPass::CrossCategory);
        // 30 popularity + 20 freshness + jitter, then the penalty
        assert!((30.0..40.0).contains(&pair.score), "score {}", pair.score);
    }

    #[test]
    fn cross_category_keeps_creator_check_unless_relaxed() {
        let pool = vec![content("alice", "music"), content("alice", "food")];
        let cross_only = MatchConstraints {
            allow_cross_category: true,
            ..STRICT
        };
        assert!(plan(&pool, 1, cross_only, 4).pairs.is_empty());
        assert_eq!(plan(&pool, 1, MatchConstraints::MOST_PERMISSIVE, 4).pairs.len(), 1);
    }

    #[test]
    fn planner_never_reuses_claimed_or_unavailable_items() {
        let mut pool: Vec<_> = (0..5)
            .map(|i| content(&format!("creator-{i}"), if i % 2 == 0 { "music" } else { "food" }))
            .collect();
        pool[0].status = ContentStatus::InBattle;

        for seed in 0..20 {
            let plan = plan(&pool, 5, MatchConstraints::MOST_PERMISSIVE, seed);
            let mut seen = HashSet::new();
            for pair in &plan.pairs {
                assert!(pair.a.is_available() && pair.b.is_available());
                assert!(seen.insert(pair.a.id));
                assert!(seen.insert(pair.b.id));
            }
            assert!(!seen.contains(&pool[0].id));
            assert_eq!(seen.len() + plan.leftover.len(), 4);
        }
    }

    #[test]
    fn diagnostics_name_the_likely_causes() {
        let pool = vec![content("alice", "music"), content("alice", "food")];
        let diagnostics = diagnose(&pool);

        assert_eq!(diagnostics.total_contenders, 2);
        assert_eq!(diagnostics.unique_creators, 1);
        assert_eq!(
            diagnostics.categories,
            vec![
                CategoryCount {
                    category: "music".into(),
                    count: 1
                },
                CategoryCount {
                    category: "food".into(),
                    count: 1
                },
            ]
        );
        assert_eq!(diagnostics.possible_reasons.len(), 2);
    }

    async fn seeded_state(contents: Vec<ContentEntity>) -> (SharedState, MemoryBattleStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryBattleStore::new();
        for content in contents {
            BattleStore::insert_content(&store, content).await.unwrap();
        }
        state.install_battle_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn run_creates_battles_and_claims_contents() {
        let (state, store) = seeded_state(vec![
            content("alice", "music"),
            content("bob", "music"),
            content("carol", "food"),
            content("dave", "food"),
        ])
        .await;

        let outcome = run_matching(
            &state,
            &CurrentUser::new("runner"),
            MatchRequest {
                quota: 2,
                constraints: MatchConstraints::default(),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.battles.len(), 2);
        assert!(!outcome.used_fallback);
        assert_eq!(store.count_contents(ContentStatus::Available).await.unwrap(), 0);
        assert_eq!(store.count_contents(ContentStatus::InBattle).await.unwrap(), 4);
        for battle in &outcome.battles {
            assert_eq!(battle.creator_id, "runner");
            assert_eq!(battle.matching_method, MatchingMethod::FlexibleAlgorithm);
        }
    }

    #[tokio::test]
    async fn fallback_pairs_same_creator_contents() {
        let (state, _store) =
            seeded_state(vec![content("alice", "music"), content("alice", "music")]).await;

        let outcome = run_matching(
            &state,
            &CurrentUser::new("runner"),
            MatchRequest {
                quota: 3,
                constraints: MatchConstraints::default(),
            },
        )
        .await
        .unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(outcome.battles.len(), 1);
        assert!(outcome.battles[0].is_same_creator);
    }

    #[tokio::test]
    async fn single_content_is_insufficient() {
        let (state, _store) = seeded_state(vec![content("alice", "music")]).await;

        let err = run_matching(
            &state,
            &CurrentUser::new("runner"),
            MatchRequest {
                quota: 1,
                constraints: MatchConstraints::default(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Matching(MatchingFailure {
                reason: MatchingFailureReason::InsufficientContenders,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn stale_content_is_skipped_and_pool_re_planned() {
        let stale = content("alice", "music");
        let (state, store) = seeded_state(vec![
            stale.clone(),
            content("bob", "music"),
            content("carol", "music"),
        ])
        .await;

        // Claim `stale` behind the planner's back: the pool read below still
        // reports it available.
        let mut pool = vec![stale.clone()];
        pool.extend(
            store
                .query_contents(ContentQuery::available())
                .await
                .unwrap()
                .into_iter()
                .filter(|content| content.id != stale.id),
        );
        let bystander = content("zed", "other");
        BattleStore::insert_content(&store, bystander.clone()).await.unwrap();
        store
            .commit_pair(pairing::draft_for(
                &state,
                &CurrentUser::new("other"),
                &PairRequest {
                    content_a: stale.id,
                    content_b: bystander.id,
                    method: MatchingMethod::ForceMatching,
                    score: 0.0,
                },
                SystemTime::now(),
            ))
            .await
            .unwrap();

        let store: Arc<dyn BattleStore> = Arc::new(store);
        let mut rng = StdRng::seed_from_u64(9);
        let (battles, failures) = commit_plan(
            &state,
            &store,
            &CurrentUser::new("runner"),
            pool,
            MatchRequest {
                quota: 1,
                constraints: MatchConstraints::default(),
            },
            &mut rng,
        )
        .await;

        assert_eq!(failures, 0);
        assert_eq!(battles.len(), 1);
        let battle = &battles[0];
        assert_ne!(battle.item_a.contender_id, stale.id);
        assert_ne!(battle.item_b.contender_id, stale.id);
    }

    #[tokio::test]
    async fn degraded_state_refuses_to_match() {
        let state = AppState::new(AppConfig::default());
        let err = run_matching(
            &state,
            &CurrentUser::new("runner"),
            MatchRequest {
                quota: 1,
                constraints: MatchConstraints::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
