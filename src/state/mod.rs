mod sse;
/// In-memory vote standings.
pub mod standings;

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::{RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        battle_store::BattleStore,
        models::{BattleEntity, Side},
    },
    error::ServiceError,
};

pub use self::sse::SseHub;
use self::standings::{LiveStandings, StandingsSnapshot};

/// Reference-counted handle to the application state.
pub type SharedState = Arc<AppState>;
/// Time a vote may take before it is reconciled against the store.
pub const DEFAULT_VOTE_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLIC_SSE_CAPACITY: usize = 64;

/// Central application state: store handle, live standings and SSE fan-out.
pub struct AppState {
    battle_store: RwLock<Option<Arc<dyn BattleStore>>>,
    public_sse: SseHub,
    standings: LiveStandings,
    degraded: watch::Sender<bool>,
    vote_timeout: Option<Duration>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            battle_store: RwLock::new(None),
            public_sse: SseHub::new(PUBLIC_SSE_CAPACITY),
            standings: LiveStandings::new(),
            degraded: degraded_tx,
            vote_timeout: Some(DEFAULT_VOTE_TIMEOUT),
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current battle store, if one is installed.
    pub async fn battle_store(&self) -> Option<Arc<dyn BattleStore>> {
        let guard = self.battle_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while none is installed or
    /// the installed one failed its health check.
    pub async fn require_battle_store(&self) -> Result<Arc<dyn BattleStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.battle_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new battle store implementation and leave degraded mode.
    pub async fn install_battle_store(&self, store: Arc<dyn BattleStore>) {
        {
            let mut guard = self.battle_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current battle store and enter degraded mode.
    pub async fn clear_battle_store(&self) {
        {
            let mut guard = self.battle_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Live standings cache.
    pub fn standings(&self) -> &LiveStandings {
        &self.standings
    }

    /// Update and broadcast the degraded flag when the value changes.
    ///
    /// Returns whether the flag changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Run a vote through the live standings: the vote is visible as tentative
    /// while `work` runs, then confirmed with the battle it returns or reverted
    /// when it fails.
    ///
    /// When `work` times out its write may still have landed, so `reconcile`
    /// re-reads the battle and yields it when the vote is present. The vote is
    /// then confirmed as if `work` had returned; otherwise it is reverted.
    pub async fn run_tentative_vote<F, Fut, R, RFut>(
        &self,
        battle_id: Uuid,
        side: Side,
        work: F,
        reconcile: R,
    ) -> Result<(BattleEntity, StandingsSnapshot), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BattleEntity, ServiceError>>,
        R: FnOnce() -> RFut,
        RFut: Future<Output = Result<Option<BattleEntity>, ServiceError>>,
    {
        let ticket = self.standings.apply_tentative(battle_id, side);

        let work_future = work();
        let outcome = match self.vote_timeout {
            Some(limit) => match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(battle_id = %battle_id, ticket = %ticket.id, "vote timed out; re-reading battle");
                    match reconcile().await {
                        Ok(Some(battle)) => Ok(battle),
                        Ok(None) => Err(ServiceError::Timeout),
                        Err(err) => {
                            warn!(battle_id = %battle_id, error = %err, "could not re-read battle after vote timeout");
                            Err(ServiceError::Timeout)
                        }
                    }
                }
            },
            None => work_future.await,
        };

        match outcome {
            Ok(battle) => {
                let snapshot = match self.standings.confirm(ticket, &battle) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(
                            battle_id = %battle_id,
                            ticket = %ticket.id,
                            error = %err,
                            "failed to confirm tentative vote; reseeding standings"
                        );
                        self.standings.seed(&battle)
                    }
                };
                Ok((battle, snapshot))
            }
            Err(err) => {
                if let Err(revert_err) = self.standings.revert(ticket) {
                    warn!(
                        battle_id = %battle_id,
                        ticket = %ticket.id,
                        error = %revert_err,
                        "failed to revert tentative vote after work error"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::{
        battle_store::{BattleMutation, MemoryBattleStore},
        models::{BattleDraft, MatchingMethod},
        test_support::content,
    };

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode_once() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_battle_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state
            .install_battle_store(Arc::new(MemoryBattleStore::new()))
            .await;
        assert!(!watcher.has_changed().unwrap());

        state.clear_battle_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn failed_vote_is_reverted_from_standings() {
        let state = AppState::new(AppConfig::default());
        let battle_id = Uuid::new_v4();

        let result = state
            .run_tentative_vote(
                battle_id,
                Side::ItemA,
                || async { Err(ServiceError::InvalidState("battle ended".into())) },
                || async { Ok(None) },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
        assert!(state.standings().snapshot(battle_id).is_none());
        assert_eq!(state.standings().tracked_battles(), 0);
    }

    async fn stored_battle(store: &MemoryBattleStore) -> BattleEntity {
        let (a, b) = (content("alice", "music"), content("bob", "music"));
        store.insert_content(a.clone()).await.unwrap();
        store.insert_content(b.clone()).await.unwrap();
        let now = SystemTime::now();
        store
            .commit_pair(BattleDraft {
                id: Uuid::new_v4(),
                content_a: a.id,
                content_b: b.id,
                initiator_id: "system".into(),
                initiator_name: "System".into(),
                method: MatchingMethod::FlexibleAlgorithm,
                score: 0.0,
                created_at: now,
                ends_at: now + Duration::from_secs(3600),
            })
            .await
            .unwrap()
    }

    fn add_vote(user: &'static str) -> BattleMutation {
        Arc::new(move |battle: &mut BattleEntity| {
            battle.item_a.votes += 1;
            battle.total_votes += 1;
            battle.participants.push(user.to_owned());
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn vote_stored_after_timeout_is_confirmed() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryBattleStore::new();
        let battle = stored_battle(&store).await;

        let result = state
            .run_tentative_vote(
                battle.id,
                Side::ItemA,
                || async {
                    let written = store.modify_battle(battle.id, add_vote("slow")).await?;
                    tokio::time::sleep(DEFAULT_VOTE_TIMEOUT * 2).await;
                    Ok(written)
                },
                || async {
                    let current = store.find_battle(battle.id).await?;
                    Ok(current.filter(|battle| battle.has_participant("slow")))
                },
            )
            .await;

        let (settled, snapshot) = result.unwrap();
        assert_eq!(settled.total_votes, 1);
        assert_eq!(snapshot.confirmed.item_a, 1);
        assert_eq!(snapshot.pending, 0);
        assert_eq!(state.standings().snapshot(battle.id).unwrap().confirmed.item_a, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn vote_missing_after_timeout_is_reverted() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryBattleStore::new();
        let battle = stored_battle(&store).await;
        state.standings().seed(&battle);

        let result = state
            .run_tentative_vote(
                battle.id,
                Side::ItemB,
                || async {
                    tokio::time::sleep(DEFAULT_VOTE_TIMEOUT * 2).await;
                    Ok(battle.clone())
                },
                || async {
                    let current = store.find_battle(battle.id).await?;
                    Ok(current.filter(|battle| battle.has_participant("slow")))
                },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Timeout)));
        let snapshot = state.standings().snapshot(battle.id).unwrap();
        assert_eq!((snapshot.projected.item_b, snapshot.pending), (0, 0));
    }
}
