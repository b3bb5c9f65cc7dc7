use std::{collections::HashMap, sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BattleMutation, BattleQuery, BattleStore, ContentQuery, check_claimable, check_deletable};
use crate::dao::{
    models::{BattleDraft, BattleEntity, BattleStatus, ContentEntity, ContentStatus},
    storage::{Abort, StorageResult, TxResult},
};

/// Process-local store used for development and tests.
///
/// The contents lock is held for the whole pair commit; battle mutations run
/// under the per-entry lock of the battles map.
#[derive(Clone, Default)]
pub struct MemoryBattleStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    contents: RwLock<HashMap<Uuid, ContentEntity>>,
    battles: DashMap<Uuid, BattleEntity>,
}

impl MemoryBattleStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn claim_pair(&self, draft: BattleDraft) -> TxResult<BattleEntity> {
        let mut contents = self.inner.contents.write().await;
        if draft.content_a == draft.content_b {
            return Err(Abort::ContentUnavailable(draft.content_b).into());
        }

        let a = check_claimable(contents.get(&draft.content_a), draft.content_a)?.clone();
        let b = check_claimable(contents.get(&draft.content_b), draft.content_b)?.clone();
        let battle = BattleEntity::open(&a, &b, &draft);

        for id in [a.id, b.id] {
            if let Some(content) = contents.get_mut(&id) {
                content.claim_for_battle(battle.id, draft.created_at);
            }
        }
        self.inner.battles.insert(battle.id, battle.clone());

        Ok(battle)
    }

    async fn soft_delete(
        &self,
        id: Uuid,
        owner_id: &str,
        at: SystemTime,
    ) -> TxResult<ContentEntity> {
        let mut contents = self.inner.contents.write().await;
        let Some(content) = contents.get_mut(&id) else {
            return Err(Abort::ContentNotFound(id).into());
        };

        check_deletable(content, owner_id)?;
        content.mark_deleted(at);
        Ok(content.clone())
    }

    fn mutate_entry(&self, id: Uuid, mutation: &BattleMutation) -> TxResult<BattleEntity> {
        let Some(mut entry) = self.inner.battles.get_mut(&id) else {
            return Err(Abort::BattleNotFound(id).into());
        };

        let mut next = entry.value().clone();
        mutation(&mut next)?;
        next.revision += 1;
        *entry = next.clone();
        Ok(next)
    }

    fn count_view(&self, id: Uuid, viewer: Option<&str>, at: SystemTime) -> bool {
        match self.inner.battles.get_mut(&id) {
            Some(mut battle) => {
                let changed = battle.record_view(viewer, at);
                if changed {
                    battle.revision += 1;
                }
                changed
            }
            None => false,
        }
    }
}

impl BattleStore for MemoryBattleStore {
    fn insert_content(&self, content: ContentEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.contents.write().await.insert(content.id, content);
            Ok(())
        })
    }

    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.contents.read().await.get(&id).cloned()) })
    }

    fn query_contents(
        &self,
        query: ContentQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<ContentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let contents = store.inner.contents.read().await;
            Ok(query.apply(contents.values()))
        })
    }

    fn count_contents(&self, status: ContentStatus) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let contents = store.inner.contents.read().await;
            Ok(contents.values().filter(|content| content.status == status).count() as u64)
        })
    }

    fn delete_content(
        &self,
        id: Uuid,
        owner_id: String,
        at: SystemTime,
    ) -> BoxFuture<'static, TxResult<ContentEntity>> {
        let store = self.clone();
        Box::pin(async move { store.soft_delete(id, &owner_id, at).await })
    }

    fn commit_pair(&self, draft: BattleDraft) -> BoxFuture<'static, TxResult<BattleEntity>> {
        let store = self.clone();
        Box::pin(async move { store.claim_pair(draft).await })
    }

    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .battles
                .get(&id)
                .map(|battle| battle.value().clone()))
        })
    }

    fn query_battles(
        &self,
        query: BattleQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let snapshot: Vec<BattleEntity> = store
                .inner
                .battles
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            Ok(query.apply(snapshot.iter()))
        })
    }

    fn count_battles(&self, status: BattleStatus) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .battles
                .iter()
                .filter(|entry| entry.status == status)
                .count() as u64)
        })
    }

    fn modify_battle(
        &self,
        id: Uuid,
        mutation: BattleMutation,
    ) -> BoxFuture<'static, TxResult<BattleEntity>> {
        let store = self.clone();
        Box::pin(async move { store.mutate_entry(id, &mutation) })
    }

    fn record_view(
        &self,
        id: Uuid,
        viewer: Option<String>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.count_view(id, viewer.as_deref(), at)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
