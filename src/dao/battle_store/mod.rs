/// In-process store used by tests and the memory backend.
pub mod memory;
/// MongoDB store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{BattleDraft, BattleEntity, BattleStatus, ContentEntity, ContentStatus},
    storage::{Abort, StorageResult, TxResult},
};

pub use memory::MemoryBattleStore;

/// Mutation applied to the current battle document inside an atomic
/// read-modify-write. It may run more than once when a write conflicts, so it
/// must only depend on the document it receives.
pub type BattleMutation = Arc<dyn Fn(&mut BattleEntity) -> Result<(), Abort> + Send + Sync>;

/// Abstraction over the persistence layer for contents and battles.
pub trait BattleStore: Send + Sync {
    /// Persist a new content.
    fn insert_content(&self, content: ContentEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load one content.
    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>>;
    /// Contents matching `query`.
    fn query_contents(
        &self,
        query: ContentQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<ContentEntity>>>;
    /// Number of contents with `status`.
    fn count_contents(&self, status: ContentStatus) -> BoxFuture<'static, StorageResult<u64>>;
    /// Soft-delete a content on behalf of `owner_id` if it is still deletable.
    fn delete_content(
        &self,
        id: Uuid,
        owner_id: String,
        at: SystemTime,
    ) -> BoxFuture<'static, TxResult<ContentEntity>>;
    /// Atomically re-read both contents of `draft`, create the battle and claim
    /// the contents. Aborts with [`Abort::ContentUnavailable`] when either content
    /// is missing or no longer available.
    fn commit_pair(&self, draft: BattleDraft) -> BoxFuture<'static, TxResult<BattleEntity>>;
    /// Load one battle.
    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>>;
    /// Battles matching `query`.
    fn query_battles(
        &self,
        query: BattleQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>>;
    /// Number of battles with `status`.
    fn count_battles(&self, status: BattleStatus) -> BoxFuture<'static, StorageResult<u64>>;
    /// Apply `mutation` to the stored battle atomically and return the written
    /// document. Nothing is written when the mutation aborts.
    fn modify_battle(
        &self,
        id: Uuid,
        mutation: BattleMutation,
    ) -> BoxFuture<'static, TxResult<BattleEntity>>;
    /// Count a view on the battle. Returns whether the counters changed.
    fn record_view(
        &self,
        id: Uuid,
        viewer: Option<String>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Ping the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Sort order for content listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentOrder {
    /// Most recent first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// Filter, order and limit applied to content reads.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    /// Only entries with this status.
    pub status: Option<ContentStatus>,
    /// Only entries in this category.
    pub category: Option<String>,
    /// Only entries from this creator.
    pub creator_id: Option<String>,
    /// Sort order.
    pub order: ContentOrder,
    /// Maximum number of entries returned.
    pub limit: Option<usize>,
}

impl ContentQuery {
    /// Contents still waiting for a battle.
    pub fn available() -> Self {
        Self {
            status: Some(ContentStatus::Available),
            ..Self::default()
        }
    }

    /// Whether `content` passes the filter part of the query.
    pub fn matches(&self, content: &ContentEntity) -> bool {
        self.status.is_none_or(|status| content.status == status)
            && self
                .category
                .as_deref()
                .is_none_or(|category| content.category == category)
            && self
                .creator_id
                .as_deref()
                .is_none_or(|creator| content.creator_id == creator)
    }

    /// Filter, sort and truncate an in-memory collection.
    pub fn apply<'a>(&self, contents: impl Iterator<Item = &'a ContentEntity>) -> Vec<ContentEntity> {
        let mut selected: Vec<ContentEntity> =
            contents.filter(|content| self.matches(content)).cloned().collect();
        match self.order {
            ContentOrder::NewestFirst => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ContentOrder::OldestFirst => selected.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Sort order for battle listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BattleOrder {
    /// Most recent first.
    #[default]
    NewestFirst,
    /// Total votes descending, then view count descending.
    MostVoted,
}

/// Filter, order and limit applied to battle reads.
#[derive(Debug, Clone, Default)]
pub struct BattleQuery {
    /// Only entries with this status.
    pub status: Option<BattleStatus>,
    /// Only entries in this category.
    pub category: Option<String>,
    /// Only entries from this creator.
    pub creator_id: Option<String>,
    /// Battle left out of the result.
    pub exclude: Option<Uuid>,
    /// Case-insensitive substring matched against the battle and side titles.
    pub search: Option<String>,
    /// Sort order.
    pub order: BattleOrder,
    /// Maximum number of entries returned.
    pub limit: Option<usize>,
}

impl BattleQuery {
    /// Whether `battle` passes the filter part of the query.
    pub fn matches(&self, battle: &BattleEntity) -> bool {
        self.status.is_none_or(|status| battle.status == status)
            && self
                .category
                .as_deref()
                .is_none_or(|category| battle.category == category)
            && self
                .creator_id
                .as_deref()
                .is_none_or(|creator| battle.creator_id == creator)
            && self.exclude.is_none_or(|id| battle.id != id)
            && self.search.as_deref().is_none_or(|term| {
                let term = term.to_lowercase();
                [&battle.title, &battle.item_a.title, &battle.item_b.title]
                    .iter()
                    .any(|title| title.to_lowercase().contains(&term))
            })
    }

    /// Filter, sort and truncate an in-memory collection.
    pub fn apply<'a>(&self, battles: impl Iterator<Item = &'a BattleEntity>) -> Vec<BattleEntity> {
        let mut selected: Vec<BattleEntity> =
            battles.filter(|battle| self.matches(battle)).cloned().collect();
        match self.order {
            BattleOrder::NewestFirst => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            BattleOrder::MostVoted => selected.sort_by(|a, b| {
                b.total_votes
                    .cmp(&a.total_votes)
                    .then(b.view_count.cmp(&a.view_count))
            }),
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Check that `owner_id` may delete `content` right now.
pub fn check_deletable(content: &ContentEntity, owner_id: &str) -> Result<(), Abort> {
    if content.status == ContentStatus::Deleted {
        return Err(Abort::ContentNotFound(content.id));
    }
    if content.creator_id != owner_id {
        return Err(Abort::NotOwner(content.id));
    }
    if content.status == ContentStatus::InBattle {
        return Err(Abort::ContentInBattle(content.id));
    }
    Ok(())
}

/// Check that a content read inside a pair commit can still be claimed.
pub fn check_claimable(content: Option<&ContentEntity>, id: Uuid) -> Result<&ContentEntity, Abort> {
    match content {
        Some(content) if content.is_available() => Ok(content),
        _ => Err(Abort::ContentUnavailable(id)),
    }
}
