use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{Document, doc},
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoBattleDocument, MongoContentDocument, doc_id, escape_regex, millis, revision_guard},
};
use crate::dao::{
    battle_store::{
        BattleMutation, BattleOrder, BattleQuery, BattleStore, ContentOrder, ContentQuery,
        check_claimable, check_deletable,
    },
    models::{BattleDraft, BattleEntity, BattleStatus, ContentEntity, ContentStatus},
    storage::{Abort, StorageError, StorageResult, TxError, TxResult},
};

const CONTENT_COLLECTION_NAME: &str = "contenders";
const BATTLE_COLLECTION_NAME: &str = "battles";
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const MAX_CAS_ATTEMPTS: u32 = 8;

/// Store backed by a MongoDB replica set.
#[derive(Clone)]
pub struct MongoBattleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

/// Failure of one attempt inside a pair transaction.
enum PairAttempt {
    Aborted(Abort),
    Driver(MongoError),
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoBattleStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document); 5] = [
            (
                CONTENT_COLLECTION_NAME,
                "status_created_idx",
                doc! {"status": 1, "createdAt": 1},
            ),
            (
                CONTENT_COLLECTION_NAME,
                "creator_idx",
                doc! {"creatorId": 1, "createdAt": -1},
            ),
            (
                BATTLE_COLLECTION_NAME,
                "status_votes_idx",
                doc! {"status": 1, "totalVotes": -1, "viewCount": -1},
            ),
            (
                BATTLE_COLLECTION_NAME,
                "category_votes_idx",
                doc! {"category": 1, "totalVotes": -1},
            ),
            (
                BATTLE_COLLECTION_NAME,
                "creator_idx",
                doc! {"creatorId": 1, "createdAt": -1},
            ),
        ];

        for (collection, name, keys) in indexes {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn contents(&self) -> Collection<MongoContentDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoContentDocument>(CONTENT_COLLECTION_NAME)
    }

    async fn battles(&self) -> Collection<MongoBattleDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoBattleDocument>(BATTLE_COLLECTION_NAME)
    }

    async fn insert_content(&self, content: ContentEntity) -> MongoResult<()> {
        let id = content.id;
        self.contents()
            .await
            .insert_one(MongoContentDocument::from(content))
            .await
            .map_err(|source| MongoDaoError::SaveContent { id, source })?;
        Ok(())
    }

    async fn find_content(&self, id: Uuid) -> MongoResult<Option<ContentEntity>> {
        let document = self
            .contents()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadContent { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn query_contents(&self, query: ContentQuery) -> MongoResult<Vec<ContentEntity>> {
        let mut filter = Document::new();
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }
        if let Some(category) = &query.category {
            filter.insert("category", category.as_str());
        }
        if let Some(creator) = &query.creator_id {
            filter.insert("creatorId", creator.as_str());
        }
        let sort = match query.order {
            ContentOrder::NewestFirst => doc! {"createdAt": -1},
            ContentOrder::OldestFirst => doc! {"createdAt": 1},
        };

        let collection = self.contents().await;
        let mut find = collection.find(filter).sort(sort);
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let documents: Vec<MongoContentDocument> = find
            .await
            .map_err(|source| MongoDaoError::QueryContents { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryContents { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn count_contents(&self, status: ContentStatus) -> MongoResult<u64> {
        self.contents()
            .await
            .count_documents(doc! {"status": status.as_str()})
            .await
            .map_err(|source| MongoDaoError::QueryContents { source })
    }

    async fn delete_content(
        &self,
        id: Uuid,
        owner_id: &str,
        at: SystemTime,
    ) -> TxResult<ContentEntity> {
        let collection = self.contents().await;
        let stamp = millis(at);
        let updated = collection
            .find_one_and_update(
                doc! {
                    "_id": id.to_string(),
                    "creatorId": owner_id,
                    "status": ContentStatus::Available.as_str(),
                },
                doc! {"$set": {
                    "status": ContentStatus::Deleted.as_str(),
                    "isActive": false,
                    "deletedAt": stamp,
                    "updatedAt": stamp,
                }},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveContent { id, source })?;

        if let Some(document) = updated {
            return Ok(document.into());
        }

        // The conditional update matched nothing; read the document to report why.
        let Some(current) = self.find_content(id).await? else {
            return Err(Abort::ContentNotFound(id).into());
        };
        check_deletable(&current, owner_id)?;
        Err(StorageError::Contention { id, attempts: 1 }.into())
    }

    async fn commit_pair(&self, draft: BattleDraft) -> TxResult<BattleEntity> {
        if draft.content_a == draft.content_b {
            return Err(Abort::ContentUnavailable(draft.content_b).into());
        }

        let transaction_error = |source| MongoDaoError::PairTransaction {
            id: draft.id,
            source,
        };
        let mut session = self
            .client()
            .await
            .start_session()
            .await
            .map_err(transaction_error)?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            session
                .start_transaction()
                .await
                .map_err(transaction_error)?;

            match self.pair_in_session(&mut session, &draft).await {
                Ok(battle) => match commit_with_retry(&mut session).await {
                    Ok(()) => return Ok(battle),
                    Err(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                        debug!(battle_id = %draft.id, attempt, "transient commit failure; retrying pair");
                    }
                    Err(err) => return Err(transaction_error(err).into()),
                },
                Err(PairAttempt::Aborted(abort)) => {
                    if let Err(err) = session.abort_transaction().await {
                        warn!(battle_id = %draft.id, error = %err, "failed to abort pair transaction");
                    }
                    return Err(abort.into());
                }
                Err(PairAttempt::Driver(err)) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        warn!(battle_id = %draft.id, error = %abort_err, "failed to abort pair transaction");
                    }
                    if !err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
                        return Err(transaction_error(err).into());
                    }
                    debug!(battle_id = %draft.id, attempt, "transient pair failure; retrying");
                }
            }
        }

        Err(StorageError::Contention {
            id: draft.id,
            attempts: MAX_TRANSACTION_ATTEMPTS,
        }
        .into())
    }

    async fn pair_in_session(
        &self,
        session: &mut ClientSession,
        draft: &BattleDraft,
    ) -> Result<BattleEntity, PairAttempt> {
        let contents = self.contents().await;
        let battles = self.battles().await;

        let a: Option<ContentEntity> = contents
            .find_one(doc_id(draft.content_a))
            .session(&mut *session)
            .await
            .map_err(PairAttempt::Driver)?
            .map(Into::into);
        let b: Option<ContentEntity> = contents
            .find_one(doc_id(draft.content_b))
            .session(&mut *session)
            .await
            .map_err(PairAttempt::Driver)?
            .map(Into::into);

        let a = check_claimable(a.as_ref(), draft.content_a).map_err(PairAttempt::Aborted)?;
        let b = check_claimable(b.as_ref(), draft.content_b).map_err(PairAttempt::Aborted)?;
        let battle = BattleEntity::open(a, b, draft);

        battles
            .insert_one(MongoBattleDocument::from(battle.clone()))
            .session(&mut *session)
            .await
            .map_err(PairAttempt::Driver)?;

        for id in [a.id, b.id] {
            contents
                .update_one(
                    doc! {"_id": id.to_string(), "status": ContentStatus::Available.as_str()},
                    doc! {
                        "$set": {
                            "status": ContentStatus::InBattle.as_str(),
                            "lastBattleId": battle.id.to_string(),
                            "updatedAt": millis(draft.created_at),
                        },
                        "$inc": {"battleCount": 1_i64},
                    },
                )
                .session(&mut *session)
                .await
                .map_err(PairAttempt::Driver)?;
        }

        Ok(battle)
    }

    async fn find_battle(&self, id: Uuid) -> MongoResult<Option<BattleEntity>> {
        let document = self
            .battles()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadBattle { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn query_battles(&self, query: BattleQuery) -> MongoResult<Vec<BattleEntity>> {
        let mut filter = Document::new();
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }
        if let Some(category) = &query.category {
            filter.insert("category", category.as_str());
        }
        if let Some(creator) = &query.creator_id {
            filter.insert("creatorId", creator.as_str());
        }
        if let Some(excluded) = query.exclude {
            filter.insert("_id", doc! {"$ne": excluded.to_string()});
        }
        if let Some(term) = &query.search {
            let pattern = escape_regex(term);
            filter.insert(
                "$or",
                ["title", "itemA.title", "itemB.title"]
                    .into_iter()
                    .map(|field| {
                        let mut clause = Document::new();
                        clause.insert(field, doc! {"$regex": pattern.as_str(), "$options": "i"});
                        clause
                    })
                    .collect::<Vec<_>>(),
            );
        }
        let sort = match query.order {
            BattleOrder::NewestFirst => doc! {"createdAt": -1},
            BattleOrder::MostVoted => doc! {"totalVotes": -1, "viewCount": -1},
        };

        let collection = self.battles().await;
        let mut find = collection.find(filter).sort(sort);
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let documents: Vec<MongoBattleDocument> = find
            .await
            .map_err(|source| MongoDaoError::QueryBattles { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryBattles { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn count_battles(&self, status: BattleStatus) -> MongoResult<u64> {
        self.battles()
            .await
            .count_documents(doc! {"status": status.as_str()})
            .await
            .map_err(|source| MongoDaoError::QueryBattles { source })
    }

    /// Compare-and-swap on `revision`: read, mutate, replace only if nobody
    /// wrote in between, otherwise start over from a fresh read.
    async fn modify_battle(&self, id: Uuid, mutation: BattleMutation) -> TxResult<BattleEntity> {
        let collection = self.battles().await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(current) = self.find_battle(id).await? else {
                return Err(Abort::BattleNotFound(id).into());
            };

            let expected = current.revision;
            let mut next = current;
            mutation(&mut next)?;
            next.revision = expected + 1;

            let result = collection
                .replace_one(
                    revision_guard(id, expected),
                    MongoBattleDocument::from(next.clone()),
                )
                .await
                .map_err(|source| MongoDaoError::SaveBattle { id, source })?;

            if result.matched_count == 1 {
                return Ok(next);
            }
            debug!(battle_id = %id, attempt, "battle revision changed; retrying");
        }

        Err(TxError::Storage(StorageError::Contention {
            id,
            attempts: MAX_CAS_ATTEMPTS,
        }))
    }

    async fn record_view(
        &self,
        id: Uuid,
        viewer: Option<String>,
        at: SystemTime,
    ) -> MongoResult<bool> {
        let stamp = millis(at);
        let mut filter = doc_id(id);
        let mut update = doc! {
            "$inc": {"viewCount": 1_i64, "revision": 1_i64},
            "$set": {"lastViewAt": stamp, "updatedAt": stamp},
        };
        if let Some(viewer) = viewer {
            filter.insert("uniqueViewers", doc! {"$ne": viewer.as_str()});
            update.insert("$addToSet", doc! {"uniqueViewers": viewer});
        }

        let result = self
            .battles()
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::SaveBattle { id, source })?;
        Ok(result.modified_count > 0)
    }
}

async fn commit_with_retry(session: &mut ClientSession) -> Result<(), MongoError> {
    loop {
        match session.commit_transaction().await {
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => continue,
            outcome => return outcome,
        }
    }
}

impl BattleStore for MongoBattleStore {
    fn insert_content(&self, content: ContentEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_content(content).await.map_err(Into::into) })
    }

    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_content(id).await.map_err(Into::into) })
    }

    fn query_contents(
        &self,
        query: ContentQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<ContentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.query_contents(query).await.map_err(Into::into) })
    }

    fn count_contents(&self, status: ContentStatus) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_contents(status).await.map_err(Into::into) })
    }

    fn delete_content(
        &self,
        id: Uuid,
        owner_id: String,
        at: SystemTime,
    ) -> BoxFuture<'static, TxResult<ContentEntity>> {
        let store = self.clone();
        Box::pin(async move { store.delete_content(id, &owner_id, at).await })
    }

    fn commit_pair(&self, draft: BattleDraft) -> BoxFuture<'static, TxResult<BattleEntity>> {
        let store = self.clone();
        Box::pin(async move { store.commit_pair(draft).await })
    }

    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_battle(id).await.map_err(Into::into) })
    }

    fn query_battles(
        &self,
        query: BattleQuery,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.query_battles(query).await.map_err(Into::into) })
    }

    fn count_battles(&self, status: BattleStatus) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_battles(status).await.map_err(Into::into) })
    }

    fn modify_battle(
        &self,
        id: Uuid,
        mutation: BattleMutation,
    ) -> BoxFuture<'static, TxResult<BattleEntity>> {
        let store = self.clone();
        Box::pin(async move { store.modify_battle(id, mutation).await })
    }

    fn record_view(
        &self,
        id: Uuid,
        viewer: Option<String>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.record_view(id, viewer, at).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
