use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, UpdateModifications},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPartyDocument, MongoPostDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    models::{GamePostEntity, MatchResultEntity, PartyEntity, PostStatus},
    party_directory::PartyDirectory,
    post_store::{GamePostStore, PostMutation, UpdateGuard},
    storage::StorageResult,
};

const POST_COLLECTION_NAME: &str = "game_posts";
const PARTY_COLLECTION_NAME: &str = "parties";

/// Shared MongoDB connection used by both the post store and the party
/// directory views.
#[derive(Clone)]
pub struct MongoBackend {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Held to keep the connection pool alive for the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoBackend {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let backend = Self { inner };
        backend.ensure_indexes().await?;
        Ok(backend)
    }

    /// Post store view over this connection.
    pub fn post_store(&self) -> MongoPostStore {
        MongoPostStore {
            backend: self.clone(),
        }
    }

    /// Party directory view over this connection.
    pub fn party_directory(&self) -> MongoPartyDirectory {
        MongoPartyDirectory {
            backend: self.clone(),
        }
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let collection = database.collection::<Document>(POST_COLLECTION_NAME);

        // Serves the active-post uniqueness lookup at creation.
        let creator_index = IndexModel::builder()
            .keys(doc! {"creator_id": 1, "status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("post_creator_status_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(creator_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: POST_COLLECTION_NAME,
                index: "creator_id,status",
                source,
            })?;

        // Serves party-scoped listings and the scoped expiry sweep.
        let party_index = IndexModel::builder()
            .keys(doc! {"party_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("post_party_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(party_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: POST_COLLECTION_NAME,
                index: "party_id",
                source,
            })?;

        // Serves the stale-open sweep.
        let expiry_index = IndexModel::builder()
            .keys(doc! {"status": 1, "expires_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("post_status_expiry_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(expiry_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: POST_COLLECTION_NAME,
                index: "status,expires_at",
                source,
            })?;

        Ok(())
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = self.database().await;
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let config = &self.inner.config;
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        let mut guard = self.inner.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn post_collection(&self) -> Collection<MongoPostDocument> {
        self.database()
            .await
            .collection::<MongoPostDocument>(POST_COLLECTION_NAME)
    }

    async fn party_collection(&self) -> Collection<MongoPartyDocument> {
        self.database()
            .await
            .collection::<MongoPartyDocument>(PARTY_COLLECTION_NAME)
    }
}

/// Compile an [`UpdateGuard`] into the query filter evaluated atomically
/// by `update_one`.
fn guard_filter(id: Uuid, guard: &UpdateGuard) -> Document {
    let mut filter = doc_id(id);
    if let Some(status) = guard.status {
        filter.insert("status", status.as_str());
    }
    if let Some(at) = guard.not_expired_at {
        filter.insert("expires_at", doc! {"$gte": DateTime::from_system_time(at)});
    }
    if let Some(actor) = guard.player_present {
        filter.insert("players", uuid_as_binary(actor));
    }
    if let Some(actor) = guard.player_absent {
        filter.insert("players", doc! {"$ne": uuid_as_binary(actor)});
    }
    if let Some(bound) = guard.players_below {
        // `players.N` exists iff the array holds more than N entries, so
        // requiring index `bound - 1` to be absent caps the roster below
        // `bound` inside the same atomic match.
        filter.insert(
            format!("players.{}", bound - 1),
            doc! {"$exists": false},
        );
    }
    filter
}

fn result_doc(result: &MatchResultEntity) -> Document {
    doc! {
        "winner_id": uuid_as_binary(result.winner_id),
        "winner_name": result.winner_name.as_str(),
        "loser_id": uuid_as_binary(result.loser_id),
        "loser_name": result.loser_name.as_str(),
        "score": result.score.as_str(),
        "reported_by": uuid_as_binary(result.reported_by),
        "reported_at": DateTime::from_system_time(result.reported_at),
    }
}

/// Compile a [`PostMutation`] into an update document, or into an
/// aggregation pipeline when the quorum promotion must see the
/// post-union sets within the same atomic step.
fn mutation_update(mutation: &PostMutation) -> UpdateModifications {
    if mutation.promote_on_full_ready {
        let mut stages = Vec::new();
        if let Some(actor) = mutation.add_player {
            stages.push(doc! {"$set": {"players":
                {"$setUnion": ["$players", [uuid_as_binary(actor)]]}}});
        }
        if let Some(actor) = mutation.add_ready_player {
            stages.push(doc! {"$set": {"ready_players":
                {"$setUnion": ["$ready_players", [uuid_as_binary(actor)]]}}});
        }
        if let Some(party_id) = mutation.set_team2_party {
            stages.push(doc! {"$set": {"team2_party_id": uuid_as_binary(party_id)}});
        }
        if let Some(result) = &mutation.set_result {
            stages.push(doc! {"$set": {"match_result": result_doc(result)}});
        }
        if let Some(status) = mutation.set_status {
            stages.push(doc! {"$set": {"status": status.as_str()}});
        }
        stages.push(doc! {"$set": {"status": {"$cond": {
            "if": {"$eq": [{"$size": "$ready_players"}, {"$size": "$players"}]},
            "then": PostStatus::ReadyToStart.as_str(),
            "else": "$status",
        }}}});
        return UpdateModifications::Pipeline(stages);
    }

    let mut add_to_set = Document::new();
    let mut set = Document::new();
    if let Some(actor) = mutation.add_player {
        add_to_set.insert("players", uuid_as_binary(actor));
    }
    if let Some(actor) = mutation.add_ready_player {
        add_to_set.insert("ready_players", uuid_as_binary(actor));
    }
    if let Some(party_id) = mutation.set_team2_party {
        set.insert("team2_party_id", uuid_as_binary(party_id));
    }
    if let Some(result) = &mutation.set_result {
        set.insert("match_result", result_doc(result));
    }
    if let Some(status) = mutation.set_status {
        set.insert("status", status.as_str());
    }

    let mut update = Document::new();
    if !add_to_set.is_empty() {
        update.insert("$addToSet", add_to_set);
    }
    if !set.is_empty() {
        update.insert("$set", set);
    }
    UpdateModifications::Document(update)
}

/// MongoDB-backed game-post store.
#[derive(Clone)]
pub struct MongoPostStore {
    backend: MongoBackend,
}

impl MongoPostStore {
    async fn insert_post(&self, post: GamePostEntity) -> MongoResult<()> {
        let id = post.id;
        let document: MongoPostDocument = post.into();
        self.backend
            .post_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertPost { id, source })?;
        Ok(())
    }

    async fn find_post(&self, id: Uuid) -> MongoResult<Option<GamePostEntity>> {
        let document = self
            .backend
            .post_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPost { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_active_by_creator(
        &self,
        creator_id: Uuid,
    ) -> MongoResult<Option<GamePostEntity>> {
        let filter = doc! {
            "creator_id": uuid_as_binary(creator_id),
            "status": {"$in": [PostStatus::Open.as_str(), PostStatus::InProgress.as_str()]},
        };
        let document = self
            .backend
            .post_collection()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::LoadPost {
                id: creator_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        guard: UpdateGuard,
        mutation: PostMutation,
    ) -> MongoResult<bool> {
        let outcome = self
            .backend
            .post_collection()
            .await
            .update_one(guard_filter(id, &guard), mutation_update(&mutation))
            .await
            .map_err(|source| MongoDaoError::UpdatePost { id, source })?;
        // A matched-but-unmodified update means the mutation was already
        // in place (idempotent union); the guard still held.
        Ok(outcome.matched_count > 0)
    }

    async fn list_posts(&self, party_id: Option<Uuid>) -> MongoResult<Vec<GamePostEntity>> {
        let filter = match party_id {
            Some(party_id) => doc! {"party_id": uuid_as_binary(party_id)},
            None => doc! {},
        };
        let documents: Vec<MongoPostDocument> = self
            .backend
            .post_collection()
            .await
            .find(filter)
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListPosts { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPosts { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn expire_stale(&self, party_id: Option<Uuid>, now: SystemTime) -> MongoResult<u64> {
        let mut filter = doc! {
            "status": PostStatus::Open.as_str(),
            "expires_at": {"$lt": DateTime::from_system_time(now)},
        };
        if let Some(party_id) = party_id {
            filter.insert("party_id", uuid_as_binary(party_id));
        }
        let outcome = self
            .backend
            .post_collection()
            .await
            .update_many(filter, doc! {"$set": {"status": PostStatus::Expired.as_str()}})
            .await
            .map_err(|source| MongoDaoError::ExpirePosts { source })?;
        Ok(outcome.modified_count)
    }

    async fn delete_post(&self, id: Uuid) -> MongoResult<bool> {
        let outcome = self
            .backend
            .post_collection()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeletePost { id, source })?;
        Ok(outcome.deleted_count > 0)
    }
}

impl GamePostStore for MongoPostStore {
    fn insert_post(&self, post: GamePostEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_post(post).await.map_err(Into::into) })
    }

    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_post(id).await.map_err(Into::into) })
    }

    fn find_active_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_active_by_creator(creator_id)
                .await
                .map_err(Into::into)
        })
    }

    fn conditional_update(
        &self,
        id: Uuid,
        guard: UpdateGuard,
        mutation: PostMutation,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .conditional_update(id, guard, mutation)
                .await
                .map_err(Into::into)
        })
    }

    fn list_posts(
        &self,
        party_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<GamePostEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_posts(party_id).await.map_err(Into::into) })
    }

    fn expire_stale(
        &self,
        party_id: Option<Uuid>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.expire_stale(party_id, now).await.map_err(Into::into) })
    }

    fn delete_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_post(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.backend.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.backend.reconnect().await.map_err(Into::into) })
    }
}

/// MongoDB-backed party directory view.
#[derive(Clone)]
pub struct MongoPartyDirectory {
    backend: MongoBackend,
}

impl MongoPartyDirectory {
    async fn find_by_id(&self, id: Uuid) -> MongoResult<Option<PartyEntity>> {
        let document = self
            .backend
            .party_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadParty { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_by_creator(&self, creator_id: Uuid) -> MongoResult<Vec<PartyEntity>> {
        let documents: Vec<MongoPartyDocument> = self
            .backend
            .party_collection()
            .await
            .find(doc! {"creator_id": uuid_as_binary(creator_id)})
            .await
            .map_err(|source| MongoDaoError::ListParties { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListParties { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl PartyDirectory for MongoPartyDirectory {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let directory = self.clone();
        Box::pin(async move { directory.find_by_id(id).await.map_err(Into::into) })
    }

    fn find_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let directory = self.clone();
        Box::pin(async move { directory.find_by_creator(creator_id).await.map_err(Into::into) })
    }
}
