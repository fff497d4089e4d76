use std::time::SystemTime;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GamePostEntity, PartyEntity, PostStatus},
    party_directory::PartyDirectory,
    post_store::{GamePostStore, PostMutation, UpdateGuard},
    storage::StorageResult,
};

/// In-memory game-post store backed by a concurrent map.
///
/// `conditional_update` evaluates the guard and applies the mutation
/// while holding the entry's exclusive lock, which gives the same
/// atomic check-then-mutate step the MongoDB backend gets from a
/// filtered `update_one`.
#[derive(Default)]
pub struct MemoryPostStore {
    posts: DashMap<Uuid, GamePostEntity>,
}

impl MemoryPostStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn conditional_update_sync(&self, id: Uuid, guard: &UpdateGuard, mutation: &PostMutation) -> bool {
        let Some(mut entry) = self.posts.get_mut(&id) else {
            return false;
        };
        if !guard.admits(&entry) {
            return false;
        }
        mutation.apply_to(&mut entry);
        true
    }

    fn expire_stale_sync(&self, party_id: Option<Uuid>, now: SystemTime) -> u64 {
        let mut expired = 0;
        for mut entry in self.posts.iter_mut() {
            if let Some(party_id) = party_id
                && entry.party_id != Some(party_id)
            {
                continue;
            }
            if entry.status == PostStatus::Open && entry.is_past_deadline(now) {
                entry.status = PostStatus::Expired;
                expired += 1;
            }
        }
        expired
    }
}

impl GamePostStore for MemoryPostStore {
    fn insert_post(&self, post: GamePostEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.posts.insert(post.id, post);
        Box::pin(async { Ok(()) })
    }

    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>> {
        let found = self.posts.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn find_active_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>> {
        let found = self
            .posts
            .iter()
            .find(|entry| entry.creator_id == creator_id && entry.status.is_active())
            .map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn conditional_update(
        &self,
        id: Uuid,
        guard: UpdateGuard,
        mutation: PostMutation,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let applied = self.conditional_update_sync(id, &guard, &mutation);
        Box::pin(async move { Ok(applied) })
    }

    fn list_posts(
        &self,
        party_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<GamePostEntity>>> {
        let mut posts: Vec<GamePostEntity> = self
            .posts
            .iter()
            .filter(|entry| party_id.is_none() || entry.party_id == party_id)
            .map(|entry| entry.value().clone())
            .collect();
        // Map iteration order is arbitrary; present oldest first.
        posts.sort_by_key(|post| post.created_at);
        Box::pin(async move { Ok(posts) })
    }

    fn expire_stale(
        &self,
        party_id: Option<Uuid>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let expired = self.expire_stale_sync(party_id, now);
        Box::pin(async move { Ok(expired) })
    }

    fn delete_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.posts.remove(&id).is_some();
        Box::pin(async move { Ok(removed) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// In-memory party directory, seeded directly by tests and dev setups.
#[derive(Default)]
pub struct MemoryPartyDirectory {
    parties: DashMap<Uuid, PartyEntity>,
}

impl MemoryPartyDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a party record.
    pub fn insert(&self, party: PartyEntity) {
        self.parties.insert(party.id, party);
    }
}

impl PartyDirectory for MemoryPartyDirectory {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let found = self.parties.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn find_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let found: Vec<PartyEntity> = self
            .parties
            .iter()
            .filter(|entry| entry.creator_id == creator_id)
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(found) })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::dao::models::{GameFormat, GameType};

    fn open_post(now: SystemTime, max_players: u32) -> GamePostEntity {
        let creator = Uuid::new_v4();
        GamePostEntity {
            id: Uuid::new_v4(),
            party_id: None,
            party_name: "Solo Queue".into(),
            creator_id: creator,
            creator_name: "alice".into(),
            format: GameFormat::OneVsOne,
            game_type: GameType::Deathmatch,
            status: PostStatus::Open,
            created_at: now,
            expires_at: now + Duration::from_secs(30 * 60),
            players: vec![creator],
            ready_players: Vec::new(),
            max_players,
            team2_party_id: None,
            match_result: None,
        }
    }

    fn join_attempt(post: &GamePostEntity, actor: Uuid, now: SystemTime) -> (UpdateGuard, PostMutation) {
        (
            UpdateGuard {
                status: Some(PostStatus::Open),
                not_expired_at: Some(now),
                player_absent: Some(actor),
                players_below: Some(post.max_players),
                ..Default::default()
            },
            PostMutation {
                add_player: Some(actor),
                set_status: Some(PostStatus::InProgress),
                ..Default::default()
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_joins_respect_capacity() {
        let now = SystemTime::now();
        let store = Arc::new(MemoryPostStore::new());
        let post = open_post(now, 2);
        let id = post.id;
        store.insert_post(post.clone()).await.unwrap();

        // Sixteen racers for the single free slot.
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let actor = Uuid::new_v4();
            let (guard, mutation) = join_attempt(&post, actor, now);
            handles.push(tokio::spawn(async move {
                store.conditional_update(id, guard, mutation).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let stored = store.find_post(id).await.unwrap().unwrap();
        assert_eq!(stored.players.len(), 2);
        assert_eq!(stored.status, PostStatus::InProgress);
    }

    #[tokio::test]
    async fn guarded_update_refuses_missing_post() {
        let store = MemoryPostStore::new();
        let applied = store
            .conditional_update(Uuid::new_v4(), UpdateGuard::default(), PostMutation::default())
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn ready_twice_is_one_entry() {
        let now = SystemTime::now();
        let store = MemoryPostStore::new();
        let mut post = open_post(now, 2);
        let creator = post.creator_id;
        let joiner = Uuid::new_v4();
        post.players.push(joiner);
        post.status = PostStatus::InProgress;
        let id = post.id;
        store.insert_post(post).await.unwrap();

        let guard = UpdateGuard {
            status: Some(PostStatus::InProgress),
            player_present: Some(creator),
            ..Default::default()
        };
        let mutation = PostMutation {
            add_ready_player: Some(creator),
            promote_on_full_ready: true,
            ..Default::default()
        };
        assert!(store.conditional_update(id, guard.clone(), mutation.clone()).await.unwrap());
        assert!(store.conditional_update(id, guard, mutation).await.unwrap());

        let stored = store.find_post(id).await.unwrap().unwrap();
        assert_eq!(stored.ready_players, vec![creator]);
        assert_eq!(stored.status, PostStatus::InProgress);

        let guard = UpdateGuard {
            status: Some(PostStatus::InProgress),
            player_present: Some(joiner),
            ..Default::default()
        };
        let mutation = PostMutation {
            add_ready_player: Some(joiner),
            promote_on_full_ready: true,
            ..Default::default()
        };
        assert!(store.conditional_update(id, guard, mutation).await.unwrap());
        let stored = store.find_post(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::ReadyToStart);
    }

    #[tokio::test]
    async fn expiry_sweep_only_touches_stale_open_posts() {
        let now = SystemTime::now();
        let store = MemoryPostStore::new();

        let stale = open_post(now - Duration::from_secs(31 * 60), 2);
        let fresh = open_post(now, 2);
        let mut completed = open_post(now - Duration::from_secs(31 * 60), 2);
        completed.status = PostStatus::Completed;

        let (stale_id, fresh_id, completed_id) = (stale.id, fresh.id, completed.id);
        store.insert_post(stale).await.unwrap();
        store.insert_post(fresh).await.unwrap();
        store.insert_post(completed).await.unwrap();

        let expired = store.expire_stale(None, now).await.unwrap();
        assert_eq!(expired, 1);

        let stale = store.find_post(stale_id).await.unwrap().unwrap();
        assert_eq!(stale.status, PostStatus::Expired);
        let fresh = store.find_post(fresh_id).await.unwrap().unwrap();
        assert_eq!(fresh.status, PostStatus::Open);
        let completed = store.find_post(completed_id).await.unwrap().unwrap();
        assert_eq!(completed.status, PostStatus::Completed);
    }

    #[tokio::test]
    async fn party_scoped_sweep_ignores_other_parties() {
        let now = SystemTime::now();
        let store = MemoryPostStore::new();
        let party = Uuid::new_v4();

        let mut in_party = open_post(now - Duration::from_secs(31 * 60), 10);
        in_party.party_id = Some(party);
        let out_of_party = open_post(now - Duration::from_secs(31 * 60), 10);
        let out_id = out_of_party.id;

        store.insert_post(in_party).await.unwrap();
        store.insert_post(out_of_party).await.unwrap();

        assert_eq!(store.expire_stale(Some(party), now).await.unwrap(), 1);
        let untouched = store.find_post(out_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, PostStatus::Open);
    }

    #[tokio::test]
    async fn active_lookup_skips_terminal_posts() {
        let now = SystemTime::now();
        let store = MemoryPostStore::new();
        let mut post = open_post(now, 2);
        let creator = post.creator_id;
        post.status = PostStatus::Expired;
        store.insert_post(post).await.unwrap();

        assert!(store.find_active_by_creator(creator).await.unwrap().is_none());

        let active = open_post(now, 2);
        let creator = active.creator_id;
        store.insert_post(active).await.unwrap();
        assert!(store.find_active_by_creator(creator).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_by_party_and_sorts_by_age() {
        let now = SystemTime::now();
        let store = MemoryPostStore::new();
        let party = Uuid::new_v4();

        let mut older = open_post(now - Duration::from_secs(60), 10);
        older.party_id = Some(party);
        let mut newer = open_post(now, 10);
        newer.party_id = Some(party);
        let solo = open_post(now, 2);

        let (older_id, newer_id) = (older.id, newer.id);
        store.insert_post(newer).await.unwrap();
        store.insert_post(older).await.unwrap();
        store.insert_post(solo).await.unwrap();

        let listed = store.list_posts(Some(party)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, older_id);
        assert_eq!(listed[1].id, newer_id);

        assert_eq!(store.list_posts(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn directory_lookups() {
        let directory = MemoryPartyDirectory::new();
        let owner = Uuid::new_v4();
        let party = PartyEntity {
            id: Uuid::new_v4(),
            name: "night shift".into(),
            creator_id: owner,
            members: vec![owner],
        };
        directory.insert(party.clone());

        assert_eq!(directory.find_by_id(party.id).await.unwrap(), Some(party.clone()));
        assert_eq!(directory.find_by_creator(owner).await.unwrap(), vec![party]);
        assert!(directory.find_by_creator(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
