use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GamePostEntity, MatchResultEntity, PostStatus},
    storage::StorageResult,
};

/// Predicate a post must satisfy for a conditional update to apply.
///
/// Every field is a conjunct; the backend evaluates the whole guard and
/// applies the paired [`PostMutation`] in a single atomic step. No other
/// writer may interleave between the check and the mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateGuard {
    /// Post must currently be in this status.
    pub status: Option<PostStatus>,
    /// Post deadline must not have passed at this instant.
    pub not_expired_at: Option<SystemTime>,
    /// Actor must already hold a roster slot.
    pub player_present: Option<Uuid>,
    /// Actor must not hold a roster slot yet.
    pub player_absent: Option<Uuid>,
    /// Roster must hold strictly fewer players than this bound.
    pub players_below: Option<u32>,
}

impl UpdateGuard {
    /// Evaluate the guard against a snapshot.
    ///
    /// Backends that can hold an exclusive handle on the record (the
    /// in-memory store) call this directly; the MongoDB backend compiles
    /// the same conjuncts into a query filter instead.
    pub fn admits(&self, post: &GamePostEntity) -> bool {
        if let Some(status) = self.status
            && post.status != status
        {
            return false;
        }
        if let Some(now) = self.not_expired_at
            && post.is_past_deadline(now)
        {
            return false;
        }
        if let Some(actor) = self.player_present
            && !post.has_player(actor)
        {
            return false;
        }
        if let Some(actor) = self.player_absent
            && post.has_player(actor)
        {
            return false;
        }
        if let Some(bound) = self.players_below
            && post.players.len() as u32 >= bound
        {
            return false;
        }
        true
    }
}

/// Mutation applied to a post once its [`UpdateGuard`] holds.
///
/// Player additions are set unions, so re-applying the same mutation is
/// idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMutation {
    /// Add the actor to the roster (union).
    pub add_player: Option<Uuid>,
    /// Add the actor to the ready set (union).
    pub add_ready_player: Option<Uuid>,
    /// Bind the second team's party.
    pub set_team2_party: Option<Uuid>,
    /// Record the terminal outcome.
    pub set_result: Option<MatchResultEntity>,
    /// Move the post to this status.
    pub set_status: Option<PostStatus>,
    /// After the unions, promote to `ReadyToStart` when every player is
    /// ready. Evaluated inside the same atomic step, so a concurrent
    /// join can never race a stale ready count past the quorum check.
    pub promote_on_full_ready: bool,
}

impl PostMutation {
    /// Apply the mutation in place. Union adds first, then status
    /// changes, then the quorum promotion.
    pub fn apply_to(&self, post: &mut GamePostEntity) {
        if let Some(actor) = self.add_player
            && !post.players.contains(&actor)
        {
            post.players.push(actor);
        }
        if let Some(actor) = self.add_ready_player
            && !post.ready_players.contains(&actor)
        {
            post.ready_players.push(actor);
        }
        if let Some(party_id) = self.set_team2_party {
            post.team2_party_id = Some(party_id);
        }
        if let Some(result) = &self.set_result {
            post.match_result = Some(result.clone());
        }
        if let Some(status) = self.set_status {
            post.status = status;
        }
        if self.promote_on_full_ready && post.ready_players.len() == post.players.len() {
            post.status = PostStatus::ReadyToStart;
        }
    }
}

/// Abstraction over the persistence layer for game posts.
///
/// One record per post; `conditional_update` is the only mutation
/// primitive the lifecycle engine needs, and it must be atomic with
/// respect to the guard check.
pub trait GamePostStore: Send + Sync {
    /// Persist a freshly created post.
    fn insert_post(&self, post: GamePostEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Point lookup by id.
    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>>;
    /// Any post by this creator still counting against the active quota.
    fn find_active_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GamePostEntity>>>;
    /// Atomically apply `mutation` iff `guard` holds; returns whether it
    /// applied.
    fn conditional_update(
        &self,
        id: Uuid,
        guard: UpdateGuard,
        mutation: PostMutation,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// All posts, optionally scoped to a posting party.
    fn list_posts(
        &self,
        party_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<GamePostEntity>>>;
    /// Bulk conditional update flipping stale open posts to expired.
    /// Returns the number of posts expired.
    fn expire_stale(
        &self,
        party_id: Option<Uuid>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Hard delete. Returns whether a record was removed.
    fn delete_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Backend liveness probe used by the supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::models::{GameFormat, GameType};

    fn post(now: SystemTime) -> GamePostEntity {
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
            max_players: 2,
            team2_party_id: None,
            match_result: None,
        }
    }

    #[test]
    fn guard_conjuncts_all_checked() {
        let now = SystemTime::now();
        let post = post(now);
        let creator = post.players[0];
        let stranger = Uuid::new_v4();

        let guard = UpdateGuard {
            status: Some(PostStatus::Open),
            not_expired_at: Some(now),
            player_absent: Some(stranger),
            players_below: Some(2),
            ..Default::default()
        };
        assert!(guard.admits(&post));

        let wrong_status = UpdateGuard {
            status: Some(PostStatus::InProgress),
            ..guard.clone()
        };
        assert!(!wrong_status.admits(&post));

        let already_in = UpdateGuard {
            player_absent: Some(creator),
            ..guard.clone()
        };
        assert!(!already_in.admits(&post));

        let past_deadline = UpdateGuard {
            not_expired_at: Some(now + Duration::from_secs(31 * 60)),
            ..guard.clone()
        };
        assert!(!past_deadline.admits(&post));

        let full = UpdateGuard {
            players_below: Some(1),
            ..guard
        };
        assert!(!full.admits(&post));
    }

    #[test]
    fn guard_requires_membership_for_ready() {
        let post = post(SystemTime::now());
        let stranger = Uuid::new_v4();
        let guard = UpdateGuard {
            player_present: Some(stranger),
            ..Default::default()
        };
        assert!(!guard.admits(&post));

        let guard = UpdateGuard {
            player_present: Some(post.players[0]),
            ..Default::default()
        };
        assert!(guard.admits(&post));
    }

    #[test]
    fn mutation_unions_are_idempotent() {
        let mut post = post(SystemTime::now());
        let joiner = Uuid::new_v4();
        let mutation = PostMutation {
            add_player: Some(joiner),
            set_status: Some(PostStatus::InProgress),
            ..Default::default()
        };
        mutation.apply_to(&mut post);
        mutation.apply_to(&mut post);
        assert_eq!(post.players.iter().filter(|p| **p == joiner).count(), 1);
        assert_eq!(post.status, PostStatus::InProgress);
    }

    #[test]
    fn quorum_promotion_only_when_everyone_ready() {
        let mut post = post(SystemTime::now());
        let creator = post.players[0];
        let joiner = Uuid::new_v4();
        PostMutation {
            add_player: Some(joiner),
            set_status: Some(PostStatus::InProgress),
            ..Default::default()
        }
        .apply_to(&mut post);

        PostMutation {
            add_ready_player: Some(creator),
            promote_on_full_ready: true,
            ..Default::default()
        }
        .apply_to(&mut post);
        assert_eq!(post.status, PostStatus::InProgress);

        PostMutation {
            add_ready_player: Some(joiner),
            promote_on_full_ready: true,
            ..Default::default()
        }
        .apply_to(&mut post);
        assert_eq!(post.status, PostStatus::ReadyToStart);
        assert!(post.ready_players.len() == post.players.len());
    }

    #[test]
    fn late_join_resets_quorum() {
        // A player added after a partial ready-up raises the bar again;
        // product behavior, not a bug.
        let mut post = post(SystemTime::now());
        let creator = post.players[0];
        PostMutation {
            add_ready_player: Some(creator),
            promote_on_full_ready: true,
            ..Default::default()
        }
        .apply_to(&mut post);
        assert_eq!(post.status, PostStatus::ReadyToStart);

        let late = Uuid::new_v4();
        PostMutation {
            add_player: Some(late),
            ..Default::default()
        }
        .apply_to(&mut post);
        assert!(post.ready_players.len() < post.players.len());
    }
}
