//! Pure decision logic for the game-post lifecycle.
//!
//! Every mutating operation is planned here against a post snapshot and
//! executed elsewhere as a single conditional update. The engine never
//! touches storage: callers resolve the collaborators (party lookups,
//! the active-post check) and hand in plain data plus `now`.

use std::time::{Duration, SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::dao::{
    models::{
        GameFormat, GamePostEntity, GameType, MatchResultEntity, PartyEntity, PostStatus,
    },
    post_store::{PostMutation, UpdateGuard},
};

/// Party name recorded on solo-queue posts.
pub const SOLO_QUEUE_PARTY_NAME: &str = "Solo Queue";

/// A validated transition: the predicate the stored post must still
/// satisfy, and the mutation to apply if it does. The pair goes to the
/// store as one atomic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Re-checked atomically by the store at apply time.
    pub guard: UpdateGuard,
    /// Applied iff the guard holds.
    pub mutation: PostMutation,
}

/// Outcome fields supplied by the reporting actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// Winning player or captain.
    pub winner_id: Uuid,
    /// Winner display name.
    pub winner_name: String,
    /// Losing player or captain.
    pub loser_id: Uuid,
    /// Loser display name.
    pub loser_name: String,
    /// Free-form score line.
    pub score: String,
}

/// A guard violation. Each variant is a distinct, stable condition; the
/// service layer maps them onto the boundary error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Format and game type do not go together (deathmatch is 1v1-only,
    /// and 1v1 plays nothing else).
    #[error("{game_type} is not playable in {format}")]
    IncompatibleGameType {
        /// Requested format.
        format: GameFormat,
        /// Requested game type.
        game_type: GameType,
    },
    /// Team formats need a posting party.
    #[error("a party is required for team format games")]
    PartyRequired,
    /// Only the party owner may post team games for it.
    #[error("only the party owner can post team format games")]
    NotPartyOwner,
    /// The posting party cannot field the format.
    #[error("party has {size} members but {format} needs at least {required}")]
    PartyTooSmall {
        /// Requested format.
        format: GameFormat,
        /// Actual member count.
        size: u32,
        /// Format minimum.
        required: u32,
    },
    /// One active post per creator.
    #[error("creator already has an active game post")]
    DuplicateActivePost,
    /// The actor already holds a roster slot.
    #[error("already in this game")]
    AlreadyJoined,
    /// The roster is at capacity.
    #[error("game is full")]
    GameFull,
    /// The transition is not legal from the post's current status.
    #[error("game is {actual}, expected {expected}")]
    WrongStatus {
        /// Status in the snapshot.
        actual: PostStatus,
        /// Status the transition needs.
        expected: PostStatus,
    },
    /// The post's deadline has passed.
    #[error("game post has expired")]
    DeadlinePassed,
    /// Joining a team game needs an owned, large-enough party distinct
    /// from the poster's.
    #[error("joining needs an owned party of at least {required} members")]
    NoEligibleParty {
        /// Format minimum.
        required: u32,
    },
    /// The actor holds no roster slot.
    #[error("not a participant in this game")]
    NotAParticipant,
    /// Team results may only come from one of the two captains.
    #[error("only the two captains can report team game results")]
    NotACaptain,
    /// Solo results must involve the reporter.
    #[error("reported result must involve the reporter")]
    ResultNotSelf,
    /// Only the author can delete a post.
    #[error("only the post creator can delete it")]
    NotPostCreator,
}

/// Check the joint format / game-type constraint.
pub fn validate_format(format: GameFormat, game_type: GameType) -> Result<(), LifecycleError> {
    let legal = match format {
        GameFormat::OneVsOne => game_type == GameType::Deathmatch,
        GameFormat::FiveVsFive | GameFormat::FourVsFour => game_type != GameType::Deathmatch,
    };
    if legal {
        Ok(())
    } else {
        Err(LifecycleError::IncompatibleGameType { format, game_type })
    }
}

/// Validate a creation request and build the new post.
///
/// `party` is the resolved posting party (ignored for 1v1, required for
/// team formats); `has_active_post` is the caller's answer to the
/// active-post uniqueness lookup.
#[allow(clippy::too_many_arguments)]
pub fn plan_create(
    format: GameFormat,
    game_type: GameType,
    creator_id: Uuid,
    creator_name: &str,
    party: Option<&PartyEntity>,
    has_active_post: bool,
    now: SystemTime,
    ttl: Duration,
) -> Result<GamePostEntity, LifecycleError> {
    let (party_id, party_name) = match format.required_party_size() {
        None => (None, SOLO_QUEUE_PARTY_NAME.to_owned()),
        Some(required) => {
            let party = party.ok_or(LifecycleError::PartyRequired)?;
            if party.creator_id != creator_id {
                return Err(LifecycleError::NotPartyOwner);
            }
            if party.size() < required {
                return Err(LifecycleError::PartyTooSmall {
                    format,
                    size: party.size(),
                    required,
                });
            }
            (Some(party.id), party.name.clone())
        }
    };

    if has_active_post {
        return Err(LifecycleError::DuplicateActivePost);
    }

    validate_format(format, game_type)?;

    Ok(GamePostEntity {
        id: Uuid::new_v4(),
        party_id,
        party_name,
        creator_id,
        creator_name: creator_name.to_owned(),
        format,
        game_type,
        status: PostStatus::Open,
        created_at: now,
        expires_at: now + ttl,
        players: vec![creator_id],
        ready_players: Vec::new(),
        max_players: format.max_players(),
        team2_party_id: None,
        match_result: None,
    })
}

/// Plan a join against a snapshot.
///
/// `actor_parties` are the parties the actor owns; for team formats the
/// first one meeting the size minimum and distinct from the posting
/// party becomes the second team.
pub fn plan_join(
    post: &GamePostEntity,
    actor_id: Uuid,
    actor_parties: &[PartyEntity],
    now: SystemTime,
) -> Result<TransitionPlan, LifecycleError> {
    if post.has_player(actor_id) {
        return Err(LifecycleError::AlreadyJoined);
    }
    if post.is_full() {
        return Err(LifecycleError::GameFull);
    }
    if post.status != PostStatus::Open {
        return Err(LifecycleError::WrongStatus {
            actual: post.status,
            expected: PostStatus::Open,
        });
    }
    if post.is_past_deadline(now) {
        return Err(LifecycleError::DeadlinePassed);
    }

    let team2_party = match post.format.required_party_size() {
        None => None,
        Some(required) => {
            let eligible = actor_parties.iter().find(|party| {
                party.creator_id == actor_id
                    && Some(party.id) != post.party_id
                    && party.size() >= required
            });
            Some(
                eligible
                    .ok_or(LifecycleError::NoEligibleParty { required })?
                    .id,
            )
        }
    };

    Ok(TransitionPlan {
        guard: UpdateGuard {
            status: Some(PostStatus::Open),
            not_expired_at: Some(now),
            player_absent: Some(actor_id),
            players_below: Some(post.max_players),
            ..Default::default()
        },
        mutation: PostMutation {
            add_player: Some(actor_id),
            set_team2_party: team2_party,
            set_status: Some(PostStatus::InProgress),
            ..Default::default()
        },
    })
}

/// Plan a readiness confirmation against a snapshot.
///
/// The quorum promotion is part of the mutation, not of this plan: the
/// store re-checks `ready_players == players` (by size) after the union,
/// inside the same atomic step, so a concurrent join resets the quorum
/// requirement instead of letting a stale count trigger a start.
pub fn plan_ready(
    post: &GamePostEntity,
    actor_id: Uuid,
) -> Result<TransitionPlan, LifecycleError> {
    if !post.has_player(actor_id) {
        return Err(LifecycleError::NotAParticipant);
    }
    if post.status != PostStatus::InProgress {
        return Err(LifecycleError::WrongStatus {
            actual: post.status,
            expected: PostStatus::InProgress,
        });
    }

    Ok(TransitionPlan {
        guard: UpdateGuard {
            status: Some(PostStatus::InProgress),
            player_present: Some(actor_id),
            ..Default::default()
        },
        mutation: PostMutation {
            add_ready_player: Some(actor_id),
            promote_on_full_ready: true,
            ..Default::default()
        },
    })
}

/// Plan a result submission against a snapshot.
///
/// For team formats, `team2_party` is the resolved party bound at join
/// time: authorization goes to the post creator or that party's owner.
/// For solo play the reporter must hold a slot and be one of the two
/// named players.
pub fn plan_submit_result(
    post: &GamePostEntity,
    actor_id: Uuid,
    report: MatchReport,
    team2_party: Option<&PartyEntity>,
    now: SystemTime,
) -> Result<TransitionPlan, LifecycleError> {
    if post.status != PostStatus::InProgress {
        return Err(LifecycleError::WrongStatus {
            actual: post.status,
            expected: PostStatus::InProgress,
        });
    }

    if post.format.is_team_format() {
        let second_captain = team2_party.map(|party| party.creator_id);
        if actor_id != post.creator_id && Some(actor_id) != second_captain {
            return Err(LifecycleError::NotACaptain);
        }
    } else {
        if !post.has_player(actor_id) {
            return Err(LifecycleError::NotAParticipant);
        }
        if actor_id != report.winner_id && actor_id != report.loser_id {
            return Err(LifecycleError::ResultNotSelf);
        }
    }

    Ok(TransitionPlan {
        guard: UpdateGuard {
            status: Some(PostStatus::InProgress),
            ..Default::default()
        },
        mutation: PostMutation {
            set_status: Some(PostStatus::Completed),
            set_result: Some(MatchResultEntity {
                winner_id: report.winner_id,
                winner_name: report.winner_name,
                loser_id: report.loser_id,
                loser_name: report.loser_name,
                score: report.score,
                reported_by: actor_id,
                reported_at: now,
            }),
            ..Default::default()
        },
    })
}

/// Deletion is creator-only, in any status.
pub fn authorize_delete(post: &GamePostEntity, actor_id: Uuid) -> Result<(), LifecycleError> {
    if post.creator_id != actor_id {
        return Err(LifecycleError::NotPostCreator);
    }
    Ok(())
}
