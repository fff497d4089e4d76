use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameFormat, GamePostEntity, GameType, MatchResultEntity, PostStatus},
    dto::format_system_time,
    state::lifecycle::MatchReport,
};

/// Placeholder shown instead of the creator's name on open posts.
const REDACTED_CREATOR_NAME: &str = "Anonymous";

/// Payload used to post a new game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGamePostRequest {
    /// Posting party; required for team formats, ignored for 1v1.
    pub party_id: Option<Uuid>,
    /// Competitive format.
    pub format: GameFormat,
    /// Ruleset; must be compatible with the format.
    pub game_type: GameType,
}

/// Payload reporting the outcome of a game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitResultRequest {
    /// Winning player or captain.
    pub winner_id: Uuid,
    /// Winner display name.
    #[validate(length(min = 1))]
    pub winner_name: String,
    /// Losing player or captain.
    pub loser_id: Uuid,
    /// Loser display name.
    #[validate(length(min = 1))]
    pub loser_name: String,
    /// Free-form score line, e.g. `"13-7"`.
    #[validate(length(min = 1))]
    pub score: String,
}

impl From<SubmitResultRequest> for MatchReport {
    fn from(value: SubmitResultRequest) -> Self {
        Self {
            winner_id: value.winner_id,
            winner_name: value.winner_name,
            loser_id: value.loser_id,
            loser_name: value.loser_name,
            score: value.score,
        }
    }
}

/// Recorded outcome as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchResultResponse {
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
    /// Actor who reported the outcome.
    pub reported_by: Uuid,
    /// RFC 3339 reporting timestamp.
    pub reported_at: String,
}

impl From<MatchResultEntity> for MatchResultResponse {
    fn from(value: MatchResultEntity) -> Self {
        Self {
            winner_id: value.winner_id,
            winner_name: value.winner_name,
            loser_id: value.loser_id,
            loser_name: value.loser_name,
            score: value.score,
            reported_by: value.reported_by,
            reported_at: format_system_time(value.reported_at),
        }
    }
}

/// Public projection of a game post.
#[derive(Debug, Serialize, ToSchema)]
pub struct GamePostResponse {
    /// Post identifier.
    pub id: Uuid,
    /// Posting party, absent for solo queue.
    pub party_id: Option<Uuid>,
    /// Display name of the posting party.
    pub party_name: String,
    /// Author of the post.
    pub creator_id: Uuid,
    /// Author display name; `"Anonymous"` on open posts for non-creators.
    pub creator_name: String,
    /// Competitive format.
    pub format: GameFormat,
    /// Ruleset.
    pub game_type: GameType,
    /// Current lifecycle state.
    pub status: PostStatus,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 expiry deadline.
    pub expires_at: String,
    /// Current roster.
    pub players: Vec<Uuid>,
    /// Players who confirmed readiness.
    pub ready_players: Vec<Uuid>,
    /// Roster capacity.
    pub max_players: u32,
    /// Party of the second team, if bound.
    pub team2_party_id: Option<Uuid>,
    /// Recorded outcome, present once completed.
    pub match_result: Option<MatchResultResponse>,
}

impl GamePostResponse {
    /// Project a post for a specific reader, hiding the creator's name
    /// while the post is open and the reader is somebody else.
    pub fn for_viewer(entity: GamePostEntity, viewer_id: Uuid) -> Self {
        let creator_name =
            if entity.status == PostStatus::Open && entity.creator_id != viewer_id {
                REDACTED_CREATOR_NAME.to_owned()
            } else {
                entity.creator_name
            };

        Self {
            id: entity.id,
            party_id: entity.party_id,
            party_name: entity.party_name,
            creator_id: entity.creator_id,
            creator_name,
            format: entity.format,
            game_type: entity.game_type,
            status: entity.status,
            created_at: format_system_time(entity.created_at),
            expires_at: format_system_time(entity.expires_at),
            players: entity.players,
            ready_players: entity.ready_players,
            max_players: entity.max_players,
            team2_party_id: entity.team2_party_id,
            match_result: entity.match_result.map(Into::into),
        }
    }
}

/// Outcome of a readiness confirmation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyUpResponse {
    /// Whether every current player has now confirmed.
    pub all_ready: bool,
    /// Human-readable confirmation.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn entity(status: PostStatus) -> GamePostEntity {
        let now = SystemTime::now();
        let creator = Uuid::new_v4();
        GamePostEntity {
            id: Uuid::new_v4(),
            party_id: None,
            party_name: "Solo Queue".into(),
            creator_id: creator,
            creator_name: "alice".into(),
            format: GameFormat::OneVsOne,
            game_type: GameType::Deathmatch,
            status,
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
    fn open_posts_hide_creator_from_strangers() {
        let post = entity(PostStatus::Open);
        let response = GamePostResponse::for_viewer(post, Uuid::new_v4());
        assert_eq!(response.creator_name, "Anonymous");
    }

    #[test]
    fn creator_sees_own_name_while_open() {
        let post = entity(PostStatus::Open);
        let creator = post.creator_id;
        let response = GamePostResponse::for_viewer(post, creator);
        assert_eq!(response.creator_name, "alice");
    }

    #[test]
    fn non_open_posts_are_not_redacted() {
        for status in [
            PostStatus::InProgress,
            PostStatus::ReadyToStart,
            PostStatus::Completed,
            PostStatus::Expired,
        ] {
            let response = GamePostResponse::for_viewer(entity(status), Uuid::new_v4());
            assert_eq!(response.creator_name, "alice");
        }
    }
}
