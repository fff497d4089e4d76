use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Competitive format of a game post, fixing the roster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GameFormat {
    /// Two parties of five.
    #[serde(rename = "5v5")]
    FiveVsFive,
    /// Two parties of four.
    #[serde(rename = "4v4")]
    FourVsFour,
    /// Solo queue duel.
    #[serde(rename = "1v1")]
    OneVsOne,
}

impl GameFormat {
    /// Roster capacity derived from the format.
    pub fn max_players(self) -> u32 {
        match self {
            GameFormat::FiveVsFive => 10,
            GameFormat::FourVsFour => 8,
            GameFormat::OneVsOne => 2,
        }
    }

    /// Minimum party size a team must bring, `None` for solo play.
    pub fn required_party_size(self) -> Option<u32> {
        match self {
            GameFormat::FiveVsFive => Some(5),
            GameFormat::FourVsFour => Some(4),
            GameFormat::OneVsOne => None,
        }
    }

    /// Whether the format is played between parties rather than individuals.
    pub fn is_team_format(self) -> bool {
        self.required_party_size().is_some()
    }

    /// Wire representation, also used in storage filters.
    pub fn as_str(self) -> &'static str {
        match self {
            GameFormat::FiveVsFive => "5v5",
            GameFormat::FourVsFour => "4v4",
            GameFormat::OneVsOne => "1v1",
        }
    }
}

impl std::fmt::Display for GameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match length / ruleset of a game post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Single map decides the match.
    #[serde(rename = "best_of_1")]
    BestOf1,
    /// First to two map wins.
    #[serde(rename = "best_of_3")]
    BestOf3,
    /// Free-for-all scoring, 1v1 only.
    Deathmatch,
}

impl GameType {
    /// Wire representation, also used in storage filters.
    pub fn as_str(self) -> &'static str {
        match self {
            GameType::BestOf1 => "best_of_1",
            GameType::BestOf3 => "best_of_3",
            GameType::Deathmatch => "deathmatch",
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a game post.
///
/// Posts only ever move forward: `Open -> InProgress -> ReadyToStart ->
/// Completed`, with `Open -> Expired` as the single alternate edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Accepting joins until capacity or the deadline.
    Open,
    /// An opponent joined; waiting on readiness confirmations.
    InProgress,
    /// Every current player confirmed readiness.
    ReadyToStart,
    /// A match result has been recorded. Terminal.
    Completed,
    /// The deadline passed while still open. Terminal.
    Expired,
}

impl PostStatus {
    /// Whether the post still counts against its creator's active-post quota.
    pub fn is_active(self) -> bool {
        matches!(self, PostStatus::Open | PostStatus::InProgress)
    }

    /// Wire representation, also used in storage filters.
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Open => "open",
            PostStatus::InProgress => "in_progress",
            PostStatus::ReadyToStart => "ready_to_start",
            PostStatus::Completed => "completed",
            PostStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome recorded when a post completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchResultEntity {
    /// Winning player (1v1) or winning captain (team formats).
    pub winner_id: Uuid,
    /// Display name of the winner at reporting time.
    pub winner_name: String,
    /// Losing player or captain.
    pub loser_id: Uuid,
    /// Display name of the loser at reporting time.
    pub loser_name: String,
    /// Free-form score line, e.g. `"13-7"`.
    pub score: String,
    /// Actor who reported the outcome.
    pub reported_by: Uuid,
    /// When the outcome was reported.
    pub reported_at: SystemTime,
}

/// Aggregate game-post record persisted by the storage layer.
///
/// Everything except `status`, `players`, `ready_players`,
/// `team2_party_id`, and `match_result` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePostEntity {
    /// Primary key of the post.
    pub id: Uuid,
    /// Posting party, absent for solo queue.
    pub party_id: Option<Uuid>,
    /// Display name of the posting party (`"Solo Queue"` for 1v1).
    pub party_name: String,
    /// Author of the post.
    pub creator_id: Uuid,
    /// Author display name; redacted in open-post listings.
    pub creator_name: String,
    /// Competitive format, fixes `max_players`.
    pub format: GameFormat,
    /// Ruleset, constrained jointly with `format`.
    pub game_type: GameType,
    /// Current lifecycle state.
    pub status: PostStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Deadline after which an open post expires.
    pub expires_at: SystemTime,
    /// Participant set; grows monotonically until a terminal state.
    pub players: Vec<Uuid>,
    /// Participants who confirmed readiness; always a subset of `players`.
    pub ready_players: Vec<Uuid>,
    /// Roster capacity derived from `format` at creation.
    pub max_players: u32,
    /// Party of the second team, bound when a team-format post is joined.
    pub team2_party_id: Option<Uuid>,
    /// Present exactly when `status` is `completed`.
    pub match_result: Option<MatchResultEntity>,
}

impl GamePostEntity {
    /// Whether the actor already occupies a roster slot.
    pub fn has_player(&self, actor_id: Uuid) -> bool {
        self.players.contains(&actor_id)
    }

    /// Whether the roster is at capacity.
    pub fn is_full(&self) -> bool {
        self.players.len() as u32 >= self.max_players
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_past_deadline(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }
}

/// Party record as seen through the Party Directory boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyEntity {
    /// Primary key of the party.
    pub id: Uuid,
    /// Display name of the party.
    pub name: String,
    /// Owner; the only member allowed to post or join team games for it.
    pub creator_id: Uuid,
    /// Member set, creator included.
    pub members: Vec<Uuid>,
}

impl PartyEntity {
    /// Member count checked against format minimums.
    pub fn size(&self) -> u32 {
        self.members.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_capacity_table() {
        assert_eq!(GameFormat::FiveVsFive.max_players(), 10);
        assert_eq!(GameFormat::FourVsFour.max_players(), 8);
        assert_eq!(GameFormat::OneVsOne.max_players(), 2);
    }

    #[test]
    fn team_formats_require_party_minimums() {
        assert_eq!(GameFormat::FiveVsFive.required_party_size(), Some(5));
        assert_eq!(GameFormat::FourVsFour.required_party_size(), Some(4));
        assert_eq!(GameFormat::OneVsOne.required_party_size(), None);
        assert!(!GameFormat::OneVsOne.is_team_format());
    }

    #[test]
    fn enums_serialize_to_wire_strings() {
        let json = serde_json::to_string(&GameFormat::FiveVsFive).unwrap();
        assert_eq!(json, "\"5v5\"");
        let json = serde_json::to_string(&GameType::BestOf3).unwrap();
        assert_eq!(json, "\"best_of_3\"");
        let json = serde_json::to_string(&PostStatus::ReadyToStart).unwrap();
        assert_eq!(json, "\"ready_to_start\"");

        let back: GameFormat = serde_json::from_str("\"1v1\"").unwrap();
        assert_eq!(back, GameFormat::OneVsOne);
    }

    #[test]
    fn only_open_and_in_progress_are_active() {
        assert!(PostStatus::Open.is_active());
        assert!(PostStatus::InProgress.is_active());
        assert!(!PostStatus::ReadyToStart.is_active());
        assert!(!PostStatus::Completed.is_active());
        assert!(!PostStatus::Expired.is_active());
    }
}
