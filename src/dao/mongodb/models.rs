use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GameFormat, GamePostEntity, GameType, MatchResultEntity, PartyEntity, PostStatus,
};

/// Persisted shape of a game post; timestamps live as BSON datetimes so
/// the expiry sweep can compare them server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPostDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    party_id: Option<Uuid>,
    party_name: String,
    creator_id: Uuid,
    creator_name: String,
    format: GameFormat,
    game_type: GameType,
    status: PostStatus,
    created_at: DateTime,
    expires_at: DateTime,
    players: Vec<Uuid>,
    #[serde(default)]
    ready_players: Vec<Uuid>,
    max_players: u32,
    team2_party_id: Option<Uuid>,
    match_result: Option<MongoMatchResultDocument>,
}

/// Embedded match-result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchResultDocument {
    winner_id: Uuid,
    winner_name: String,
    loser_id: Uuid,
    loser_name: String,
    score: String,
    reported_by: Uuid,
    reported_at: DateTime,
}

impl From<MatchResultEntity> for MongoMatchResultDocument {
    fn from(value: MatchResultEntity) -> Self {
        Self {
            winner_id: value.winner_id,
            winner_name: value.winner_name,
            loser_id: value.loser_id,
            loser_name: value.loser_name,
            score: value.score,
            reported_by: value.reported_by,
            reported_at: DateTime::from_system_time(value.reported_at),
        }
    }
}

impl From<MongoMatchResultDocument> for MatchResultEntity {
    fn from(value: MongoMatchResultDocument) -> Self {
        Self {
            winner_id: value.winner_id,
            winner_name: value.winner_name,
            loser_id: value.loser_id,
            loser_name: value.loser_name,
            score: value.score,
            reported_by: value.reported_by,
            reported_at: value.reported_at.to_system_time(),
        }
    }
}

impl From<GamePostEntity> for MongoPostDocument {
    fn from(value: GamePostEntity) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            party_name: value.party_name,
            creator_id: value.creator_id,
            creator_name: value.creator_name,
            format: value.format,
            game_type: value.game_type,
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
            expires_at: DateTime::from_system_time(value.expires_at),
            players: value.players,
            ready_players: value.ready_players,
            max_players: value.max_players,
            team2_party_id: value.team2_party_id,
            match_result: value.match_result.map(Into::into),
        }
    }
}

impl From<MongoPostDocument> for GamePostEntity {
    fn from(value: MongoPostDocument) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            party_name: value.party_name,
            creator_id: value.creator_id,
            creator_name: value.creator_name,
            format: value.format,
            game_type: value.game_type,
            status: value.status,
            created_at: value.created_at.to_system_time(),
            expires_at: value.expires_at.to_system_time(),
            players: value.players,
            ready_players: value.ready_players,
            max_players: value.max_players,
            team2_party_id: value.team2_party_id,
            match_result: value.match_result.map(Into::into),
        }
    }
}

/// Party record as written by the party subsystem; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPartyDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    creator_id: Uuid,
    #[serde(default)]
    members: Vec<Uuid>,
}

impl From<MongoPartyDocument> for PartyEntity {
    fn from(value: MongoPartyDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            creator_id: value.creator_id,
            members: value.members,
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
