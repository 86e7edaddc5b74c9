use mongodb::bson::{self, Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    MatchEntity, MatchStatus, PlayerEntity, PlayerStatEntity, TeamEntity, TimelineEventEntity,
    TimelineEventKind, UserEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerStatDocument {
    id: bson::Uuid,
    player_id: bson::Uuid,
    goals: i64,
    assists: i64,
    blocks: i64,
    turnovers: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    status: MatchStatus,
    home_team_id: bson::Uuid,
    away_team_id: bson::Uuid,
    scorekeeper_id: Option<bson::Uuid>,
    scheduled_time: DateTime,
    actual_start_time: Option<DateTime>,
    actual_end_time: Option<DateTime>,
    allocated_duration_minutes: i64,
    stoppage_seconds: i64,
    home_score: i64,
    away_score: i64,
    first_pull_by: Option<String>,
    pub version: i64,
    #[serde(default)]
    player_stats: Vec<MongoPlayerStatDocument>,
    created_at: DateTime,
    updated_at: DateTime,
    deleted_at: Option<DateTime>,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            name: value.name,
            status: value.status,
            home_team_id: to_bson_uuid(value.home_team_id),
            away_team_id: to_bson_uuid(value.away_team_id),
            scorekeeper_id: value.scorekeeper_id.map(to_bson_uuid),
            scheduled_time: DateTime::from_system_time(value.scheduled_time),
            actual_start_time: value.actual_start_time.map(DateTime::from_system_time),
            actual_end_time: value.actual_end_time.map(DateTime::from_system_time),
            allocated_duration_minutes: i64::from(value.allocated_duration_minutes),
            stoppage_seconds: to_i64(value.stoppage_seconds),
            home_score: i64::from(value.home_score),
            away_score: i64::from(value.away_score),
            first_pull_by: value.first_pull_by,
            version: to_i64(value.version),
            player_stats: value
                .player_stats
                .into_iter()
                .map(|stat| MongoPlayerStatDocument {
                    id: to_bson_uuid(stat.id),
                    player_id: to_bson_uuid(stat.player_id),
                    goals: i64::from(stat.goals),
                    assists: i64::from(stat.assists),
                    blocks: i64::from(stat.blocks),
                    turnovers: i64::from(stat.turnovers),
                    created_at: DateTime::from_system_time(stat.created_at),
                    updated_at: DateTime::from_system_time(stat.updated_at),
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            deleted_at: value.deleted_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        let match_id = from_bson_uuid(value.id);
        Self {
            id: match_id,
            name: value.name,
            status: value.status,
            home_team_id: from_bson_uuid(value.home_team_id),
            away_team_id: from_bson_uuid(value.away_team_id),
            scorekeeper_id: value.scorekeeper_id.map(from_bson_uuid),
            scheduled_time: value.scheduled_time.to_system_time(),
            actual_start_time: value.actual_start_time.map(DateTime::to_system_time),
            actual_end_time: value.actual_end_time.map(DateTime::to_system_time),
            allocated_duration_minutes: to_u32(value.allocated_duration_minutes),
            stoppage_seconds: to_u64(value.stoppage_seconds),
            home_score: to_u32(value.home_score),
            away_score: to_u32(value.away_score),
            first_pull_by: value.first_pull_by,
            version: to_u64(value.version),
            player_stats: value
                .player_stats
                .into_iter()
                .map(|stat| PlayerStatEntity {
                    id: from_bson_uuid(stat.id),
                    match_id,
                    player_id: from_bson_uuid(stat.player_id),
                    goals: to_u32(stat.goals),
                    assists: to_u32(stat.assists),
                    blocks: to_u32(stat.blocks),
                    turnovers: to_u32(stat.turnovers),
                    created_at: stat.created_at.to_system_time(),
                    updated_at: stat.updated_at.to_system_time(),
                })
                .collect(),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            deleted_at: value.deleted_at.map(DateTime::to_system_time),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    team_id: Option<bson::Uuid>,
    jersey_number: Option<i64>,
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            name: value.name,
            team_id: value.team_id.map(from_bson_uuid),
            jersey_number: value.jersey_number.map(to_u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    email: String,
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            name: value.name,
            email: value.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTimelineDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    match_id: bson::Uuid,
    kind: TimelineEventKind,
    minute: i64,
    second: i64,
    description: String,
    metadata: Option<serde_json::Value>,
    sequence: i64,
    created_at: DateTime,
}

impl From<TimelineEventEntity> for MongoTimelineDocument {
    fn from(value: TimelineEventEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            match_id: to_bson_uuid(value.match_id),
            kind: value.kind,
            minute: i64::from(value.minute),
            second: i64::from(value.second),
            description: value.description,
            metadata: value.metadata,
            sequence: to_i64(value.sequence),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoTimelineDocument> for TimelineEventEntity {
    fn from(value: MongoTimelineDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            match_id: from_bson_uuid(value.match_id),
            kind: value.kind,
            minute: to_u32(value.minute),
            second: to_u32(value.second),
            description: value.description,
            metadata: value.metadata,
            sequence: to_u64(value.sequence),
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Single-value counter document (`{_id: name, value}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub name: String,
    pub value: i64,
}

fn to_bson_uuid(id: Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

fn from_bson_uuid(id: bson::Uuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
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

/// Filter on a live (not soft-deleted) match.
pub fn live_match_filter(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id), "deleted_at": null}
}
