use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MatchDetails, MatchStatus, TeamRoster, UserEntity},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Team reference embedded in match payloads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&TeamRoster> for TeamSummary {
    fn from(roster: &TeamRoster) -> Self {
        Self {
            id: roster.team.id,
            name: roster.team.name.clone(),
        }
    }
}

/// Scorekeeper reference embedded in match payloads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&UserEntity> for UserSummary {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

/// Public view of a match, also used as the payload of lifecycle broadcasts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    pub name: String,
    pub status: MatchStatus,
    pub home_team: TeamSummary,
    pub away_team: TeamSummary,
    pub scorekeeper: Option<UserSummary>,
    /// RFC 3339.
    pub scheduled_time: String,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub allocated_duration_minutes: u32,
    pub stoppage_seconds: u64,
    pub home_score: u32,
    pub away_score: u32,
    pub first_pull_by: Option<String>,
    /// Version token to echo back when retrying after a conflict.
    pub version: u64,
}

impl From<&MatchDetails> for MatchSummary {
    fn from(details: &MatchDetails) -> Self {
        let record = &details.record;
        Self {
            id: record.id,
            name: record.name.clone(),
            status: record.status,
            home_team: (&details.home).into(),
            away_team: (&details.away).into(),
            scorekeeper: details.scorekeeper.as_ref().map(UserSummary::from),
            scheduled_time: format_system_time(record.scheduled_time),
            actual_start_time: record.actual_start_time.map(format_system_time),
            actual_end_time: record.actual_end_time.map(format_system_time),
            allocated_duration_minutes: record.allocated_duration_minutes,
            stoppage_seconds: record.stoppage_seconds,
            home_score: record.home_score,
            away_score: record.away_score,
            first_pull_by: record.first_pull_by.clone(),
            version: record.version,
        }
    }
}

/// Optional body of `POST /matches/{id}/start`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct StartMatchRequest {
    /// Team that pulled first.
    #[serde(default)]
    #[validate(length(min = 1, max = 255))]
    pub first_pull_by: Option<String>,
}

/// Body of `POST /matches/{id}/stoppages`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecordStoppageRequest {
    /// Stoppage length in seconds, between 1 and 10800 (three hours).
    #[validate(range(min = 1, max = 10800))]
    pub duration_seconds: u64,
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub reason: String,
}
