use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MatchDetails, PlayerStatEntity},
    services::{scoring_service::ScoreInput, timeline::Elapsed},
};

/// Body of `POST /matches/{id}/scores`.
///
/// Counters replace the stored values for the player; resubmitting the same
/// body is a no-op apart from the version bump.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecordScoreRequest {
    pub player_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub goals: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub assists: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub blocks: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub turnovers: i32,
    /// Elapsed match minute of the goal; timeline events need both fields.
    #[serde(default)]
    pub elapsed_minute: Option<u32>,
    #[serde(default)]
    #[validate(range(max = 59))]
    pub elapsed_second: Option<u32>,
}

impl From<RecordScoreRequest> for ScoreInput {
    fn from(request: RecordScoreRequest) -> Self {
        Self {
            player_id: request.player_id,
            goals: request.goals,
            assists: request.assists,
            blocks: request.blocks,
            turnovers: request.turnovers,
            elapsed: request
                .elapsed_minute
                .zip(request.elapsed_second)
                .map(|(minute, second)| Elapsed { minute, second }),
        }
    }
}

/// Per-player counters of a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerStatSummary {
    pub player_id: Uuid,
    pub player_name: Option<String>,
    pub jersey_number: Option<u32>,
    pub team_id: Option<Uuid>,
    pub goals: u32,
    pub assists: u32,
    pub blocks: u32,
    pub turnovers: u32,
}

impl PlayerStatSummary {
    /// Join a stat record with roster data from `details`.
    pub fn from_stat(stat: &PlayerStatEntity, details: &MatchDetails) -> Self {
        let player = details.player(stat.player_id);
        Self {
            player_id: stat.player_id,
            player_name: player.map(|p| p.name.clone()),
            jersey_number: player.and_then(|p| p.jersey_number),
            team_id: player.and_then(|p| p.team_id),
            goals: stat.goals,
            assists: stat.assists,
            blocks: stat.blocks,
            turnovers: stat.turnovers,
        }
    }
}
