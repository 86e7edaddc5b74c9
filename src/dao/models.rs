use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created and waiting for kick-off.
    Scheduled,
    /// Clock is running; stoppages and scores can be recorded.
    InProgress,
    /// Allocated time expired; scores can still be corrected.
    Finished,
    /// Final submission by the scorekeeper. Terminal.
    Ended,
}

impl MatchStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Finished => "finished",
            MatchStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-player counters for one match. Unique per (match, player).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatEntity {
    /// Stable identifier of the record.
    pub id: Uuid,
    /// Match owning the record.
    pub match_id: Uuid,
    /// Player the counters belong to.
    pub player_id: Uuid,
    pub goals: u32,
    pub assists: u32,
    pub blocks: u32,
    pub turnovers: u32,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Match record persisted by the storage layer.
///
/// Player statistics live alongside the record so that an upsert and the
/// aggregate score it implies commit under the same version token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Display name of the fixture.
    pub name: String,
    pub status: MatchStatus,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    /// User allowed to drive the lifecycle and record scores.
    pub scorekeeper_id: Option<Uuid>,
    pub scheduled_time: SystemTime,
    pub actual_start_time: Option<SystemTime>,
    /// Derived: start + allocated duration + stoppage.
    pub actual_end_time: Option<SystemTime>,
    pub allocated_duration_minutes: u32,
    /// Accumulated stoppage time. Only grows.
    pub stoppage_seconds: u64,
    /// Derived from `player_stats`; never set directly by clients.
    pub home_score: u32,
    /// Derived from `player_stats`; never set directly by clients.
    pub away_score: u32,
    /// Team that pulled first, recorded at kick-off.
    pub first_pull_by: Option<String>,
    /// Compare-and-swap token, incremented on every committed mutation.
    pub version: u64,
    pub player_stats: Vec<PlayerStatEntity>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Set by the reference-data layer; deleted matches are invisible here.
    pub deleted_at: Option<SystemTime>,
}

impl MatchEntity {
    /// Build a fresh scheduled match at version 1.
    pub fn scheduled(
        name: impl Into<String>,
        home_team_id: Uuid,
        away_team_id: Uuid,
        scorekeeper_id: Option<Uuid>,
        scheduled_time: SystemTime,
        allocated_duration_minutes: u32,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: MatchStatus::Scheduled,
            home_team_id,
            away_team_id,
            scorekeeper_id,
            scheduled_time,
            actual_start_time: None,
            actual_end_time: None,
            allocated_duration_minutes,
            stoppage_seconds: 0,
            home_score: 0,
            away_score: 0,
            first_pull_by: None,
            version: 1,
            player_stats: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Allocated playing time as a [`Duration`].
    pub fn allocated_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.allocated_duration_minutes) * 60)
    }

    /// End time implied by the start time, allocation and stoppages.
    ///
    /// `None` before kick-off, or when the sum is not representable.
    pub fn expected_end_time(&self) -> Option<SystemTime> {
        self.end_time_with_stoppage(self.stoppage_seconds)
    }

    /// End time the match would have with `stoppage_seconds` of stoppage.
    pub fn end_time_with_stoppage(&self, stoppage_seconds: u64) -> Option<SystemTime> {
        self.actual_start_time?
            .checked_add(self.allocated_duration())?
            .checked_add(Duration::from_secs(stoppage_seconds))
    }

    /// Re-derive `actual_end_time` from the other time fields.
    pub fn refresh_end_time(&mut self) {
        self.actual_end_time = self.expected_end_time();
    }

    /// Statistics recorded for `player_id`, if any.
    pub fn player_stat(&self, player_id: Uuid) -> Option<&PlayerStatEntity> {
        self.player_stats
            .iter()
            .find(|stat| stat.player_id == player_id)
    }
}

/// Team reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    pub id: Uuid,
    pub name: String,
}

/// Player reference data, including current team membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    pub id: Uuid,
    pub name: String,
    pub team_id: Option<Uuid>,
    pub jersey_number: Option<u32>,
}

/// User reference data (scorekeepers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// A team together with the players currently registered on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
    pub team: TeamEntity,
    pub players: Vec<PlayerEntity>,
}

impl TeamRoster {
    /// Whether `player_id` belongs to this roster.
    pub fn contains(&self, player_id: Uuid) -> bool {
        self.players.iter().any(|player| player.id == player_id)
    }
}

/// Side of the pitch a team plays on for a given match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    Home,
    Away,
}

/// Match record joined with its rosters and scorekeeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDetails {
    pub record: MatchEntity,
    pub home: TeamRoster,
    pub away: TeamRoster,
    pub scorekeeper: Option<UserEntity>,
}

impl MatchDetails {
    /// Which side `player_id` plays for, if any.
    pub fn side_of(&self, player_id: Uuid) -> Option<TeamSide> {
        if self.home.contains(player_id) {
            Some(TeamSide::Home)
        } else if self.away.contains(player_id) {
            Some(TeamSide::Away)
        } else {
            None
        }
    }

    /// Look a player up on either roster.
    pub fn player(&self, player_id: Uuid) -> Option<&PlayerEntity> {
        self.home
            .players
            .iter()
            .chain(self.away.players.iter())
            .find(|player| player.id == player_id)
    }

    /// Swap in a freshly committed record, keeping the joined relations.
    pub fn with_record(self, record: MatchEntity) -> Self {
        Self { record, ..self }
    }
}

/// Kind of entry on a match timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    MatchStarted,
    MatchFinished,
    MatchEnded,
    StoppageRecorded,
    GoalScored,
    AssistRecorded,
}

impl TimelineEventKind {
    /// Wire name, shared with the broadcast event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventKind::MatchStarted => "match_started",
            TimelineEventKind::MatchFinished => "match_finished",
            TimelineEventKind::MatchEnded => "match_ended",
            TimelineEventKind::StoppageRecorded => "stoppage_recorded",
            TimelineEventKind::GoalScored => "goal_scored",
            TimelineEventKind::AssistRecorded => "assist_recorded",
        }
    }
}

/// Timeline entry waiting to be appended; the store assigns identity and order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimelineEvent {
    pub match_id: Uuid,
    pub kind: TimelineEventKind,
    pub minute: u32,
    pub second: u32,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

/// Immutable, appended timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEventEntity {
    pub id: Uuid,
    pub match_id: Uuid,
    pub kind: TimelineEventKind,
    /// Elapsed match time, whole minutes.
    pub minute: u32,
    /// Elapsed match time, seconds past `minute`.
    pub second: u32,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    /// Insertion order within the match, assigned by the store.
    pub sequence: u64,
    pub created_at: SystemTime,
}

impl TimelineEventEntity {
    /// Sort key giving timeline order: elapsed time, then insertion order.
    pub fn order_key(&self) -> (u32, u32, u64) {
        (self.minute, self.second, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(minutes: u32) -> MatchEntity {
        let mut record = MatchEntity::scheduled(
            "Final",
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            SystemTime::UNIX_EPOCH,
            minutes,
        );
        record.actual_start_time = Some(SystemTime::UNIX_EPOCH);
        record
    }

    #[test]
    fn end_time_adds_allocation_and_stoppage() {
        let mut record = started(90);
        record.stoppage_seconds = 120;
        record.refresh_end_time();

        assert_eq!(
            record.actual_end_time,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(90 * 60 + 120))
        );
    }

    #[test]
    fn unrepresentable_end_time_is_none() {
        let mut record = started(90);
        record.stoppage_seconds = u64::MAX;

        assert_eq!(record.expected_end_time(), None);

        let mut not_started = started(90);
        not_started.actual_start_time = None;
        assert_eq!(not_started.expected_end_time(), None);
    }
}
