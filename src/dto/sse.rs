use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::matches::MatchSummary;

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_MATCH_STARTED: &str = "match_started";
pub const EVENT_MATCH_FINISHED: &str = "match_finished";
pub const EVENT_MATCH_ENDED: &str = "match_ended";
pub const EVENT_STOPPAGE_RECORDED: &str = "stoppage_recorded";
pub const EVENT_SCORE_UPDATED: &str = "score_updated";
pub const EVENT_GOAL_SCORED: &str = "goal_scored";
pub const EVENT_ASSIST_RECORDED: &str = "assist_recorded";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Named payload carried from the broker to a stream.
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from pre-serialised data.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<T>(event: impl Into<String>, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Wire frame: `event: <type>\ndata: <json>\n\n`.
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event on every subscription.
pub struct ConnectedEvent {
    pub match_id: Uuid,
    pub client_id: Uuid,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Periodic liveness event sent by the stream boundary.
pub struct HeartbeatEvent {
    pub timestamp: String,
    /// Subscribers currently attached to the match.
    pub clients: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after stoppage time was added.
pub struct StoppageRecordedEvent {
    #[serde(rename = "match")]
    pub summary: MatchSummary,
    pub duration_seconds: u64,
    pub reason: String,
}
