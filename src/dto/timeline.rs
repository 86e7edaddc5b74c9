use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{TimelineEventEntity, TimelineEventKind},
    dto::format_system_time,
};

/// One timeline entry as exposed over HTTP and in `goal_scored`/`assist_recorded` broadcasts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelineEventSummary {
    pub id: Uuid,
    pub match_id: Uuid,
    pub event_type: TimelineEventKind,
    pub minute: u32,
    pub second: u32,
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<&TimelineEventEntity> for TimelineEventSummary {
    fn from(event: &TimelineEventEntity) -> Self {
        Self {
            id: event.id,
            match_id: event.match_id,
            event_type: event.kind,
            minute: event.minute,
            second: event.second,
            description: event.description.clone(),
            metadata: event.metadata.clone(),
            created_at: format_system_time(event.created_at),
        }
    }
}

/// Ordered timeline of a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchTimeline {
    pub match_id: Uuid,
    pub events: Vec<TimelineEventSummary>,
}
