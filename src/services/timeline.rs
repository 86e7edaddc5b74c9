//! Timeline recording: elapsed-time math, best-effort appends and ordered reads.

use std::time::SystemTime;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{NewTimelineEvent, TimelineEventEntity, TimelineEventKind},
    },
    dto::timeline::{MatchTimeline, TimelineEventSummary},
    error::ServiceError,
    state::SharedState,
};

/// Elapsed match time split into whole minutes and remaining seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Elapsed {
    pub minute: u32,
    pub second: u32,
}

impl Elapsed {
    /// Kick-off.
    pub const ZERO: Elapsed = Elapsed {
        minute: 0,
        second: 0,
    };

    /// Time between `start` and `now`; zero without a start or when `now` precedes it.
    pub fn since(start: Option<SystemTime>, now: SystemTime) -> Self {
        let total = start
            .and_then(|start| now.duration_since(start).ok())
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            minute: u32::try_from(total / 60).unwrap_or(u32::MAX),
            second: (total % 60) as u32,
        }
    }
}

/// Append a timeline event. Failures are logged and swallowed.
pub async fn record_event(
    store: &dyn MatchStore,
    match_id: Uuid,
    kind: TimelineEventKind,
    at: Elapsed,
    description: impl Into<String>,
    metadata: Option<serde_json::Value>,
) -> Option<TimelineEventEntity> {
    let event = NewTimelineEvent {
        match_id,
        kind,
        minute: at.minute,
        second: at.second,
        description: description.into(),
        metadata,
    };

    match store.append_timeline_event(event).await {
        Ok(appended) => {
            debug!(
                %match_id,
                kind = kind.as_str(),
                minute = at.minute,
                second = at.second,
                "timeline event appended"
            );
            Some(appended)
        }
        Err(err) => {
            warn!(%match_id, kind = kind.as_str(), error = %err, "failed to append timeline event");
            None
        }
    }
}

/// Ordered timeline of a match.
pub async fn match_timeline(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchTimeline, ServiceError> {
    let store = state.require_match_store().await?;
    store.get_by_id(match_id).await?;
    let events = store.list_timeline(match_id).await?;

    Ok(MatchTimeline {
        match_id,
        events: events.iter().map(TimelineEventSummary::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn elapsed_splits_minutes_and_seconds() {
        let start = SystemTime::UNIX_EPOCH;
        let now = start + Duration::from_secs(12 * 60 + 34);
        assert_eq!(
            Elapsed::since(Some(start), now),
            Elapsed {
                minute: 12,
                second: 34
            }
        );
    }

    #[test]
    fn elapsed_is_zero_without_start_or_for_clock_skew() {
        let now = SystemTime::now();
        assert_eq!(Elapsed::since(None, now), Elapsed::ZERO);
        assert_eq!(
            Elapsed::since(Some(now + Duration::from_secs(5)), now),
            Elapsed::ZERO
        );
    }
}
