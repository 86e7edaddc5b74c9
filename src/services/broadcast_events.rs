use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{MatchDetails, TimelineEventEntity},
    dto::{
        matches::MatchSummary,
        sse::{
            EVENT_MATCH_ENDED, EVENT_MATCH_FINISHED, EVENT_MATCH_STARTED, EVENT_SCORE_UPDATED,
            EVENT_STOPPAGE_RECORDED, ServerEvent, StoppageRecordedEvent,
        },
        timeline::TimelineEventSummary,
    },
    state::SharedState,
};

/// Broadcast that the match kicked off.
pub async fn broadcast_match_started(state: &SharedState, details: &MatchDetails) {
    send_summary(state, details, EVENT_MATCH_STARTED).await;
}

/// Broadcast that the allocated time expired.
pub async fn broadcast_match_finished(state: &SharedState, details: &MatchDetails) {
    send_summary(state, details, EVENT_MATCH_FINISHED).await;
}

/// Broadcast the final submission.
pub async fn broadcast_match_ended(state: &SharedState, details: &MatchDetails) {
    send_summary(state, details, EVENT_MATCH_ENDED).await;
}

/// Broadcast added stoppage time with the shifted end time.
pub async fn broadcast_stoppage_recorded(
    state: &SharedState,
    details: &MatchDetails,
    duration_seconds: u64,
    reason: &str,
) {
    let payload = StoppageRecordedEvent {
        summary: MatchSummary::from(details),
        duration_seconds,
        reason: reason.to_owned(),
    };
    send_match_event(state, details.record.id, EVENT_STOPPAGE_RECORDED, &payload).await;
}

/// Broadcast the recomputed scores.
pub async fn broadcast_score_updated(state: &SharedState, details: &MatchDetails) {
    send_summary(state, details, EVENT_SCORE_UPDATED).await;
}

/// Broadcast an appended timeline entry under its own event type.
pub async fn broadcast_timeline_event(state: &SharedState, event: &TimelineEventEntity) {
    send_match_event(
        state,
        event.match_id,
        event.kind.as_str(),
        &TimelineEventSummary::from(event),
    )
    .await;
}

async fn send_summary(state: &SharedState, details: &MatchDetails, event: &str) {
    let summary = MatchSummary::from(details);
    send_match_event(state, details.record.id, event, &summary).await;
}

/// Serialise `payload` and hand it to the broker. Never fails the caller.
async fn send_match_event<T: Serialize>(
    state: &SharedState,
    match_id: Uuid,
    event: &str,
    payload: &T,
) {
    match ServerEvent::json(event, payload) {
        Ok(message) => state.broker().publish(match_id, message).await,
        Err(err) => warn!(%match_id, event, error = %err, "failed to serialise broadcast payload"),
    }
}
