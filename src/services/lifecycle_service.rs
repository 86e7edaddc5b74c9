//! Match lifecycle commands: start, finish, end and stoppage time.
//!
//! Each command checks the caller, plans the transition against the record it
//! read, commits through [`commit_versioned`], then appends a timeline entry
//! and broadcasts. Timeline and broadcast failures never undo the commit.

use std::{sync::Arc, time::SystemTime};

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{MatchDetails, MatchEntity, TimelineEventKind},
    },
    error::ServiceError,
    services::{
        broadcast_events::{
            broadcast_match_ended, broadcast_match_finished, broadcast_match_started,
            broadcast_stoppage_recorded,
        },
        concurrency::commit_versioned,
        timeline::{Elapsed, record_event},
    },
    state::{MatchCommand, SharedState, Transition},
};

/// Longest accepted stoppage reason, in characters.
pub const MAX_STOPPAGE_REASON_LEN: usize = 255;
/// Longest single stoppage, in seconds.
pub const MAX_STOPPAGE_SECONDS: u64 = 3 * 60 * 60;

/// `scheduled -> in_progress`. Sets the start time and the derived end time.
pub async fn start_match(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
    first_pull_by: Option<String>,
) -> Result<MatchDetails, ServiceError> {
    let (store, details, plan) = prepare(state, match_id, caller, MatchCommand::Start).await?;

    let started_at = SystemTime::now();
    let record = commit_versioned(store.as_ref(), match_id, plan.expected_version, move |m| {
        m.status = plan.to;
        m.actual_start_time = Some(started_at);
        if first_pull_by.is_some() {
            m.first_pull_by = first_pull_by;
        }
        m.refresh_end_time();
    })
    .await?;
    info!(%match_id, version = record.version, "match started");

    let details = details.with_record(record);
    record_event(
        store.as_ref(),
        match_id,
        TimelineEventKind::MatchStarted,
        Elapsed::ZERO,
        "Match started",
        None,
    )
    .await;
    broadcast_match_started(state, &details).await;
    Ok(details)
}

/// `in_progress -> finished`. Time fields are left untouched.
pub async fn finish_match(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
) -> Result<MatchDetails, ServiceError> {
    let (store, details, plan) = prepare(state, match_id, caller, MatchCommand::Finish).await?;

    let record = commit_versioned(store.as_ref(), match_id, plan.expected_version, move |m| {
        m.status = plan.to;
    })
    .await?;
    info!(%match_id, version = record.version, "match finished");

    let at = Elapsed::since(record.actual_start_time, SystemTime::now());
    let details = details.with_record(record);
    record_event(
        store.as_ref(),
        match_id,
        TimelineEventKind::MatchFinished,
        at,
        "Match time expired",
        None,
    )
    .await;
    broadcast_match_finished(state, &details).await;
    Ok(details)
}

/// `finished -> ended`. Terminal.
pub async fn end_match(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
) -> Result<MatchDetails, ServiceError> {
    let (store, details, plan) = prepare(state, match_id, caller, MatchCommand::End).await?;

    let record = commit_versioned(store.as_ref(), match_id, plan.expected_version, move |m| {
        m.status = plan.to;
    })
    .await?;
    info!(
        %match_id,
        version = record.version,
        home_score = record.home_score,
        away_score = record.away_score,
        "match ended"
    );

    let at = Elapsed::since(record.actual_start_time, SystemTime::now());
    let details = details.with_record(record);
    record_event(
        store.as_ref(),
        match_id,
        TimelineEventKind::MatchEnded,
        at,
        "Match finalized by scorekeeper",
        None,
    )
    .await;
    broadcast_match_ended(state, &details).await;
    Ok(details)
}

/// Add stoppage time to a running match, pushing the end time back by the same amount.
pub async fn record_stoppage(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
    duration_seconds: u64,
    reason: String,
) -> Result<MatchDetails, ServiceError> {
    validate_stoppage(duration_seconds, &reason)?;
    let (store, details, plan) =
        prepare(state, match_id, caller, MatchCommand::RecordStoppage).await?;
    let total = details
        .record
        .stoppage_seconds
        .checked_add(duration_seconds)
        .filter(|total| details.record.end_time_with_stoppage(*total).is_some())
        .ok_or_else(|| {
            ServiceError::Validation("stoppage would push the end time out of range".into())
        })?;

    // The version check guarantees the record still holds the stoppage read above.
    let record = commit_versioned(store.as_ref(), match_id, plan.expected_version, move |m| {
        m.stoppage_seconds = total;
        m.refresh_end_time();
    })
    .await?;
    info!(
        %match_id,
        version = record.version,
        duration_seconds,
        stoppage_seconds = record.stoppage_seconds,
        "stoppage recorded"
    );

    let at = Elapsed::since(record.actual_start_time, SystemTime::now());
    let details = details.with_record(record);
    record_event(
        store.as_ref(),
        match_id,
        TimelineEventKind::StoppageRecorded,
        at,
        reason.clone(),
        Some(json!({ "duration_seconds": duration_seconds })),
    )
    .await;
    broadcast_stoppage_recorded(state, &details, duration_seconds, &reason).await;
    Ok(details)
}

/// Reject a caller that is not the match's assigned scorekeeper.
pub fn ensure_scorekeeper(
    record: &MatchEntity,
    caller: Uuid,
    command: MatchCommand,
) -> Result<(), ServiceError> {
    if record.scorekeeper_id == Some(caller) {
        return Ok(());
    }
    Err(ServiceError::Unauthorized(format!(
        "only the assigned scorekeeper can {command} match {}",
        record.id
    )))
}

fn validate_stoppage(duration_seconds: u64, reason: &str) -> Result<(), ServiceError> {
    if duration_seconds == 0 {
        return Err(ServiceError::Validation(
            "stoppage duration must be at least one second".into(),
        ));
    }
    if duration_seconds > MAX_STOPPAGE_SECONDS {
        return Err(ServiceError::Validation(format!(
            "stoppage duration exceeds {MAX_STOPPAGE_SECONDS} seconds"
        )));
    }
    if reason.trim().is_empty() {
        return Err(ServiceError::Validation("stoppage reason is required".into()));
    }
    if reason.chars().count() > MAX_STOPPAGE_REASON_LEN {
        return Err(ServiceError::Validation(format!(
            "stoppage reason exceeds {MAX_STOPPAGE_REASON_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn log_plan(match_id: Uuid, plan: &Transition) {
    debug!(
        %match_id,
        command = %plan.command,
        from = %plan.from,
        to = %plan.to,
        expected_version = plan.expected_version,
        "transition planned"
    );
}

/// Load the match, check the caller, then plan `command`.
async fn prepare(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
    command: MatchCommand,
) -> Result<(Arc<dyn MatchStore>, MatchDetails, Transition), ServiceError> {
    let store = state.require_match_store().await?;
    let details = store.get_by_id_with_relations(match_id).await?;
    ensure_scorekeeper(&details.record, caller, command)?;
    let plan = Transition::plan(&details.record, command)?;
    log_plan(match_id, &plan);
    Ok((store, details, plan))
}
