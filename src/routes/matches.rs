use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        matches::{MatchSummary, RecordStoppageRequest, StartMatchRequest},
        scoring::{PlayerStatSummary, RecordScoreRequest},
        timeline::MatchTimeline,
    },
    error::AppError,
    services::{lifecycle_service, match_service, scoring_service, timeline},
    state::SharedState,
};

/// Header carrying the authenticated caller's user id.
pub const CALLER_HEADER: &str = "x-user-id";

/// Identity of the caller, read from the `X-User-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".into()))?;

        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(CallerId)
            .ok_or_else(|| AppError::Unauthorized("malformed X-User-Id header".into()))
    }
}

/// Routes for match commands and reads.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/start", post(start_match))
        .route("/matches/{id}/finish", post(finish_match))
        .route("/matches/{id}/end", post(end_match))
        .route("/matches/{id}/stoppages", post(record_stoppage))
        .route("/matches/{id}/scores", post(record_score).get(list_scores))
        .route("/matches/{id}/timeline", get(get_timeline))
}

/// Current state of a match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match found", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::get_match(&state, id).await?;
    Ok(Json(summary))
}

/// Kick the match off.
#[utoipa::path(
    post,
    path = "/matches/{id}/start",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = StartMatchRequest,
    responses(
        (status = 200, description = "Match started", body = MatchSummary),
        (status = 401, description = "Caller is not the scorekeeper"),
        (status = 409, description = "Match is not scheduled, or was modified concurrently")
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    body: Option<Json<StartMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    request.validate()?;
    let details =
        lifecycle_service::start_match(&state, id, caller, request.first_pull_by).await?;
    Ok(Json(MatchSummary::from(&details)))
}

/// Close regulation time.
#[utoipa::path(
    post,
    path = "/matches/{id}/finish",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match finished", body = MatchSummary),
        (status = 401, description = "Caller is not the scorekeeper"),
        (status = 409, description = "Match is not in progress, or was modified concurrently")
    )
)]
pub async fn finish_match(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let details = lifecycle_service::finish_match(&state, id, caller).await?;
    Ok(Json(MatchSummary::from(&details)))
}

/// Submit the final result.
#[utoipa::path(
    post,
    path = "/matches/{id}/end",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match ended", body = MatchSummary),
        (status = 401, description = "Caller is not the scorekeeper"),
        (status = 409, description = "Match is not finished, or was modified concurrently")
    )
)]
pub async fn end_match(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let details = lifecycle_service::end_match(&state, id, caller).await?;
    Ok(Json(MatchSummary::from(&details)))
}

#[utoipa::path(
    post,
    path = "/matches/{id}/stoppages",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = RecordStoppageRequest,
    responses(
        (status = 200, description = "Stoppage recorded", body = MatchSummary),
        (status = 400, description = "Invalid duration or reason"),
        (status = 401, description = "Caller is not the scorekeeper"),
        (status = 409, description = "Match is not in progress, or was modified concurrently")
    )
)]
pub async fn record_stoppage(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RecordStoppageRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let details = lifecycle_service::record_stoppage(
        &state,
        id,
        caller,
        payload.duration_seconds,
        payload.reason,
    )
    .await?;
    Ok(Json(MatchSummary::from(&details)))
}

#[utoipa::path(
    post,
    path = "/matches/{id}/scores",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = RecordScoreRequest,
    responses(
        (status = 200, description = "Score recorded", body = MatchSummary),
        (status = 400, description = "Negative counters or player not on either roster"),
        (status = 401, description = "Caller is not the scorekeeper"),
        (status = 409, description = "Match not accepting scores, or was modified concurrently")
    )
)]
pub async fn record_score(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RecordScoreRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let outcome = scoring_service::record_score(&state, id, caller, payload.into()).await?;
    Ok(Json(MatchSummary::from(&outcome.details)))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/scores",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses((status = 200, description = "Per-player statistics", body = [PlayerStatSummary]))
)]
pub async fn list_scores(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PlayerStatSummary>>, AppError> {
    let scores = scoring_service::list_scores(&state, id).await?;
    Ok(Json(scores))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/timeline",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Timeline ordered by elapsed time", body = MatchTimeline)
    )
)]
pub async fn get_timeline(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchTimeline>, AppError> {
    let events = timeline::match_timeline(&state, id).await?;
    Ok(Json(events))
}
