use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live match backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::get_match,
        crate::routes::matches::start_match,
        crate::routes::matches::finish_match,
        crate::routes::matches::end_match,
        crate::routes::matches::record_stoppage,
        crate::routes::matches::record_score,
        crate::routes::matches::list_scores,
        crate::routes::matches::get_timeline,
        crate::routes::sse::match_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::TeamSummary,
            crate::dto::matches::UserSummary,
            crate::dto::matches::StartMatchRequest,
            crate::dto::matches::RecordStoppageRequest,
            crate::dto::scoring::RecordScoreRequest,
            crate::dto::scoring::PlayerStatSummary,
            crate::dto::timeline::MatchTimeline,
            crate::dto::timeline::TimelineEventSummary,
            crate::dto::sse::ConnectedEvent,
            crate::dto::sse::HeartbeatEvent,
            crate::dto::sse::StoppageRecordedEvent,
            crate::dao::models::MatchStatus,
            crate::dao::models::TimelineEventKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Match lifecycle, scoring and reads"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
