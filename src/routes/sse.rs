use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, services::stream_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/matches/{id}/stream",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (
            status = 200,
            description = "Live match events",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 404, description = "Unknown match")
    )
)]
/// Stream live events of one match.
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = stream_service::subscribe_match(&state, id).await?;
    info!(match_id = %id, subscriber_id = %subscription.id, "new match SSE connection");
    Ok(stream_service::to_sse_stream(state, subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/matches/{id}/stream", get(match_stream))
}
