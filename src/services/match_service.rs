use uuid::Uuid;

use crate::{dto::matches::MatchSummary, error::ServiceError, state::SharedState};

/// Current view of a match with its teams and scorekeeper.
pub async fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let details = store.get_by_id_with_relations(match_id).await?;
    Ok(MatchSummary::from(&details))
}
