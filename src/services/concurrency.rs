//! Version-checked commits of match mutations.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{match_store::MatchStore, models::MatchEntity, storage::StorageError},
    error::ServiceError,
};

/// Apply `mutate` to the match iff its stored version still equals `expected_version`.
///
/// On success the returned record carries `expected_version + 1`. A mismatch
/// fails with [`ServiceError::VersionConflict`] and writes nothing; callers
/// re-fetch and resubmit, there is no retry here.
pub async fn commit_versioned<F>(
    store: &dyn MatchStore,
    match_id: Uuid,
    expected_version: u64,
    mutate: F,
) -> Result<MatchEntity, ServiceError>
where
    F: FnOnce(&mut MatchEntity) + Send + 'static,
{
    match store
        .update_with_version(match_id, expected_version, Box::new(mutate))
        .await
    {
        Ok(record) => {
            debug!(%match_id, version = record.version, "match mutation committed");
            Ok(record)
        }
        Err(StorageError::VersionConflict {
            expected, actual, ..
        }) => {
            warn!(%match_id, expected, actual, "version conflict on match mutation");
            Err(ServiceError::VersionConflict { expected, actual })
        }
        Err(err) => Err(err.into()),
    }
}
