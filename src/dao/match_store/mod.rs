pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{MatchDetails, MatchEntity, NewTimelineEvent, TimelineEventEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryMatchStore;

/// Mutation applied to a match record inside a version-checked transaction.
pub type MatchMutation = Box<dyn FnOnce(&mut MatchEntity) + Send + 'static>;

/// Abstraction over the persistence layer for live matches and their timelines.
pub trait MatchStore: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    fn get_by_id_with_relations(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<MatchDetails>>;
    /// Compare-and-swap on the match version.
    ///
    /// Inside one transaction the store re-reads the record, fails with
    /// [`StorageError::VersionConflict`](crate::dao::storage::StorageError::VersionConflict)
    /// without writing anything when `version != expected_version`, and otherwise
    /// applies `mutate`, sets `version = expected_version + 1`, refreshes
    /// `updated_at` and commits. No implicit retry.
    fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    fn append_timeline_event(
        &self,
        event: NewTimelineEvent,
    ) -> BoxFuture<'static, StorageResult<TimelineEventEntity>>;
    /// Timeline of a match ordered by (minute, second, insertion order).
    fn list_timeline(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TimelineEventEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
