use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MatchMutation, MatchStore};
use crate::dao::{
    models::{
        MatchDetails, MatchEntity, NewTimelineEvent, PlayerEntity, TeamEntity, TeamRoster,
        TimelineEventEntity, UserEntity,
    },
    storage::{StorageError, StorageResult},
};

/// Process-local store. The write lock is the transaction boundary.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    matches: HashMap<Uuid, MatchEntity>,
    teams: HashMap<Uuid, TeamEntity>,
    players: HashMap<Uuid, PlayerEntity>,
    users: HashMap<Uuid, UserEntity>,
    timeline: HashMap<Uuid, Vec<TimelineEventEntity>>,
    next_sequence: u64,
}

impl Tables {
    fn live_match(&self, id: Uuid) -> StorageResult<&MatchEntity> {
        self.matches
            .get(&id)
            .filter(|record| record.deleted_at.is_none())
            .ok_or_else(|| StorageError::match_not_found(id))
    }

    fn roster(&self, team_id: Uuid) -> StorageResult<TeamRoster> {
        let team = self
            .teams
            .get(&team_id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "team",
                id: team_id,
            })?;

        let mut players: Vec<PlayerEntity> = self
            .players
            .values()
            .filter(|player| player.team_id == Some(team_id))
            .cloned()
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(TeamRoster { team, players })
    }
}

impl MemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a team.
    pub async fn insert_team(&self, team: TeamEntity) {
        self.inner.write().await.teams.insert(team.id, team);
    }

    /// Register a player; membership follows `player.team_id`.
    pub async fn insert_player(&self, player: PlayerEntity) {
        self.inner.write().await.players.insert(player.id, player);
    }

    /// Register a user that may act as scorekeeper.
    pub async fn insert_user(&self, user: UserEntity) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Store a match record as-is.
    pub async fn insert_match(&self, record: MatchEntity) {
        self.inner.write().await.matches.insert(record.id, record);
    }
}

impl MatchStore for MemoryMatchStore {
    fn get_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let inner = self.inner.clone();
        async move {
            let tables = inner.read().await;
            tables.live_match(id).cloned()
        }
        .boxed()
    }

    fn get_by_id_with_relations(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<MatchDetails>> {
        let inner = self.inner.clone();
        async move {
            let tables = inner.read().await;
            let record = tables.live_match(id)?.clone();
            let home = tables.roster(record.home_team_id)?;
            let away = tables.roster(record.away_team_id)?;
            let scorekeeper = record
                .scorekeeper_id
                .and_then(|user_id| tables.users.get(&user_id).cloned());

            Ok(MatchDetails {
                record,
                home,
                away,
                scorekeeper,
            })
        }
        .boxed()
    }

    fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let inner = self.inner.clone();
        async move {
            let mut tables = inner.write().await;
            let current = tables.live_match(id)?;
            if current.version != expected_version {
                return Err(StorageError::VersionConflict {
                    id,
                    expected: expected_version,
                    actual: current.version,
                });
            }

            let mut next = current.clone();
            mutate(&mut next);
            next.id = id;
            next.version = expected_version + 1;
            next.updated_at = SystemTime::now();

            tables.matches.insert(id, next.clone());
            Ok(next)
        }
        .boxed()
    }

    fn append_timeline_event(
        &self,
        event: NewTimelineEvent,
    ) -> BoxFuture<'static, StorageResult<TimelineEventEntity>> {
        let inner = self.inner.clone();
        async move {
            let mut tables = inner.write().await;
            tables.live_match(event.match_id)?;

            tables.next_sequence += 1;
            let appended = TimelineEventEntity {
                id: Uuid::new_v4(),
                match_id: event.match_id,
                kind: event.kind,
                minute: event.minute,
                second: event.second,
                description: event.description,
                metadata: event.metadata,
                sequence: tables.next_sequence,
                created_at: SystemTime::now(),
            };

            tables
                .timeline
                .entry(appended.match_id)
                .or_default()
                .push(appended.clone());
            Ok(appended)
        }
        .boxed()
    }

    fn list_timeline(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TimelineEventEntity>>> {
        let inner = self.inner.clone();
        async move {
            let tables = inner.read().await;
            let mut events = tables.timeline.get(&match_id).cloned().unwrap_or_default();
            events.sort_by_key(TimelineEventEntity::order_key);
            Ok(events)
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }
}
