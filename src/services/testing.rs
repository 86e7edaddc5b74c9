//! Seeded in-memory fixtures for service tests.

use std::{io, sync::Arc, time::SystemTime};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::Barrier;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        match_store::{MatchMutation, MatchStore, MemoryMatchStore},
        models::{
            MatchDetails, MatchEntity, NewTimelineEvent, PlayerEntity, TeamEntity,
            TimelineEventEntity, UserEntity,
        },
        storage::{StorageError, StorageResult},
    },
    services::{scoring_service::ScoreInput, timeline::Elapsed},
    state::{AppState, SharedState},
};

pub(crate) struct Fixture {
    pub state: SharedState,
    pub store: MemoryMatchStore,
    pub match_id: Uuid,
    pub scorekeeper: Uuid,
    pub home_player: Uuid,
    pub home_teammate: Uuid,
    pub away_player: Uuid,
}

impl Fixture {
    pub async fn record(&self) -> MatchEntity {
        self.store.get_by_id(self.match_id).await.unwrap()
    }

    pub fn score(&self, player_id: Uuid, goals: i32, assists: i32) -> ScoreInput {
        ScoreInput {
            player_id,
            goals,
            assists,
            blocks: 0,
            turnovers: 0,
            elapsed: Some(Elapsed {
                minute: 10,
                second: 5,
            }),
        }
    }
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(|store| Arc::new(store) as Arc<dyn MatchStore>).await
}

/// Seed a memory store, then install `wrap(store)` as the state's backend.
pub(crate) async fn fixture_with(
    wrap: impl FnOnce(MemoryMatchStore) -> Arc<dyn MatchStore>,
) -> Fixture {
    let store = MemoryMatchStore::new();
    let scorekeeper = Uuid::new_v4();
    store
        .insert_user(UserEntity {
            id: scorekeeper,
            name: "Sam Keeper".into(),
            email: "sam@example.com".into(),
        })
        .await;

    let home = TeamEntity {
        id: Uuid::new_v4(),
        name: "Riverside".into(),
    };
    let away = TeamEntity {
        id: Uuid::new_v4(),
        name: "Hilltop".into(),
    };
    store.insert_team(home.clone()).await;
    store.insert_team(away.clone()).await;

    let mut players = Vec::new();
    for (name, team_id, jersey) in [
        ("Ada", home.id, 7),
        ("Bea", home.id, 11),
        ("Cy", away.id, 4),
    ] {
        let player = PlayerEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            team_id: Some(team_id),
            jersey_number: Some(jersey),
        };
        players.push(player.id);
        store.insert_player(player).await;
    }

    let record = MatchEntity::scheduled(
        "Riverside vs Hilltop",
        home.id,
        away.id,
        Some(scorekeeper),
        SystemTime::now(),
        90,
    );
    let match_id = record.id;
    store.insert_match(record).await;

    let state = AppState::with_store(AppConfig::default(), wrap(store.clone()));

    Fixture {
        state,
        store,
        match_id,
        scorekeeper,
        home_player: players[0],
        home_teammate: players[1],
        away_player: players[2],
    }
}

/// Memory store whose timeline is unreachable.
pub(crate) struct TimelineDown(pub MemoryMatchStore);

/// Memory store that holds every relations read until `gate` releases it.
///
/// Readers wait after reading, so all of them observe the same version.
pub(crate) struct GatedReads {
    pub inner: MemoryMatchStore,
    pub gate: Arc<Barrier>,
}

impl MatchStore for TimelineDown {
    fn get_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        self.0.get_by_id(id)
    }

    fn get_by_id_with_relations(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<MatchDetails>> {
        self.0.get_by_id_with_relations(id)
    }

    fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        self.0.update_with_version(id, expected_version, mutate)
    }

    fn append_timeline_event(
        &self,
        _event: NewTimelineEvent,
    ) -> BoxFuture<'static, StorageResult<TimelineEventEntity>> {
        async {
            Err(StorageError::unavailable(
                "timeline collection unreachable".into(),
                io::Error::other("connection reset"),
            ))
        }
        .boxed()
    }

    fn list_timeline(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TimelineEventEntity>>> {
        self.0.list_timeline(match_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.0.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.0.try_reconnect()
    }
}

impl MatchStore for GatedReads {
    fn get_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        self.inner.get_by_id(id)
    }

    fn get_by_id_with_relations(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<MatchDetails>> {
        let read = self.inner.get_by_id_with_relations(id);
        let gate = self.gate.clone();
        async move {
            let details = read.await;
            gate.wait().await;
            details
        }
        .boxed()
    }

    fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        self.inner.update_with_version(id, expected_version, mutate)
    }

    fn append_timeline_event(
        &self,
        event: NewTimelineEvent,
    ) -> BoxFuture<'static, StorageResult<TimelineEventEntity>> {
        self.inner.append_timeline_event(event)
    }

    fn list_timeline(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TimelineEventEntity>>> {
        self.inner.list_timeline(match_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
