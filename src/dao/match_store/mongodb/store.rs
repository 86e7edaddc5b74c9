use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::{sync::RwLock, time::sleep};
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoCounterDocument, MongoMatchDocument, MongoPlayerDocument, MongoTeamDocument,
        MongoTimelineDocument, MongoUserDocument, doc_id, live_match_filter, uuid_as_binary,
    },
};
use crate::dao::{
    match_store::{MatchMutation, MatchStore},
    models::{
        MatchDetails, MatchEntity, NewTimelineEvent, PlayerEntity, TeamRoster,
        TimelineEventEntity, UserEntity,
    },
    storage::{StorageError, StorageResult},
};

const MATCH_COLLECTION_NAME: &str = "matches";
const TEAM_COLLECTION_NAME: &str = "teams";
const PLAYER_COLLECTION_NAME: &str = "players";
const USER_COLLECTION_NAME: &str = "users";
const TIMELINE_COLLECTION_NAME: &str = "timeline_events";
const COUNTER_COLLECTION_NAME: &str = "counters";

const OPEN_ATTEMPTS: u32 = 10;
const OPEN_INITIAL_DELAY: Duration = Duration::from_millis(250);
const OPEN_MAX_DELAY: Duration = Duration::from_secs(5);

/// [`MatchStore`] persisting to MongoDB.
///
/// Version checks are enforced by filtering the replacement on the version
/// that was read, so a concurrent writer makes the replace match nothing.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = open_database(&self.config).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

/// Open the match database, pinging with backoff until the server answers.
async fn open_database(config: &MongoConfig) -> MongoResult<Database> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut delay = OPEN_INITIAL_DELAY;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                debug!(database = %config.database_name, attempt, "match database reachable");
                return Ok(database);
            }
            Err(source) if attempt >= OPEN_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(
                    database = %config.database_name,
                    attempt,
                    error = %err,
                    "match database ping failed, retrying"
                );
                sleep(delay).await;
                delay = (delay * 2).min(OPEN_MAX_DELAY);
            }
        }
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = open_database(&config).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let timeline = self
            .collection::<MongoTimelineDocument>(TIMELINE_COLLECTION_NAME)
            .await;
        let timeline_index = IndexModel::builder()
            .keys(doc! {"match_id": 1, "minute": 1, "second": 1, "sequence": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("timeline_order_idx".to_owned()))
                    .build(),
            )
            .build();
        timeline
            .create_index(timeline_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TIMELINE_COLLECTION_NAME,
                index: "match_id,minute,second,sequence",
                source,
            })?;

        let players = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await;
        let player_index = IndexModel::builder()
            .keys(doc! {"team_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_team_idx".to_owned()))
                    .build(),
            )
            .build();
        players
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "team_id",
                source,
            })?;

        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.inner.database.read().await.collection::<T>(name)
    }

    async fn find_match(&self, id: Uuid) -> StorageResult<MatchEntity> {
        let document = self
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
            .await
            .find_one(live_match_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;

        document
            .map(Into::into)
            .ok_or_else(|| StorageError::match_not_found(id))
    }

    async fn find_roster(&self, team_id: Uuid) -> StorageResult<TeamRoster> {
        let team = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION_NAME)
            .await
            .find_one(doc_id(team_id))
            .await
            .map_err(|source| MongoDaoError::LoadTeam { id: team_id, source })?
            .ok_or(StorageError::NotFound {
                entity: "team",
                id: team_id,
            })?;

        let players: Vec<MongoPlayerDocument> = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await
            .find(doc! {"team_id": uuid_as_binary(team_id)})
            .sort(doc! {"name": 1})
            .await
            .map_err(|source| MongoDaoError::LoadTeam { id: team_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadTeam { id: team_id, source })?;

        Ok(TeamRoster {
            team: team.into(),
            players: players.into_iter().map(PlayerEntity::from).collect(),
        })
    }

    async fn find_user(&self, id: Uuid) -> StorageResult<Option<UserEntity>> {
        let user = self
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadUser { id, source })?;
        Ok(user.map(Into::into))
    }

    async fn find_details(&self, id: Uuid) -> StorageResult<MatchDetails> {
        let record = self.find_match(id).await?;
        let home = self.find_roster(record.home_team_id).await?;
        let away = self.find_roster(record.away_team_id).await?;
        let scorekeeper = match record.scorekeeper_id {
            Some(user_id) => self.find_user(user_id).await?,
            None => None,
        };

        Ok(MatchDetails {
            record,
            home,
            away,
            scorekeeper,
        })
    }

    async fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> StorageResult<MatchEntity> {
        let current = self.find_match(id).await?;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                id,
                expected: expected_version,
                actual: current.version,
            });
        }

        let mut next = current;
        mutate(&mut next);
        next.id = id;
        next.version = expected_version + 1;
        next.updated_at = SystemTime::now();

        let document: MongoMatchDocument = next.clone().into();
        let mut filter = live_match_filter(id);
        filter.insert("version", i64::try_from(expected_version).unwrap_or(i64::MAX));

        let result = self
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
            .await
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;

        if result.matched_count == 0 {
            // Lost the race between read and replace.
            let actual = self.find_match(id).await?.version;
            debug!(match_id = %id, expected_version, actual, "version check failed on replace");
            return Err(StorageError::VersionConflict {
                id,
                expected: expected_version,
                actual,
            });
        }

        Ok(next)
    }

    async fn next_sequence(&self, match_id: Uuid) -> StorageResult<u64> {
        let counter = self
            .collection::<MongoCounterDocument>(COUNTER_COLLECTION_NAME)
            .await
            .find_one_and_update(
                doc! {"_id": format!("timeline:{match_id}")},
                doc! {"$inc": {"value": 1_i64}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::AppendTimeline { match_id, source })?
            .ok_or(MongoDaoError::MissingCounter)?;

        Ok(u64::try_from(counter.value).unwrap_or_default())
    }

    async fn append_timeline_event(
        &self,
        event: NewTimelineEvent,
    ) -> StorageResult<TimelineEventEntity> {
        let match_id = event.match_id;
        self.find_match(match_id).await?;
        let sequence = self.next_sequence(match_id).await?;

        let appended = TimelineEventEntity {
            id: Uuid::new_v4(),
            match_id,
            kind: event.kind,
            minute: event.minute,
            second: event.second,
            description: event.description,
            metadata: event.metadata,
            sequence,
            created_at: SystemTime::now(),
        };

        let document: MongoTimelineDocument = appended.clone().into();
        self.collection::<MongoTimelineDocument>(TIMELINE_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendTimeline { match_id, source })?;

        Ok(appended)
    }

    async fn list_timeline(&self, match_id: Uuid) -> StorageResult<Vec<TimelineEventEntity>> {
        let documents: Vec<MongoTimelineDocument> = self
            .collection::<MongoTimelineDocument>(TIMELINE_COLLECTION_NAME)
            .await
            .find(doc! {"match_id": uuid_as_binary(match_id)})
            .sort(doc! {"minute": 1, "second": 1, "sequence": 1})
            .await
            .map_err(|source| MongoDaoError::ListTimeline { match_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTimeline { match_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl MatchStore for MongoMatchStore {
    fn get_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await })
    }

    fn get_by_id_with_relations(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<MatchDetails>> {
        let store = self.clone();
        Box::pin(async move { store.find_details(id).await })
    }

    fn update_with_version(
        &self,
        id: Uuid,
        expected_version: u64,
        mutate: MatchMutation,
    ) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_with_version(id, expected_version, mutate).await })
    }

    fn append_timeline_event(
        &self,
        event: NewTimelineEvent,
    ) -> BoxFuture<'static, StorageResult<TimelineEventEntity>> {
        let store = self.clone();
        Box::pin(async move { store.append_timeline_event(event).await })
    }

    fn list_timeline(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TimelineEventEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_timeline(match_id).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
