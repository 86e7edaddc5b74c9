//! Per-player statistics and the team scores derived from them.
//!
//! The stat upsert and the score recomputation run inside one version-checked
//! mutation, so two concurrent submissions against the same version yield one
//! success and one conflict, and the stored scores always equal the sum of the
//! stored records.

use std::time::SystemTime;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        MatchDetails, MatchEntity, PlayerStatEntity, TeamRoster, TimelineEventEntity,
        TimelineEventKind,
    },
    dto::scoring::PlayerStatSummary,
    error::ServiceError,
    services::{
        broadcast_events::{broadcast_score_updated, broadcast_timeline_event},
        concurrency::commit_versioned,
        lifecycle_service::{ensure_scorekeeper, log_plan},
        timeline::{Elapsed, record_event},
    },
    state::{MatchCommand, SharedState, Transition},
};

/// Raw score submission, as received from the command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreInput {
    pub player_id: Uuid,
    pub goals: i32,
    pub assists: i32,
    pub blocks: i32,
    pub turnovers: i32,
    /// Elapsed match time of the scoring play; no timeline entries without it.
    pub elapsed: Option<Elapsed>,
}

/// Validated, non-negative counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatCounters {
    pub goals: u32,
    pub assists: u32,
    pub blocks: u32,
    pub turnovers: u32,
}

impl ScoreInput {
    /// Reject negative counters.
    pub fn counters(&self) -> Result<StatCounters, ServiceError> {
        let field = |name: &str, value: i32| {
            u32::try_from(value)
                .map_err(|_| ServiceError::Validation(format!("{name} must not be negative")))
        };
        Ok(StatCounters {
            goals: field("goals", self.goals)?,
            assists: field("assists", self.assists)?,
            blocks: field("blocks", self.blocks)?,
            turnovers: field("turnovers", self.turnovers)?,
        })
    }
}

/// Overwrite the player's counters, creating the record on first submission.
pub fn upsert_player_stat(
    record: &mut MatchEntity,
    player_id: Uuid,
    counters: StatCounters,
    now: SystemTime,
) {
    match record
        .player_stats
        .iter_mut()
        .find(|stat| stat.player_id == player_id)
    {
        Some(stat) => {
            stat.goals = counters.goals;
            stat.assists = counters.assists;
            stat.blocks = counters.blocks;
            stat.turnovers = counters.turnovers;
            stat.updated_at = now;
        }
        None => record.player_stats.push(PlayerStatEntity {
            id: Uuid::new_v4(),
            match_id: record.id,
            player_id,
            goals: counters.goals,
            assists: counters.assists,
            blocks: counters.blocks,
            turnovers: counters.turnovers,
            created_at: now,
            updated_at: now,
        }),
    }
}

/// Recompute both scores from the stat records, grouped by current roster membership.
pub fn tally_scores(record: &mut MatchEntity, home: &TeamRoster, away: &TeamRoster) {
    let goals_for = |roster: &TeamRoster| {
        record
            .player_stats
            .iter()
            .filter(|stat| roster.contains(stat.player_id))
            .map(|stat| stat.goals)
            .sum::<u32>()
    };
    let (home_score, away_score) = (goals_for(home), goals_for(away));
    record.home_score = home_score;
    record.away_score = away_score;
}

/// Record a player's counters and recompute the match score.
///
/// Goal and assist timeline entries are appended only when `input.elapsed`
/// is present; a goal without an assist is flagged as contested.
pub async fn record_score(
    state: &SharedState,
    match_id: Uuid,
    caller: Uuid,
    input: ScoreInput,
) -> Result<ScoreOutcome, ServiceError> {
    let counters = input.counters()?;
    let store = state.require_match_store().await?;
    let details = store.get_by_id_with_relations(match_id).await?;
    let plan = Transition::plan(&details.record, MatchCommand::RecordScore)?;
    ensure_scorekeeper(&details.record, caller, MatchCommand::RecordScore)?;
    log_plan(match_id, &plan);

    let player_id = input.player_id;
    if details.side_of(player_id).is_none() {
        return Err(ServiceError::Validation(format!(
            "player {player_id} is not on either roster of match {match_id}"
        )));
    }

    let (home, away) = (details.home.clone(), details.away.clone());
    let now = SystemTime::now();
    let record = commit_versioned(store.as_ref(), match_id, plan.expected_version, move |m| {
        upsert_player_stat(m, player_id, counters, now);
        tally_scores(m, &home, &away);
    })
    .await?;
    info!(
        %match_id,
        %player_id,
        version = record.version,
        home_score = record.home_score,
        away_score = record.away_score,
        "score recorded"
    );

    let details = details.with_record(record);
    let mut appended = Vec::new();
    if let Some(at) = input.elapsed {
        if counters.goals > 0 {
            let contested = counters.assists == 0;
            let description = if contested {
                "Contested goal scored"
            } else {
                "Goal scored"
            };
            let metadata = json!({
                "player_id": player_id,
                "goals": counters.goals,
                "contested": contested,
            });
            appended.extend(
                record_event(
                    store.as_ref(),
                    match_id,
                    TimelineEventKind::GoalScored,
                    at,
                    description,
                    Some(metadata),
                )
                .await,
            );
        }
        if counters.assists > 0 {
            let metadata = json!({
                "player_id": player_id,
                "assists": counters.assists,
            });
            appended.extend(
                record_event(
                    store.as_ref(),
                    match_id,
                    TimelineEventKind::AssistRecorded,
                    at,
                    "Assist recorded",
                    Some(metadata),
                )
                .await,
            );
        }
    }

    broadcast_score_updated(state, &details).await;
    for event in &appended {
        broadcast_timeline_event(state, event).await;
    }

    Ok(ScoreOutcome {
        details,
        timeline: appended,
    })
}

/// Outcome of [`record_score`]: the committed match and the timeline entries appended for it.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub details: MatchDetails,
    pub timeline: Vec<TimelineEventEntity>,
}

/// Per-player counters of a match joined with roster data.
pub async fn list_scores(
    state: &SharedState,
    match_id: Uuid,
) -> Result<Vec<PlayerStatSummary>, ServiceError> {
    let store = state.require_match_store().await?;
    let details = store.get_by_id_with_relations(match_id).await?;

    Ok(details
        .record
        .player_stats
        .iter()
        .map(|stat| PlayerStatSummary::from_stat(stat, &details))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Barrier;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::MatchStore,
            models::{MatchStatus, PlayerEntity, TeamEntity},
        },
        dto::sse::{EVENT_CONNECTED, EVENT_GOAL_SCORED, EVENT_SCORE_UPDATED},
        services::{
            lifecycle_service::{end_match, finish_match, start_match},
            testing::{Fixture, GatedReads, TimelineDown, fixture, fixture_with},
        },
        state::AppState,
    };

    fn roster(players: &[Uuid]) -> TeamRoster {
        let team_id = Uuid::new_v4();
        TeamRoster {
            team: TeamEntity {
                id: team_id,
                name: "Team".into(),
            },
            players: players
                .iter()
                .map(|id| PlayerEntity {
                    id: *id,
                    name: id.to_string(),
                    team_id: Some(team_id),
                    jersey_number: None,
                })
                .collect(),
        }
    }

    fn counters(goals: u32, assists: u32) -> StatCounters {
        StatCounters {
            goals,
            assists,
            ..StatCounters::default()
        }
    }

    fn blank_match() -> MatchEntity {
        MatchEntity::scheduled("Final", Uuid::new_v4(), Uuid::new_v4(), None, SystemTime::now(), 90)
    }

    #[test]
    fn negative_counters_are_rejected() {
        let input = ScoreInput {
            player_id: Uuid::new_v4(),
            goals: 1,
            assists: 0,
            blocks: -2,
            turnovers: 0,
            elapsed: None,
        };
        assert!(matches!(input.counters(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn upsert_overwrites_instead_of_appending() {
        let mut record = blank_match();
        let player = Uuid::new_v4();

        upsert_player_stat(&mut record, player, counters(1, 0), SystemTime::now());
        upsert_player_stat(&mut record, player, counters(3, 2), SystemTime::now());
        upsert_player_stat(&mut record, player, counters(3, 2), SystemTime::now());

        assert_eq!(record.player_stats.len(), 1);
        let stat = record.player_stat(player).unwrap();
        assert_eq!((stat.goals, stat.assists), (3, 2));
    }

    #[test]
    fn scores_follow_roster_membership() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let home = roster(&[a, b]);
        let away = roster(&[c]);
        let mut record = blank_match();

        upsert_player_stat(&mut record, a, counters(2, 0), SystemTime::now());
        upsert_player_stat(&mut record, b, counters(1, 1), SystemTime::now());
        upsert_player_stat(&mut record, c, counters(4, 0), SystemTime::now());
        // Transferred off both rosters: still stored, no longer counted.
        upsert_player_stat(&mut record, Uuid::new_v4(), counters(9, 0), SystemTime::now());
        tally_scores(&mut record, &home, &away);

        assert_eq!((record.home_score, record.away_score), (3, 4));
    }

    async fn started() -> Fixture {
        let fx = fixture().await;
        start_match(&fx.state, fx.match_id, fx.scorekeeper, None)
            .await
            .unwrap();
        fx
    }

    #[tokio::test]
    async fn contested_goal_updates_score_and_timeline() {
        let fx = started().await;

        let outcome = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 1, 0),
        )
        .await
        .unwrap();

        let record = &outcome.details.record;
        assert_eq!((record.home_score, record.away_score), (1, 0));
        assert_eq!(record.version, 3);
        assert_eq!(outcome.timeline.len(), 1);
        let goal = &outcome.timeline[0];
        assert_eq!(goal.kind, TimelineEventKind::GoalScored);
        assert_eq!(goal.description, "Contested goal scored");
        assert_eq!((goal.minute, goal.second), (10, 5));
        assert_eq!(
            goal.metadata.as_ref().unwrap()["contested"],
            serde_json::Value::Bool(true)
        );
    }

    #[tokio::test]
    async fn assisted_goal_appends_goal_and_assist() {
        let fx = started().await;

        let outcome = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.away_player, 2, 1),
        )
        .await
        .unwrap();

        let kinds: Vec<_> = outcome.timeline.iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            [TimelineEventKind::GoalScored, TimelineEventKind::AssistRecorded]
        );
        assert_eq!(outcome.timeline[0].description, "Goal scored");
        assert_eq!(outcome.details.record.away_score, 2);
    }

    #[tokio::test]
    async fn missing_elapsed_time_skips_timeline() {
        let fx = started().await;
        let mut input = fx.score(fx.home_player, 1, 1);
        input.elapsed = None;

        let outcome = record_score(&fx.state, fx.match_id, fx.scorekeeper, input)
            .await
            .unwrap();

        assert!(outcome.timeline.is_empty());
        assert_eq!(outcome.details.record.home_score, 1);
        // Only the kick-off entry.
        assert_eq!(fx.store.list_timeline(fx.match_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sequential_submissions_sum_per_team() {
        let fx = started().await;

        for input in [
            fx.score(fx.home_player, 2, 0),
            fx.score(fx.home_teammate, 1, 1),
            fx.score(fx.away_player, 1, 0),
            // Overwrite, not increment.
            fx.score(fx.home_player, 3, 0),
        ] {
            record_score(&fx.state, fx.match_id, fx.scorekeeper, input)
                .await
                .unwrap();
        }

        let record = fx.record().await;
        assert_eq!((record.home_score, record.away_score), (4, 1));
        assert_eq!(record.player_stats.len(), 3);
        assert_eq!(record.player_stat(fx.home_player).unwrap().goals, 3);
    }

    #[tokio::test]
    async fn scores_can_be_corrected_after_finish_but_not_after_end() {
        let fx = started().await;
        finish_match(&fx.state, fx.match_id, fx.scorekeeper)
            .await
            .unwrap();

        let outcome = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 1, 0),
        )
        .await
        .unwrap();
        assert_eq!(outcome.details.record.status, MatchStatus::Finished);

        end_match(&fx.state, fx.match_id, fx.scorekeeper)
            .await
            .unwrap();
        let err = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 2, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition(_)));
        assert_eq!(fx.record().await.home_score, 1);
    }

    #[tokio::test]
    async fn scheduled_match_rejects_scores() {
        let fx = fixture().await;
        let err = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 1, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn off_roster_player_and_wrong_caller_are_rejected() {
        let fx = started().await;
        let before = fx.record().await;

        let err = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(Uuid::new_v4(), 1, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = record_score(
            &fx.state,
            fx.match_id,
            Uuid::new_v4(),
            fx.score(fx.home_player, 1, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let mut negative = fx.score(fx.home_player, 1, 0);
        negative.turnovers = -1;
        let err = record_score(&fx.state, fx.match_id, fx.scorekeeper, negative)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert_eq!(fx.record().await, before);
    }

    #[tokio::test]
    async fn submissions_read_at_the_same_version_conflict() {
        let fx = started().await;
        let gated = AppState::with_store(
            AppConfig::default(),
            Arc::new(GatedReads {
                inner: fx.store.clone(),
                gate: Arc::new(Barrier::new(2)),
            }),
        );

        let (first, second) = tokio::join!(
            record_score(
                &gated,
                fx.match_id,
                fx.scorekeeper,
                fx.score(fx.home_player, 1, 0),
            ),
            record_score(
                &gated,
                fx.match_id,
                fx.scorekeeper,
                fx.score(fx.home_teammate, 1, 0),
            ),
        );

        let results = [first, second];
        let committed = results.iter().filter(|result| result.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|result| matches!(result, Err(ServiceError::VersionConflict { .. })))
            .count();
        assert_eq!((committed, conflicts), (1, 1));

        let record = fx.record().await;
        let stored_goals: u32 = record.player_stats.iter().map(|stat| stat.goals).sum();
        assert_eq!(record.player_stats.len(), 1);
        assert_eq!(record.home_score, stored_goals);
        assert_eq!(record.home_score, 1);
        assert_eq!(record.version, 3);
    }

    #[tokio::test]
    async fn score_survives_an_unreachable_timeline() {
        let fx = fixture_with(|store| Arc::new(TimelineDown(store)) as Arc<dyn MatchStore>).await;
        start_match(&fx.state, fx.match_id, fx.scorekeeper, None)
            .await
            .unwrap();
        let mut subscription = fx.state.broker().subscribe(fx.match_id).await.unwrap();

        let outcome = record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 1, 1),
        )
        .await
        .unwrap();

        assert!(outcome.timeline.is_empty());
        let record = fx.record().await;
        assert_eq!(record.home_score, 1);
        assert_eq!(record.version, 3);
        assert!(fx.store.list_timeline(fx.match_id).await.unwrap().is_empty());

        assert_eq!(subscription.recv().await.unwrap().event, EVENT_CONNECTED);
        assert_eq!(subscription.recv().await.unwrap().event, EVENT_SCORE_UPDATED);
    }

    #[tokio::test]
    async fn subscribers_see_score_then_goal() {
        let fx = started().await;
        let mut subscription = fx.state.broker().subscribe(fx.match_id).await.unwrap();

        record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.home_player, 1, 0),
        )
        .await
        .unwrap();

        assert_eq!(subscription.recv().await.unwrap().event, EVENT_CONNECTED);
        let score = subscription.recv().await.unwrap();
        assert_eq!(score.event, EVENT_SCORE_UPDATED);
        assert!(score.data.contains("\"home_score\":1"));
        assert_eq!(subscription.recv().await.unwrap().event, EVENT_GOAL_SCORED);
    }

    #[tokio::test]
    async fn list_scores_joins_player_names() {
        let fx = started().await;
        record_score(
            &fx.state,
            fx.match_id,
            fx.scorekeeper,
            fx.score(fx.away_player, 1, 0),
        )
        .await
        .unwrap();

        let scores = list_scores(&fx.state, fx.match_id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].player_name.as_deref(), Some("Cy"));
    }
}
