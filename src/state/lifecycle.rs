use std::fmt;

use thiserror::Error;

use crate::dao::models::{MatchEntity, MatchStatus};

/// Commands that can be applied to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCommand {
    /// Kick-off: `scheduled -> in_progress`.
    Start,
    /// Allocated time expired: `in_progress -> finished`.
    Finish,
    /// Final submission: `finished -> ended`.
    End,
    /// Add stoppage time. Self-loop on `in_progress`.
    RecordStoppage,
    /// Upsert player statistics. Self-loop on `in_progress` and `finished`.
    RecordScore,
}

impl MatchCommand {
    /// Stable name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchCommand::Start => "start",
            MatchCommand::Finish => "finish",
            MatchCommand::End => "end",
            MatchCommand::RecordStoppage => "record_stoppage",
            MatchCommand::RecordScore => "record_score",
        }
    }
}

impl fmt::Display for MatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a command is not allowed from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {command} cannot be applied while match is {from}")]
pub struct InvalidTransition {
    /// Status the match was in.
    pub from: MatchStatus,
    /// Rejected command.
    pub command: MatchCommand,
}

/// A validated transition, bound to the version it was planned against.
///
/// Committing goes through the version-checked store update, so a plan made
/// from a stale read fails with a conflict instead of applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status when the plan was made.
    pub from: MatchStatus,
    /// Status after the command applies.
    pub to: MatchStatus,
    /// Command being applied.
    pub command: MatchCommand,
    /// Version token read alongside `from`.
    pub expected_version: u64,
}

impl Transition {
    /// Validate `command` against the current record.
    pub fn plan(record: &MatchEntity, command: MatchCommand) -> Result<Self, InvalidTransition> {
        let to = next_status(record.status, command)?;
        Ok(Self {
            from: record.status,
            to,
            command,
            expected_version: record.version,
        })
    }
}

/// Transition table. Single step only; `ended` accepts nothing.
pub fn next_status(
    from: MatchStatus,
    command: MatchCommand,
) -> Result<MatchStatus, InvalidTransition> {
    let next = match (from, command) {
        (MatchStatus::Scheduled, MatchCommand::Start) => MatchStatus::InProgress,
        (MatchStatus::InProgress, MatchCommand::Finish) => MatchStatus::Finished,
        (MatchStatus::Finished, MatchCommand::End) => MatchStatus::Ended,
        (MatchStatus::InProgress, MatchCommand::RecordStoppage) => MatchStatus::InProgress,
        (MatchStatus::InProgress, MatchCommand::RecordScore) => MatchStatus::InProgress,
        (MatchStatus::Finished, MatchCommand::RecordScore) => MatchStatus::Finished,
        (from, command) => return Err(InvalidTransition { from, command }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;

    const ALL_COMMANDS: [MatchCommand; 5] = [
        MatchCommand::Start,
        MatchCommand::Finish,
        MatchCommand::End,
        MatchCommand::RecordStoppage,
        MatchCommand::RecordScore,
    ];

    fn record(status: MatchStatus) -> MatchEntity {
        let mut record = MatchEntity::scheduled(
            "Pool A",
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            SystemTime::now(),
            90,
        );
        record.status = status;
        record
    }

    #[test]
    fn full_happy_path_through_match() {
        let mut status = MatchStatus::Scheduled;
        for (command, expected) in [
            (MatchCommand::Start, MatchStatus::InProgress),
            (MatchCommand::RecordStoppage, MatchStatus::InProgress),
            (MatchCommand::RecordScore, MatchStatus::InProgress),
            (MatchCommand::Finish, MatchStatus::Finished),
            (MatchCommand::RecordScore, MatchStatus::Finished),
            (MatchCommand::End, MatchStatus::Ended),
        ] {
            status = next_status(status, command).unwrap();
            assert_eq!(status, expected, "after {command}");
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        let err = next_status(MatchStatus::Scheduled, MatchCommand::Finish).unwrap_err();
        assert_eq!(err.from, MatchStatus::Scheduled);
        assert_eq!(err.command, MatchCommand::Finish);

        assert!(next_status(MatchStatus::Scheduled, MatchCommand::End).is_err());
        assert!(next_status(MatchStatus::InProgress, MatchCommand::End).is_err());
        assert!(next_status(MatchStatus::InProgress, MatchCommand::Start).is_err());
    }

    #[test]
    fn ended_is_terminal() {
        for command in ALL_COMMANDS {
            assert!(
                next_status(MatchStatus::Ended, command).is_err(),
                "{command} accepted after end"
            );
        }
    }

    #[test]
    fn scoring_requires_live_or_finished_match() {
        assert!(next_status(MatchStatus::Scheduled, MatchCommand::RecordScore).is_err());
        assert!(next_status(MatchStatus::InProgress, MatchCommand::RecordScore).is_ok());
        assert!(next_status(MatchStatus::Finished, MatchCommand::RecordScore).is_ok());
    }

    #[test]
    fn stoppage_only_while_in_progress() {
        assert!(next_status(MatchStatus::Scheduled, MatchCommand::RecordStoppage).is_err());
        assert!(next_status(MatchStatus::Finished, MatchCommand::RecordStoppage).is_err());
    }

    #[test]
    fn plan_captures_version_and_endpoints() {
        let mut live = record(MatchStatus::InProgress);
        live.version = 4;

        let plan = Transition::plan(&live, MatchCommand::RecordStoppage).unwrap();
        assert_eq!(plan.expected_version, 4);
        assert_eq!((plan.from, plan.to), (MatchStatus::InProgress, MatchStatus::InProgress));

        let plan = Transition::plan(&live, MatchCommand::Finish).unwrap();
        assert_eq!(plan.command, MatchCommand::Finish);
        assert_eq!(plan.to, MatchStatus::Finished);
    }

    #[test]
    fn invalid_transition_message_names_command_and_status() {
        let err =
            Transition::plan(&record(MatchStatus::Ended), MatchCommand::RecordScore).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition: record_score cannot be applied while match is ended"
        );
    }
}
