//! Game progression state machine
//!
//! Owns track selection without replacement, scoring with a zero floor,
//! buzz-in arbitration, per-question disqualification and the single
//! transition into `Completed`.

pub mod export;
pub mod history;
mod scoring;
mod selection;

use crate::config::GameConfig;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use history::{EndReason, GameHistory, GameResult, TeamResult, TeamStats};
pub use selection::TrackSelection;

/// Mixtape Duel is played by exactly two teams
pub const TEAM_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Setup,
    InProgress,
    RoundResolving,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Shuffle,
    Sequential,
}

/// How a round ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundResolution {
    /// A team scored
    Answered { team_id: TeamId },
    /// Every attempt was wrong
    NobodyScored,
    /// Nobody answered in time, or the track couldn't be played
    Skipped,
    /// The score limit ended the game during this round
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundState {
    /// 1-based round counter
    pub number: u32,
    pub track_index: usize,
    /// Index handed to the question generator; decides the question format
    pub question_index: usize,
    pub question: Option<Question>,
    pub disqualified: BTreeSet<TeamId>,
    pub buzzed_team: Option<TeamId>,
    pub resolution: Option<RoundResolution>,
}

impl RoundState {
    fn new(number: u32, track_index: usize, question_index: usize) -> Self {
        Self {
            number,
            track_index,
            question_index,
            question: None,
            disqualified: BTreeSet::new(),
            buzzed_team: None,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOutcome {
    pub winner_id: TeamId,
    pub winner_name: String,
    pub reason: EndReason,
    pub winning_score: u32,
    pub total_questions: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session needs exactly {expected} teams, got {actual}")]
    TeamCount { expected: usize, actual: usize },

    #[error("Duplicate team id: {0}")]
    DuplicateTeam(TeamId),

    #[error("Playlist has no tracks")]
    EmptyPlaylist,

    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("The game is already over")]
    GameOver,

    #[error("No round in progress")]
    NoActiveRound,

    #[error("The current round has not been resolved yet")]
    RoundInProgress,

    #[error("The question for this round is still loading")]
    QuestionNotReady,

    #[error("This round already has a question")]
    QuestionAlreadySet,

    #[error("Question is about track '{got}' but the round plays '{expected}'")]
    TrackMismatch { expected: TrackId, got: TrackId },

    #[error("This action needs a {0} question")]
    WrongFormat(&'static str),

    #[error("Unknown team: {0}")]
    UnknownTeam(TeamId),

    #[error("No team has buzzed in")]
    NoBuzz,
}

/// What a player action did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    AnswerCorrect { team_id: TeamId },
    AnswerIncorrect { team_id: TeamId, all_disqualified: bool },
    /// The team was already disqualified from this question
    AnswerIgnored { team_id: TeamId },
    BuzzAccepted { team_id: TeamId },
    /// Another team holds the buzzer
    BuzzIgnored { team_id: TeamId, buzzed_team: TeamId },
    BuzzCleared { team_id: TeamId },
    BuzzJudged { team_id: TeamId, correct: bool },
    RoundSkipped,
}

/// Everything the shell needs to render the session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub mode: SelectionMode,
    pub playlist_name: String,
    pub teams: Vec<Team>,
    pub round_number: u32,
    pub round_resolved: bool,
    pub buzzed_team: Option<TeamId>,
    pub disqualified: Vec<TeamId>,
    pub played_count: usize,
    pub total_tracks: usize,
    pub outcome: Option<GameOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    #[serde(flatten)]
    pub event: SessionEvent,
    pub view: SessionView,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    config: GameConfig,
    playlist: Playlist,
    teams: Vec<Team>,
    phase: SessionPhase,
    mode: SelectionMode,
    played: BTreeSet<usize>,
    /// Next index in sequential mode; every index below it has been played
    cursor: usize,
    rounds_played: u32,
    round: Option<RoundState>,
    outcome: Option<GameOutcome>,
}

impl GameSession {
    pub fn new(playlist: Playlist, teams: Vec<Team>, config: GameConfig) -> Result<Self, SessionError> {
        if teams.len() != TEAM_COUNT {
            return Err(SessionError::TeamCount {
                expected: TEAM_COUNT,
                actual: teams.len(),
            });
        }
        if teams[0].id == teams[1].id {
            return Err(SessionError::DuplicateTeam(teams[0].id.clone()));
        }
        if playlist.tracks.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }

        let mode = if config.shuffle {
            SelectionMode::Shuffle
        } else {
            SelectionMode::Sequential
        };

        let teams = teams
            .into_iter()
            .map(|team| Team { score: 0, ..team })
            .collect();

        Ok(Self {
            config,
            playlist,
            teams,
            phase: SessionPhase::Setup,
            mode,
            played: BTreeSet::new(),
            cursor: 0,
            rounds_played: 0,
            round: None,
            outcome: None,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    pub fn current_round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    pub fn played_indices(&self) -> &BTreeSet<usize> {
        &self.played
    }

    pub fn is_completed(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    /// Check if a phase transition is valid
    fn is_valid_phase_transition(from: SessionPhase, to: SessionPhase) -> bool {
        use SessionPhase::*;

        matches!(
            (from, to),
            (Setup, InProgress)
                | (InProgress, RoundResolving)
                | (RoundResolving, InProgress)
                | (InProgress, Completed)
                | (RoundResolving, Completed)
                // every track skipped before a round could start
                | (Setup, Completed)
                | (Completed, Setup)
        )
    }

    fn transition_phase(&mut self, to: SessionPhase) -> Result<(), SessionError> {
        if !Self::is_valid_phase_transition(self.phase, to) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("Session phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::GameOver);
        }
        if self.mode != mode {
            tracing::info!("Track selection mode set to {:?}", mode);
            self.mode = mode;
        }
        Ok(())
    }

    /// Attach the generated question to the round that is waiting for it
    pub fn set_question(&mut self, question: Question) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::GameOver);
        }
        let expected = self.current_track().map(|t| t.id.clone());
        let round = self
            .round
            .as_mut()
            .filter(|r| !r.is_resolved())
            .ok_or(SessionError::NoActiveRound)?;

        if round.question.is_some() {
            return Err(SessionError::QuestionAlreadySet);
        }
        if let Some(expected) = expected {
            if question.track.id != expected {
                return Err(SessionError::TrackMismatch {
                    expected,
                    got: question.track.id,
                });
            }
        }

        round.question = Some(question);
        Ok(())
    }

    /// Track of the current round
    pub fn current_track(&self) -> Option<&Track> {
        self.round
            .as_ref()
            .and_then(|r| self.playlist.tracks.get(r.track_index))
    }

    /// Start over with the same teams and playlist
    pub fn rematch(&mut self) {
        for team in &mut self.teams {
            team.score = 0;
        }
        self.played.clear();
        self.cursor = 0;
        self.rounds_played = 0;
        self.round = None;
        self.outcome = None;
        self.phase = SessionPhase::Setup;
        tracing::info!("Rematch: scores reset for '{}'", self.playlist.name);
    }

    pub fn view(&self) -> SessionView {
        let round = self.round.as_ref();
        SessionView {
            phase: self.phase,
            mode: self.mode,
            playlist_name: self.playlist.name.clone(),
            teams: self.teams.clone(),
            round_number: round.map(|r| r.number).unwrap_or(0),
            round_resolved: round.is_some_and(RoundState::is_resolved),
            buzzed_team: round.and_then(|r| r.buzzed_team.clone()),
            disqualified: round
                .map(|r| r.disqualified.iter().cloned().collect())
                .unwrap_or_default(),
            played_count: self.played.len(),
            total_tracks: self.playlist.tracks.len(),
            outcome: self.outcome.clone(),
        }
    }

    fn update(&self, event: SessionEvent) -> SessionUpdate {
        SessionUpdate {
            event,
            view: self.view(),
        }
    }

    /// Build the history entry for a finished game
    pub fn result(&self) -> Option<GameResult> {
        let outcome = self.outcome.as_ref()?;
        Some(GameResult {
            id: ulid::Ulid::new().to_string(),
            date: chrono::Utc::now().to_rfc3339(),
            playlist_name: self.playlist.name.clone(),
            teams: self
                .teams
                .iter()
                .map(|t| TeamResult {
                    name: t.name.clone(),
                    score: t.score,
                })
                .collect(),
            winner: outcome.winner_name.clone(),
            total_questions: outcome.total_questions,
            end_reason: outcome.reason,
            winning_score: Some(outcome.winning_score),
        })
    }
}
