use crate::session::{GameOutcome, GameResult, SelectionMode, SessionUpdate, SessionView, TeamStats};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Team as entered on the setup screen; colour and buzzer fall back to the
/// default palette for its slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamSetup {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub buzzer_sound: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Pre-flight check before committing to a playlist
    ValidatePlaylist {
        tracks: Vec<Track>,
    },
    SetupGame {
        playlist: Playlist,
        teams: Vec<TeamSetup>,
        /// Artists to keep out of artist questions; detected from the
        /// playlist when omitted
        #[serde(default)]
        dominant_artists: Option<Vec<String>>,
        #[serde(default)]
        score_limit: Option<u32>,
        #[serde(default)]
        shuffle: Option<bool>,
    },
    SetSelectionMode {
        mode: SelectionMode,
    },
    NextQuestion,
    RecordAnswer {
        team_id: TeamId,
        answer: String,
    },
    RecordBuzz {
        team_id: TeamId,
    },
    /// The buzzed team didn't answer
    ClearBuzz,
    JudgeBuzz {
        correct: bool,
    },
    SkipRound,
    Rematch,
    /// Abandon the session and go back to setup
    ResetGame,
    GetState,
    GetTeamStats {
        team_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        view: Option<SessionView>,
        server_now: String,
    },
    PlaylistValidation {
        valid: bool,
        warnings: Vec<String>,
    },
    GameReady {
        view: SessionView,
        dominant_artists: Vec<String>,
    },
    /// A track was picked; the question is still being generated
    RoundStarted {
        round: u32,
        track_index: usize,
        question_index: usize,
        track: Track,
        view: SessionView,
    },
    QuestionReady {
        round: u32,
        question: Question,
    },
    /// Options that just became interactive
    OptionsRevealed {
        round: u32,
        indices: Vec<usize>,
    },
    Update {
        update: SessionUpdate,
    },
    State {
        view: Option<SessionView>,
    },
    GameOver {
        outcome: GameOutcome,
        result: GameResult,
    },
    TeamStats {
        stats: TeamStats,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}
