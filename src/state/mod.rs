mod export;
mod game;

pub use game::PendingRound;

use crate::config::GameConfig;
use crate::enrichment::TriviaSource;
use crate::generator::{GeneratorError, QuestionGenerator};
use crate::protocol::ServerMessage;
use crate::session::export::SnapshotError;
use crate::session::{GameHistory, GameOutcome, GameResult, GameSession, SessionError, SessionView};
use crate::timers::RoundTimers;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No game has been set up")]
    NoGame,

    #[error("Playlist can't be used: {}", .0.join("; "))]
    InvalidPlaylist(Vec<String>),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl HostError {
    /// Stable code for `ServerMessage::Error`
    pub fn code(&self) -> &'static str {
        match self {
            HostError::NoGame => "NO_GAME",
            HostError::InvalidPlaylist(_) => "INVALID_PLAYLIST",
            HostError::Session(e) => match e {
                SessionError::TeamCount { .. }
                | SessionError::DuplicateTeam(_)
                | SessionError::EmptyPlaylist => "INVALID_SETUP",
                SessionError::GameOver => "GAME_OVER",
                SessionError::NoActiveRound => "NO_ACTIVE_ROUND",
                SessionError::RoundInProgress => "ROUND_IN_PROGRESS",
                SessionError::QuestionNotReady => "QUESTION_NOT_READY",
                SessionError::WrongFormat(_) => "WRONG_FORMAT",
                SessionError::UnknownTeam(_) => "UNKNOWN_TEAM",
                SessionError::NoBuzz => "NO_BUZZ",
                SessionError::InvalidTransition { .. }
                | SessionError::QuestionAlreadySet
                | SessionError::TrackMismatch { .. } => "INVALID_STATE",
            },
            HostError::Generator(_) => "GENERATION_FAILED",
            HostError::Snapshot(_) => "IMPORT_FAILED",
        }
    }
}

impl From<HostError> for ServerMessage {
    fn from(e: HostError) -> Self {
        ServerMessage::error(e.code(), e.to_string())
    }
}

/// The game currently being played, with everything needed to run it
pub struct GameHost {
    /// Distinguishes games so late async work can't touch a newer one
    pub game_id: String,
    pub session: GameSession,
    pub generator: Arc<QuestionGenerator>,
    pub dominant_artists: Vec<String>,
    rng: StdRng,
    result_recorded: bool,
}

impl GameHost {
    fn new(
        session: GameSession,
        generator: QuestionGenerator,
        dominant_artists: Vec<String>,
        rng: StdRng,
    ) -> Self {
        let result_recorded = session.is_completed();
        Self {
            game_id: ulid::Ulid::new().to_string(),
            session,
            generator: Arc::new(generator),
            dominant_artists,
            rng,
            result_recorded,
        }
    }

    /// The finished game's result, handed out once
    fn take_result(&mut self) -> Option<(GameOutcome, GameResult)> {
        if self.result_recorded {
            return None;
        }
        let outcome = self.session.outcome()?.clone();
        let result = self.session.result()?;
        self.result_recorded = true;
        Some((outcome, result))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub host: Arc<Mutex<Option<GameHost>>>,
    pub history: Arc<RwLock<GameHistory>>,
    pub timers: Arc<Mutex<RoundTimers>>,
    /// Broadcast channel for sending messages to all connected clients
    pub broadcast: broadcast::Sender<ServerMessage>,
    pub config: GameConfig,
    pub trivia: Option<Arc<dyn TriviaSource>>,
    /// Fixed seed for reproducible games
    seed: Option<u64>,
}

impl AppState {
    pub fn new(config: GameConfig) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            host: Arc::new(Mutex::new(None)),
            history: Arc::new(RwLock::new(GameHistory::new())),
            timers: Arc::new(Mutex::new(RoundTimers::new())),
            broadcast: tx,
            config,
            trivia: None,
            seed: None,
        }
    }

    pub fn with_trivia(mut self, trivia: Arc<dyn TriviaSource>) -> Self {
        self.trivia = Some(trivia);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn make_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Send to every connected client
    pub fn broadcast(&self, msg: ServerMessage) {
        // Ignore send errors (no receivers connected is fine)
        let _ = self.broadcast.send(msg);
    }

    pub async fn get_view(&self) -> Option<SessionView> {
        self.host.lock().await.as_ref().map(|h| h.session.view())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}
