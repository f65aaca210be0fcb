use super::*;
use crate::protocol::TeamSetup;
use crate::session::{SelectionMode, SessionUpdate, TeamStats, TrackSelection};
use crate::text::dominant_artists;
use crate::types::{Playlist, Question, Team, Track, TEAM_BUZZER_SOUNDS, TEAM_COLORS};
use crate::validator::{PlaylistValidator, ValidationVerdict};
use futures::future::BoxFuture;
use std::time::Duration;

/// A round that has started but has no question yet
pub struct PendingRound {
    game_id: String,
    round: u32,
    track: Track,
    question_index: usize,
    generator: Arc<QuestionGenerator>,
    rng: StdRng,
}

impl PendingRound {
    pub fn round(&self) -> u32 {
        self.round
    }
}

impl AppState {
    /// Pre-flight check the shell runs before offering a playlist
    pub fn validate_playlist(&self, tracks: &[Track]) -> ValidationVerdict {
        PlaylistValidator::from_config(&self.config).validate(tracks)
    }

    /// Start a new session, replacing any game in progress
    pub async fn setup_game(
        &self,
        playlist: Playlist,
        teams: Vec<TeamSetup>,
        dominant: Option<Vec<String>>,
        score_limit: Option<u32>,
        shuffle: Option<bool>,
    ) -> Result<SessionView, HostError> {
        let mut config = self.config.clone();
        if let Some(limit) = score_limit.filter(|l| *l > 0) {
            config.score_limit = limit;
        }
        if let Some(shuffle) = shuffle {
            config.shuffle = shuffle;
        }

        let generator = QuestionGenerator::new(playlist.tracks.clone(), &config);
        if !generator.is_valid() {
            return Err(HostError::InvalidPlaylist(generator.warnings().to_vec()));
        }

        let dominant = dominant_or_detected(dominant, &playlist.tracks, &config);
        if !dominant.is_empty() {
            tracing::info!("Excluding dominant artists from artist questions: {:?}", dominant);
        }

        let mut generator = generator.with_dominant_artists(&dominant);
        if let Some(trivia) = &self.trivia {
            generator = generator.with_trivia_source(trivia.clone());
        }

        let teams = teams
            .into_iter()
            .enumerate()
            .map(|(i, setup)| {
                Team::new(
                    setup.name,
                    setup
                        .color
                        .unwrap_or_else(|| TEAM_COLORS[i % TEAM_COLORS.len()].to_string()),
                    setup
                        .buzzer_sound
                        .unwrap_or_else(|| TEAM_BUZZER_SOUNDS[i % TEAM_BUZZER_SOUNDS.len()].to_string()),
                )
            })
            .collect();

        let session = GameSession::new(playlist, teams, config)?;
        let host = GameHost::new(session, generator, dominant.clone(), self.make_rng());
        let view = host.session.view();

        self.timers.lock().await.cancel_all();
        *self.host.lock().await = Some(host);

        tracing::info!(
            "Game set up: '{}' with {} tracks",
            view.playlist_name,
            view.total_tracks
        );
        self.broadcast(ServerMessage::GameReady {
            view: view.clone(),
            dominant_artists: dominant,
        });
        Ok(view)
    }

    /// Pick the next track and generate its question.
    ///
    /// Player input is refused with `QuestionNotReady` until the question
    /// is attached to the round.
    pub async fn next_question(self: &Arc<Self>) -> Result<(), HostError> {
        match self.start_round().await? {
            Some(pending) => self.generate_round(pending).await,
            None => Ok(()),
        }
    }

    /// Open a round on the next track, or finish the game when none are
    /// left. Returns the round still waiting for its question.
    pub async fn start_round(self: &Arc<Self>) -> Result<Option<PendingRound>, HostError> {
        let mut guard = self.host.lock().await;
        let host = guard.as_mut().ok_or(HostError::NoGame)?;

        let (track_index, question_index, track) = match host.session.select_next_track(&mut host.rng)? {
            TrackSelection::Next {
                track_index,
                question_index,
                track,
            } => (track_index, question_index, track),
            TrackSelection::Exhausted(_) => {
                let finished = host.take_result();
                drop(guard);
                if let Some((outcome, result)) = finished {
                    self.finish_game(outcome, result).await;
                }
                return Ok(None);
            }
        };

        let view = host.session.view();
        // Under the host lock so a skip can't schedule its advance for the old round
        self.timers.lock().await.begin_round(view.round_number);

        self.broadcast(ServerMessage::RoundStarted {
            round: view.round_number,
            track_index,
            question_index,
            track: track.clone(),
            view: view.clone(),
        });

        Ok(Some(PendingRound {
            game_id: host.game_id.clone(),
            round: view.round_number,
            track,
            question_index,
            generator: host.generator.clone(),
            rng: StdRng::from_rng(&mut host.rng),
        }))
    }

    /// Generate the question for a round opened by `start_round`. The host
    /// lock is free while generating, so the round may be skipped or the
    /// game replaced in the meantime.
    pub async fn generate_round(self: &Arc<Self>, pending: PendingRound) -> Result<(), HostError> {
        let PendingRound {
            game_id,
            round,
            track,
            question_index,
            generator,
            mut rng,
        } = pending;

        let generated = generator
            .generate_question(&track, question_index, &mut rng)
            .await;

        let mut guard = self.host.lock().await;
        let Some(host) = guard.as_mut().filter(|h| h.game_id == game_id) else {
            tracing::debug!("Game replaced while generating round {}", round);
            return Ok(());
        };
        let still_waiting = host
            .session
            .current_round()
            .is_some_and(|r| r.number == round && !r.is_resolved() && r.question.is_none());
        if !still_waiting {
            tracing::debug!("Round {} moved on before its question was ready", round);
            return Ok(());
        }

        match generated {
            Ok(question) => {
                host.session.set_question(question.clone())?;
                drop(guard);
                tracing::info!("Round {}: {:?} question ready", round, question.family);
                self.broadcast(ServerMessage::QuestionReady {
                    round,
                    question: question.clone(),
                });
                self.schedule_reveals(game_id, round, &question).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Question generation failed for '{}': {}", track.name, e);
                let update = host.session.skip_round()?;
                let delay = host.session.config().advance_delay;
                drop(guard);
                self.broadcast(ServerMessage::Update { update });
                self.schedule_advance(round, delay).await;
                Err(e.into())
            }
        }
    }

    /// One timer per distinct delay, each revealing the options that share it
    async fn schedule_reveals(self: &Arc<Self>, game_id: String, round: u32, question: &Question) {
        let Some(delays) = question.option_reveal_delays() else {
            return;
        };

        let mut waves: Vec<(f64, Vec<usize>)> = Vec::new();
        for (index, delay) in delays.iter().copied().enumerate() {
            match waves.iter_mut().find(|(d, _)| *d == delay) {
                Some((_, indices)) => indices.push(index),
                None => waves.push((delay, vec![index])),
            }
        }
        waves.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut timers = self.timers.lock().await;
        for (delay, indices) in waves {
            let state = self.clone();
            let game_id = game_id.clone();
            timers.schedule(Duration::from_secs_f64(delay.max(0.0)), async move {
                if state.round_is_open(&game_id, round).await {
                    state.broadcast(ServerMessage::OptionsRevealed { round, indices });
                }
            });
        }
    }

    async fn round_is_open(&self, game_id: &str, round: u32) -> bool {
        self.host.lock().await.as_ref().is_some_and(|h| {
            h.game_id == game_id
                && h.session
                    .current_round()
                    .is_some_and(|r| r.number == round && !r.is_resolved())
        })
    }

    /// Queue the next question once the answer has been on screen long enough.
    /// A zero delay leaves advancing to the host.
    async fn schedule_advance(self: &Arc<Self>, round: u32, delay: Duration) {
        let mut timers = self.timers.lock().await;
        timers.cancel_all();
        if delay.is_zero() {
            return;
        }
        tracing::debug!("Advancing past round {} in {:?}", round, delay);
        let state = self.clone();
        // next_question starts a new round and aborts this timer, so it
        // has to run in its own task
        timers.schedule(delay, async move {
            tokio::spawn(advance_task(state));
        });
    }

    async fn finish_game(&self, outcome: GameOutcome, result: GameResult) {
        self.timers.lock().await.cancel_all();
        self.history.write().await.record(result.clone());
        self.broadcast(ServerMessage::GameOver { outcome, result });
    }

    /// Apply a player or host action to the session, then broadcast it and
    /// handle the end of the round or the game
    async fn apply<F>(self: &Arc<Self>, action: F) -> Result<SessionUpdate, HostError>
    where
        F: FnOnce(&mut GameSession) -> Result<SessionUpdate, SessionError>,
    {
        let (update, finished, delay) = {
            let mut guard = self.host.lock().await;
            let host = guard.as_mut().ok_or(HostError::NoGame)?;
            let update = action(&mut host.session)?;
            (update, host.take_result(), host.session.config().advance_delay)
        };

        self.broadcast(ServerMessage::Update {
            update: update.clone(),
        });

        if let Some((outcome, result)) = finished {
            self.finish_game(outcome, result).await;
        } else if update.view.round_resolved {
            self.schedule_advance(update.view.round_number, delay).await;
        }

        Ok(update)
    }

    pub async fn record_answer(self: &Arc<Self>, team_id: &str, answer: &str) -> Result<SessionUpdate, HostError> {
        self.apply(|session| session.record_answer(team_id, answer)).await
    }

    pub async fn record_buzz(self: &Arc<Self>, team_id: &str) -> Result<SessionUpdate, HostError> {
        self.apply(|session| session.record_buzz(team_id)).await
    }

    pub async fn clear_buzz(self: &Arc<Self>) -> Result<SessionUpdate, HostError> {
        self.apply(|session| session.clear_buzz()).await
    }

    pub async fn judge_buzz(self: &Arc<Self>, correct: bool) -> Result<SessionUpdate, HostError> {
        self.apply(|session| session.judge_buzz(correct)).await
    }

    pub async fn skip_round(self: &Arc<Self>) -> Result<SessionUpdate, HostError> {
        self.apply(|session| session.skip_round()).await
    }

    pub async fn set_selection_mode(&self, mode: SelectionMode) -> Result<SessionView, HostError> {
        let view = {
            let mut guard = self.host.lock().await;
            let host = guard.as_mut().ok_or(HostError::NoGame)?;
            host.session.set_selection_mode(mode)?;
            host.session.view()
        };
        self.broadcast(ServerMessage::State {
            view: Some(view.clone()),
        });
        Ok(view)
    }

    /// Same teams and playlist, scores back to zero
    pub async fn rematch(&self) -> Result<SessionView, HostError> {
        let view = {
            let mut guard = self.host.lock().await;
            let host = guard.as_mut().ok_or(HostError::NoGame)?;
            host.session.rematch();
            host.result_recorded = false;
            host.game_id = ulid::Ulid::new().to_string();
            host.session.view()
        };
        self.timers.lock().await.cancel_all();
        self.broadcast(ServerMessage::State {
            view: Some(view.clone()),
        });
        Ok(view)
    }

    /// Drop the current game entirely
    pub async fn reset_game(&self) {
        self.timers.lock().await.cancel_all();
        *self.host.lock().await = None;
        tracing::info!("Game reset");
        self.broadcast(ServerMessage::State { view: None });
    }

    pub async fn team_stats(&self, team_name: &str) -> TeamStats {
        self.history.read().await.team_stats(team_name)
    }
}

/// Use the artists the shell supplied, else detect them from the playlist
pub(super) fn dominant_or_detected(
    supplied: Option<Vec<String>>,
    tracks: &[Track],
    config: &GameConfig,
) -> Vec<String> {
    if let Some(artists) = supplied {
        return artists;
    }
    let mut detected: Vec<String> = dominant_artists(tracks, config.dominant_artist_share)
        .into_iter()
        .collect();
    detected.sort();
    detected
}

/// Boxed so the advance timer can call back into `next_question`
fn advance_task(state: Arc<AppState>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Err(e) = state.next_question().await {
            tracing::warn!("Auto-advance failed: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_playlist, test_state, test_teams};
    use super::*;
    use crate::session::{SessionEvent, SessionPhase};
    use tokio::sync::broadcast::Receiver;

    async fn next_message<F>(rx: &mut Receiver<ServerMessage>, mut wanted: F) -> ServerMessage
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let msg = rx.recv().await.unwrap();
                if wanted(&msg) {
                    return msg;
                }
            }
        })
        .await
        .expect("message not broadcast in time")
    }

    async fn current_question(state: &AppState) -> Question {
        state
            .host
            .lock()
            .await
            .as_ref()
            .and_then(|h| h.session.current_round())
            .and_then(|r| r.question.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_questions_alternate_formats() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, None, None)
            .await
            .unwrap();

        for round in 0..4 {
            state.next_question().await.unwrap();
            let question = current_question(&state).await;
            assert_eq!(question.is_buzz_in(), round % 2 == 0, "round {round}");
            state.skip_round().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_reveal_broadcasts_every_option() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, None, None)
            .await
            .unwrap();

        // round 2 is the first multiple choice question
        state.next_question().await.unwrap();
        state.skip_round().await.unwrap();

        let mut rx = state.broadcast.subscribe();
        state.next_question().await.unwrap();
        let question = current_question(&state).await;
        let delays = question.option_reveal_delays().unwrap().to_vec();
        let waves = {
            let mut d = delays.clone();
            d.sort_by(f64::total_cmp);
            d.dedup();
            d.len()
        };

        let mut revealed = Vec::new();
        for _ in 0..waves {
            tokio::time::timeout(Duration::from_secs(6), async {
                loop {
                    if let ServerMessage::OptionsRevealed { round, indices } = rx.recv().await.unwrap() {
                        assert_eq!(round, 2);
                        revealed.extend(indices);
                        break;
                    }
                }
            })
            .await
            .expect("reveal timer never fired");
        }
        revealed.sort();
        assert_eq!(revealed, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_answer_cancels_pending_reveals() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, None, None)
            .await
            .unwrap();
        state.next_question().await.unwrap();
        state.skip_round().await.unwrap();
        state.next_question().await.unwrap();

        let question = current_question(&state).await;
        state
            .record_answer("unknown", &question.correct_answer)
            .await
            .unwrap_err();

        let team_id = state.get_view().await.unwrap().teams[0].id.clone();
        let update = state
            .record_answer(&team_id, &question.correct_answer)
            .await
            .unwrap();
        assert_eq!(update.event, SessionEvent::AnswerCorrect { team_id });
        assert_eq!(state.timers.lock().await.pending(), 0);
    }

    #[tokio::test]
    async fn test_auto_advance_after_resolution() {
        let config = GameConfig {
            advance_delay: Duration::from_millis(20),
            ..GameConfig::default()
        };
        let state = Arc::new(AppState::new(config).with_seed(3));
        state
            .setup_game(test_playlist(), test_teams(), None, None, None)
            .await
            .unwrap();

        let mut rx = state.broadcast.subscribe();
        state.next_question().await.unwrap();
        state.skip_round().await.unwrap();

        let msg = next_message(&mut rx, |m| {
            matches!(m, ServerMessage::RoundStarted { round: 2, .. })
        })
        .await;
        assert!(matches!(msg, ServerMessage::RoundStarted { question_index: 1, .. }));
    }

    #[tokio::test]
    async fn test_skip_before_question_still_auto_advances() {
        let config = GameConfig {
            advance_delay: Duration::from_millis(20),
            ..GameConfig::default()
        };
        let state = Arc::new(AppState::new(config).with_seed(3));
        state
            .setup_game(test_playlist(), test_teams(), None, None, None)
            .await
            .unwrap();
        let mut rx = state.broadcast.subscribe();

        let pending = state.start_round().await.unwrap().unwrap();
        assert_eq!(pending.round(), 1);
        assert_eq!(state.timers.lock().await.current_round(), 1);

        // skipped while the question is still being generated
        state.skip_round().await.unwrap();
        state.generate_round(pending).await.unwrap();

        next_message(&mut rx, |m| {
            matches!(m, ServerMessage::RoundStarted { round: 2, .. })
        })
        .await;
    }

    #[tokio::test]
    async fn test_win_records_history_once() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, Some(1), None)
            .await
            .unwrap();
        let mut rx = state.broadcast.subscribe();

        state.next_question().await.unwrap();
        let team_id = state.get_view().await.unwrap().teams[1].id.clone();
        state.record_buzz(&team_id).await.unwrap();
        let update = state.judge_buzz(true).await.unwrap();
        assert_eq!(update.view.phase, SessionPhase::Completed);

        let msg = next_message(&mut rx, |m| matches!(m, ServerMessage::GameOver { .. })).await;
        let ServerMessage::GameOver { outcome, result } = msg else {
            unreachable!()
        };
        assert_eq!(outcome.winner_id, team_id);
        assert_eq!(result.winner, "Red");

        assert!(state.next_question().await.is_err());
        assert_eq!(state.history.read().await.len(), 1);
        assert_eq!(state.team_stats("Red").await.wins, 1);
        assert_eq!(state.team_stats("Blue").await.losses, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_finishes_game() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, None, Some(false))
            .await
            .unwrap();

        for _ in 0..12 {
            state.next_question().await.unwrap();
            state.skip_round().await.unwrap();
        }
        state.next_question().await.unwrap();

        let view = state.get_view().await.unwrap();
        assert_eq!(view.phase, SessionPhase::Completed);
        assert_eq!(view.played_count, 12);
        assert_eq!(state.history.read().await.results()[0].total_questions, 12);
    }

    #[tokio::test]
    async fn test_rematch_and_reset() {
        let state = test_state();
        state
            .setup_game(test_playlist(), test_teams(), None, Some(1), None)
            .await
            .unwrap();
        state.next_question().await.unwrap();
        let team_id = state.get_view().await.unwrap().teams[0].id.clone();
        state.record_buzz(&team_id).await.unwrap();
        state.judge_buzz(true).await.unwrap();

        let view = state.rematch().await.unwrap();
        assert_eq!(view.phase, SessionPhase::Setup);
        assert!(view.teams.iter().all(|t| t.score == 0));
        state.next_question().await.unwrap();

        state.reset_game().await;
        assert!(state.get_view().await.is_none());
        assert_eq!(state.history.read().await.len(), 1);
    }
}
