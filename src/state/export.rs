use super::*;
use crate::session::export::SessionSnapshot;
use super::game::dominant_or_detected;

impl AppState {
    /// Snapshot of the active session and the game history
    pub async fn export_snapshot(&self) -> SessionSnapshot {
        let (session, dominant) = match self.host.lock().await.as_ref() {
            Some(h) => (Some(h.session.clone()), Some(h.dominant_artists.clone())),
            None => (None, None),
        };
        let history = self.history.read().await.results().to_vec();
        let snapshot = SessionSnapshot::new(session, history);
        match dominant {
            Some(artists) => snapshot.with_dominant_artists(artists),
            None => snapshot,
        }
    }

    /// Replace all state with a snapshot. Pending timers are dropped; an
    /// interrupted round can be skipped or answered once restored.
    pub async fn import_snapshot(&self, snapshot: SessionSnapshot) -> Result<Option<SessionView>, HostError> {
        snapshot.validate()?;

        let supplied = snapshot.dominant_artists;
        let host = match snapshot.session {
            Some(session) => {
                let tracks = session.playlist().tracks.clone();
                let config = session.config().clone();
                let generator = QuestionGenerator::new(tracks, &config);
                if !generator.is_valid() {
                    return Err(HostError::InvalidPlaylist(generator.warnings().to_vec()));
                }

                let dominant = dominant_or_detected(supplied, &session.playlist().tracks, &config);

                let mut generator = generator.with_dominant_artists(&dominant);
                if let Some(trivia) = &self.trivia {
                    generator = generator.with_trivia_source(trivia.clone());
                }
                Some(GameHost::new(session, generator, dominant, self.make_rng()))
            }
            None => None,
        };

        let view = host.as_ref().map(|h| h.session.view());

        self.timers.lock().await.cancel_all();
        *self.host.lock().await = host;
        *self.history.write().await = GameHistory::from_results(snapshot.history);

        tracing::info!(
            "Imported snapshot from {} (session: {})",
            snapshot.exported_at,
            view.is_some()
        );
        self.broadcast(ServerMessage::State { view: view.clone() });
        Ok(view)
    }
}
