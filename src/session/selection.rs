use super::*;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Result of asking for the next track
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSelection {
    /// A new round started on this track
    Next {
        track_index: usize,
        question_index: usize,
        track: Track,
    },
    /// Every track has been played; the game is over
    Exhausted(GameOutcome),
}

impl GameSession {
    /// Pick the next unplayed track and open a round for it
    pub fn select_next_track<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<TrackSelection, SessionError> {
        match self.phase {
            SessionPhase::Completed => return Err(SessionError::GameOver),
            SessionPhase::InProgress => return Err(SessionError::RoundInProgress),
            SessionPhase::Setup | SessionPhase::RoundResolving => {}
        }

        loop {
            let Some(track_index) = self.next_track_index(rng) else {
                let outcome = self.finish_exhausted();
                return Ok(TrackSelection::Exhausted(outcome));
            };

            self.played.insert(track_index);
            let track = self.playlist.tracks[track_index].clone();

            if self.config.skip_tracks_without_preview && !track.has_preview() {
                tracing::warn!("Skipping '{}': no preview available", track.name);
                continue;
            }

            let question_index = self.rounds_played as usize;
            self.rounds_played += 1;
            self.round = Some(RoundState::new(self.rounds_played, track_index, question_index));
            self.transition_phase(SessionPhase::InProgress)?;

            tracing::info!(
                "Round {}: track {} '{}' ({} of {} played)",
                self.rounds_played,
                track_index,
                track.name,
                self.played.len(),
                self.playlist.tracks.len()
            );

            return Ok(TrackSelection::Next {
                track_index,
                question_index,
                track,
            });
        }
    }

    fn next_track_index<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        let total = self.playlist.tracks.len();
        if self.played.len() >= total {
            return None;
        }

        match self.mode {
            SelectionMode::Shuffle => {
                let unplayed: Vec<usize> = (0..total).filter(|i| !self.played.contains(i)).collect();
                unplayed.choose(rng).copied()
            }
            SelectionMode::Sequential => {
                // Shuffle rounds may have played tracks ahead of the cursor
                while self.cursor < total && self.played.contains(&self.cursor) {
                    self.cursor += 1;
                }
                if self.cursor >= total {
                    return None;
                }
                let index = self.cursor;
                self.cursor += 1;
                Some(index)
            }
        }
    }

    /// Highest score wins; ties go to the team listed first
    fn finish_exhausted(&mut self) -> GameOutcome {
        let leader = self
            .teams
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.score.cmp(&b.score).then(ib.cmp(ia)))
            .map(|(_, team)| team.id.clone())
            .unwrap_or_default();

        self.complete(&leader, EndReason::TracksExhausted)
    }
}
