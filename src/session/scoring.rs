use super::*;

impl GameSession {
    fn ensure_team(&self, team_id: &str) -> Result<(), SessionError> {
        if self.team(team_id).is_some() {
            Ok(())
        } else {
            Err(SessionError::UnknownTeam(team_id.to_string()))
        }
    }

    fn active_round_mut(&mut self) -> Result<&mut RoundState, SessionError> {
        if self.is_completed() {
            return Err(SessionError::GameOver);
        }
        self.round
            .as_mut()
            .filter(|r| !r.is_resolved())
            .ok_or(SessionError::NoActiveRound)
    }

    /// Apply `delta` with the score clamped at zero
    fn adjust_score(&mut self, team_id: &str, delta: i32) -> u32 {
        match self.teams.iter_mut().find(|t| t.id == team_id) {
            Some(team) => {
                team.score = team.score.saturating_add_signed(delta);
                tracing::info!("{} {:+} -> {} points", team.name, delta, team.score);
                team.score
            }
            None => 0,
        }
    }

    fn resolve_round(&mut self, resolution: RoundResolution) -> Result<(), SessionError> {
        if let Some(round) = self.round.as_mut() {
            round.buzzed_team = None;
            round.resolution = Some(resolution);
        }
        self.transition_phase(SessionPhase::RoundResolving)
    }

    /// Must run right after every point award, before anything else can score
    fn check_score_limit(&mut self, team_id: &str) -> Option<GameOutcome> {
        let score = self.team(team_id)?.score;
        if score >= self.config.score_limit {
            Some(self.complete(team_id, EndReason::ScoreLimit))
        } else {
            None
        }
    }

    /// The one way into `Completed`. Later calls return the first outcome.
    pub(super) fn complete(&mut self, winner_id: &str, reason: EndReason) -> GameOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let (winner_name, winning_score) = self
            .team(winner_id)
            .map(|t| (t.name.clone(), t.score))
            .unwrap_or_default();

        let outcome = GameOutcome {
            winner_id: winner_id.to_string(),
            winner_name,
            reason,
            winning_score,
            total_questions: self.rounds_played,
        };

        if let Some(round) = self.round.as_mut() {
            round.buzzed_team = None;
            round.resolution.get_or_insert(RoundResolution::GameOver);
        }

        if let Err(e) = self.transition_phase(SessionPhase::Completed) {
            tracing::error!("Forcing completion: {}", e);
            self.phase = SessionPhase::Completed;
        }

        tracing::info!(
            "Game over: {} wins with {} points ({:?})",
            outcome.winner_name,
            outcome.winning_score,
            outcome.reason
        );

        self.outcome = Some(outcome.clone());
        outcome
    }

    /// A team dropped an option on its corner
    pub fn record_answer(&mut self, team_id: &str, answer: &str) -> Result<SessionUpdate, SessionError> {
        self.ensure_team(team_id)?;
        let team_count = self.teams.len();

        let round = self.active_round_mut()?;
        let question = round.question.as_ref().ok_or(SessionError::QuestionNotReady)?;
        if question.is_buzz_in() {
            return Err(SessionError::WrongFormat("drag-to-corner"));
        }

        let team_id = team_id.to_string();
        if round.disqualified.contains(&team_id) {
            tracing::debug!("Ignoring answer from disqualified team {}", team_id);
            return Ok(self.update(SessionEvent::AnswerIgnored { team_id }));
        }

        if answer == question.correct_answer {
            self.adjust_score(&team_id, 1);
            self.resolve_round(RoundResolution::Answered {
                team_id: team_id.clone(),
            })?;
            self.check_score_limit(&team_id);
            return Ok(self.update(SessionEvent::AnswerCorrect { team_id }));
        }

        round.disqualified.insert(team_id.clone());
        let all_disqualified = round.disqualified.len() >= team_count;
        tracing::info!("Wrong answer, team {} disqualified from this question", team_id);

        self.adjust_score(&team_id, -1);
        if all_disqualified {
            tracing::info!("All teams disqualified, revealing answer");
            self.resolve_round(RoundResolution::NobodyScored)?;
        }

        Ok(self.update(SessionEvent::AnswerIncorrect {
            team_id,
            all_disqualified,
        }))
    }

    /// First buzz of the round wins; the rest are ignored until it is cleared
    pub fn record_buzz(&mut self, team_id: &str) -> Result<SessionUpdate, SessionError> {
        self.ensure_team(team_id)?;

        let round = self.active_round_mut()?;
        let question = round.question.as_ref().ok_or(SessionError::QuestionNotReady)?;
        if !question.is_buzz_in() {
            return Err(SessionError::WrongFormat("buzz-in"));
        }

        let team_id = team_id.to_string();
        if let Some(buzzed_team) = round.buzzed_team.clone() {
            return Ok(self.update(SessionEvent::BuzzIgnored {
                team_id,
                buzzed_team,
            }));
        }

        round.buzzed_team = Some(team_id.clone());
        tracing::info!("Team {} buzzed in", team_id);
        Ok(self.update(SessionEvent::BuzzAccepted { team_id }))
    }

    /// The buzzed team didn't answer; reopen the buzzer for everyone
    pub fn clear_buzz(&mut self) -> Result<SessionUpdate, SessionError> {
        let round = self.active_round_mut()?;
        let team_id = round.buzzed_team.take().ok_or(SessionError::NoBuzz)?;
        tracing::info!("Buzz from {} cleared without an answer", team_id);
        Ok(self.update(SessionEvent::BuzzCleared { team_id }))
    }

    /// Host verdict on the buzzed team's spoken answer
    pub fn judge_buzz(&mut self, correct: bool) -> Result<SessionUpdate, SessionError> {
        let round = self.active_round_mut()?;
        let team_id = round.buzzed_team.take().ok_or(SessionError::NoBuzz)?;

        if correct {
            self.adjust_score(&team_id, 1);
            self.resolve_round(RoundResolution::Answered {
                team_id: team_id.clone(),
            })?;
            self.check_score_limit(&team_id);
        } else {
            self.adjust_score(&team_id, -1);
            self.resolve_round(RoundResolution::NobodyScored)?;
        }

        Ok(self.update(SessionEvent::BuzzJudged { team_id, correct }))
    }

    /// Nobody answered before the preview ended, or the track can't play
    pub fn skip_round(&mut self) -> Result<SessionUpdate, SessionError> {
        self.active_round_mut()?;
        self.resolve_round(RoundResolution::Skipped)?;
        Ok(self.update(SessionEvent::RoundSkipped))
    }
}
