//! Finished games and per-team statistics

use crate::types::GameResultId;
use serde::{Deserialize, Serialize};

/// Most recent results kept; older ones are dropped
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ScoreLimit,
    TracksExhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamResult {
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameResult {
    pub id: GameResultId,
    /// RFC 3339 timestamp of when the game ended
    pub date: String,
    pub playlist_name: String,
    pub teams: Vec<TeamResult>,
    /// Winning team's name
    pub winner: String,
    pub total_questions: u32,
    pub end_reason: EndReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamStats {
    pub team_name: String,
    pub wins: u32,
    pub losses: u32,
    pub total_games: u32,
    pub total_score: u32,
    pub average_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameHistory {
    /// Newest first
    results: Vec<GameResult>,
}

impl GameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(mut results: Vec<GameResult>) -> Self {
        results.truncate(MAX_HISTORY);
        Self { results }
    }

    pub fn record(&mut self, result: GameResult) {
        tracing::info!(
            "Recording result for '{}': {} won after {} questions",
            result.playlist_name,
            result.winner,
            result.total_questions
        );
        self.results.insert(0, result);
        self.results.truncate(MAX_HISTORY);
    }

    pub fn results(&self) -> &[GameResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Totals for every recorded game the named team played in
    pub fn team_stats(&self, team_name: &str) -> TeamStats {
        let mut stats = TeamStats {
            team_name: team_name.to_string(),
            wins: 0,
            losses: 0,
            total_games: 0,
            total_score: 0,
            average_score: 0.0,
        };

        for result in &self.results {
            let Some(team) = result.teams.iter().find(|t| t.name == team_name) else {
                continue;
            };
            stats.total_games += 1;
            stats.total_score += team.score;
            if result.winner == team_name {
                stats.wins += 1;
            } else {
                stats.losses += 1;
            }
        }

        if stats.total_games > 0 {
            stats.average_score = f64::from(stats.total_score) / f64::from(stats.total_games);
        }
        stats
    }
}
