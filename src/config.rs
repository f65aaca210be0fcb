use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Game-design parameters. Everything here is tunable per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    /// First team to reach this score wins
    pub score_limit: u32,
    /// Primary artists credited on more than this share of tracks are
    /// excluded from artist questions
    pub dominant_artist_share: f64,
    /// Smallest playlist the validator accepts
    pub min_tracks: usize,
    /// Distinct candidates a multiple-choice family needs (1 correct + 3 wrong)
    pub min_unique_candidates: usize,
    /// Upper bound on re-rolls when a family can't produce enough distractors
    pub max_generation_attempts: u32,
    /// Pause between a resolved round and the next question; zero leaves
    /// advancing to the host
    #[serde(with = "duration_ms")]
    pub advance_delay: Duration,
    /// Skip tracks that have no preview clip instead of playing them
    pub skip_tracks_without_preview: bool,
    /// Pick tracks randomly instead of in playlist order
    pub shuffle: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            score_limit: 10,
            dominant_artist_share: 0.30,
            min_tracks: 8,
            min_unique_candidates: 4,
            max_generation_attempts: 10,
            advance_delay: Duration::from_millis(4000),
            skip_tracks_without_preview: false,
            shuffle: true,
        }
    }
}

impl GameConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let score_limit = std::env::var("MIXTAPE_SCORE_LIMIT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|limit: &u32| *limit > 0)
            .unwrap_or(defaults.score_limit);

        let dominant_artist_share = std::env::var("MIXTAPE_DOMINANT_ARTIST_SHARE")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|share: &f64| (0.0..=1.0).contains(share))
            .unwrap_or(defaults.dominant_artist_share);

        let max_generation_attempts = std::env::var("MIXTAPE_MAX_GENERATION_ATTEMPTS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|attempts: &u32| *attempts > 0)
            .unwrap_or(defaults.max_generation_attempts);

        let advance_delay = std::env::var("MIXTAPE_ADVANCE_DELAY_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.advance_delay);

        let skip_tracks_without_preview = std::env::var("MIXTAPE_SKIP_NO_PREVIEW")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.skip_tracks_without_preview);

        Self {
            score_limit,
            dominant_artist_share,
            max_generation_attempts,
            advance_delay,
            skip_tracks_without_preview,
            ..defaults
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
