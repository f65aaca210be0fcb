use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type TrackId = String;
pub type PlaylistId = String;
pub type TeamId = String;
pub type GameResultId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub name: String,
}

/// A track as delivered by the track supply. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    /// Reference to a playable preview clip, if the supply resolved one
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl Track {
    /// First credited artist, used for artist questions and dominance checks
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    pub fn has_preview(&self) -> bool {
        self.preview_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Never negative; penalties clamp at zero
    pub score: u32,
    pub color: String,
    pub buzzer_sound: String,
}

impl Team {
    pub fn new(name: impl Into<String>, color: impl Into<String>, buzzer_sound: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.into(),
            score: 0,
            color: color.into(),
            buzzer_sound: buzzer_sound.into(),
        }
    }
}

/// Which piece of knowledge a question asks for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFamily {
    SongTitle,
    Artist,
    Album,
    Genre,
    SimilarArtist,
}

/// How the question is answered.
///
/// Buzz-in questions are open recall judged by a human; drag-to-corner
/// questions carry exactly four options with index-aligned reveal delays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionFormat {
    BuzzIn,
    DragToCorner {
        options: Vec<String>,
        /// Seconds after the question appears before each option is interactive
        option_reveal_delays: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub track: Track,
    pub family: QuestionFamily,
    pub question_text: String,
    pub correct_answer: String,
    #[serde(flatten)]
    pub format: QuestionFormat,
}

impl Question {
    pub fn is_buzz_in(&self) -> bool {
        matches!(self.format, QuestionFormat::BuzzIn)
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.format {
            QuestionFormat::DragToCorner { options, .. } => Some(options),
            QuestionFormat::BuzzIn => None,
        }
    }

    pub fn option_reveal_delays(&self) -> Option<&[f64]> {
        match &self.format {
            QuestionFormat::DragToCorner {
                option_reveal_delays,
                ..
            } => Some(option_reveal_delays),
            QuestionFormat::BuzzIn => None,
        }
    }
}

/// Default team palette (blue, red)
pub const TEAM_COLORS: &[&str] = &["#3B82F6", "#EF4444"];

/// Default buzzer sounds, index-aligned with `TEAM_COLORS`
pub const TEAM_BUZZER_SOUNDS: &[&str] = &["/sounds/buzzer-1.mp3", "/sounds/buzzer-2.mp3"];

/// Connection roles. Only the host may drive the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    /// Read-only scoreboard/projector view
    Display,
}
