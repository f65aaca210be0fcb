//! Playlist pre-flight checks
//!
//! Decides once, before a session starts, whether a track list has enough
//! distinct content to keep multiple-choice questions free of repeats.

use crate::config::GameConfig;
use crate::text::count_unique;
use crate::types::Track;
use serde::{Deserialize, Serialize};

/// Cached outcome of validating a track list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub unique_titles: usize,
    pub unique_artists: usize,
    pub unique_albums: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PlaylistValidator {
    min_tracks: usize,
    min_unique: usize,
}

impl Default for PlaylistValidator {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

impl PlaylistValidator {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            min_tracks: config.min_tracks,
            min_unique: config.min_unique_candidates,
        }
    }

    pub fn validate(&self, tracks: &[Track]) -> ValidationVerdict {
        if tracks.len() < self.min_tracks {
            return ValidationVerdict {
                is_valid: false,
                warnings: vec![format!(
                    "Playlist needs at least {} tracks, but only has {}",
                    self.min_tracks,
                    tracks.len()
                )],
                unique_titles: 0,
                unique_artists: 0,
                unique_albums: 0,
            };
        }

        let mut warnings = Vec::new();

        let unique_titles = count_unique(tracks.iter().map(|t| t.name.as_str()));
        if unique_titles < self.min_unique {
            warnings.push(format!(
                "Only {} unique song titles (need {} for song title questions)",
                unique_titles, self.min_unique
            ));
        }

        let unique_artists = count_unique(tracks.iter().filter_map(Track::primary_artist));
        if unique_artists < self.min_unique {
            warnings.push(format!(
                "Only {} unique artists (need {} for artist questions)",
                unique_artists, self.min_unique
            ));
        }

        let unique_albums = count_unique(tracks.iter().map(|t| t.album.name.as_str()));

        let is_valid = unique_titles >= self.min_unique || unique_artists >= self.min_unique;
        if !is_valid {
            warnings.push(
                "Playlist has insufficient unique content for multiple choice questions"
                    .to_string(),
            );
        }

        ValidationVerdict {
            is_valid,
            warnings,
            unique_titles,
            unique_artists,
            unique_albums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Album, Artist};

    fn track(id: &str, name: &str, artist: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artists: vec![Artist {
                name: artist.to_string(),
            }],
            album: Album {
                name: format!("Album {id}"),
            },
            preview_url: None,
        }
    }

    #[test]
    fn test_small_playlist_rejected() {
        let tracks = vec![
            track("1", "Song 1", "Artist A"),
            track("2", "Song 2", "Artist A"),
            track("3", "Song 3", "Artist B"),
            track("4", "Song 4", "Artist B"),
            track("5", "Song 5", "Artist C"),
        ];

        let verdict = PlaylistValidator::default().validate(&tracks);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("at least 8"));
        assert!(verdict.warnings[0].contains('5'));
    }

    #[test]
    fn test_titles_alone_are_enough() {
        let tracks: Vec<Track> = (0..8)
            .map(|i| track(&i.to_string(), &format!("Song {i}"), "Queen"))
            .collect();

        let verdict = PlaylistValidator::default().validate(&tracks);
        assert!(verdict.is_valid);
        assert_eq!(verdict.unique_titles, 8);
        assert_eq!(verdict.unique_artists, 1);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("unique artists"));
    }

    #[test]
    fn test_artists_alone_are_enough() {
        let tracks: Vec<Track> = (0..8)
            .map(|i| track(&i.to_string(), "Same Song", &format!("Artist {}", i % 4)))
            .collect();

        let verdict = PlaylistValidator::default().validate(&tracks);
        assert!(verdict.is_valid);
        assert_eq!(verdict.unique_titles, 1);
        assert_eq!(verdict.unique_artists, 4);
    }

    #[test]
    fn test_insufficient_unique_content() {
        let tracks: Vec<Track> = (0..9)
            .map(|i| {
                track(
                    &i.to_string(),
                    &format!("  SONG {} ", i % 3),
                    &format!("artist {}", i % 2),
                )
            })
            .collect();

        let verdict = PlaylistValidator::default().validate(&tracks);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.warnings.len(), 3);
        assert!(verdict.warnings[2].contains("insufficient unique content"));
    }

    #[test]
    fn test_titles_compare_case_insensitively() {
        let mut tracks: Vec<Track> = (0..6)
            .map(|i| track(&i.to_string(), "Hello", &format!("A{}", i % 2)))
            .collect();
        tracks.push(track("6", "hello ", "A0"));
        tracks.push(track("7", " HELLO", "A1"));

        let verdict = PlaylistValidator::default().validate(&tracks);
        assert_eq!(verdict.unique_titles, 1);
        assert!(!verdict.is_valid);
    }
}
