//! Session snapshots for restoring a game after a restart.
//!
//! Snapshots are plain JSON. Older schema versions are upgraded step by step
//! on the raw JSON value before it is deserialized.

use super::{GameResult, GameSession, TEAM_COUNT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Schema version for snapshot compatibility
/// Version 2: sessions must have exactly two teams
/// Version 3: buzzer sounds renamed from team colours to numbered/descriptive files
/// Version 4: history entries carry an end_reason
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 4;

/// Buzzer sound paths from before version 3
const LEGACY_BUZZER_SOUNDS: &[(&str, &str)] = &[
    ("/sounds/buzzer-blue.mp3", "/sounds/buzzer-1.mp3"),
    ("/sounds/buzzer-red.mp3", "/sounds/buzzer-2.mp3"),
    ("/sounds/buzzer-teal.mp3", "/sounds/buzzer-bell.mp3"),
    ("/sounds/buzzer-pink.mp3", "/sounds/buzzer-gameshow.mp3"),
    ("/sounds/buzzer-green.mp3", "/sounds/buzzer-horn.mp3"),
    ("/sounds/buzzer-purple.mp3", "/sounds/buzzer-ding.mp3"),
    ("/sounds/buzzer-yellow.mp3", "/sounds/buzzer-beep.mp3"),
];

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot schema version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Migration from version {from} failed: {reason}")]
    Migration { from: u32, reason: String },

    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A serializable snapshot of the active session plus game history.
///
/// Timers, the RNG and the trivia client are runtime-only and are not included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    pub session: Option<GameSession>,
    /// Artists excluded from artist questions. Absent in older snapshots,
    /// in which case they are detected again from the playlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_artists: Option<Vec<String>>,
    #[serde(default)]
    pub history: Vec<GameResult>,
}

impl SessionSnapshot {
    pub fn new(session: Option<GameSession>, history: Vec<GameResult>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            session,
            dominant_artists: None,
            history,
        }
    }

    pub fn with_dominant_artists(mut self, artists: Vec<String>) -> Self {
        self.dominant_artists = Some(artists);
        self
    }

    /// Validate the snapshot before import
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::VersionTooNew {
                found: self.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        let Some(session) = &self.session else {
            return Ok(());
        };

        if session.teams.len() != TEAM_COUNT {
            return Err(SnapshotError::Invalid(format!(
                "session has {} teams",
                session.teams.len()
            )));
        }

        let total = session.playlist.tracks.len();
        if let Some(index) = session.played.iter().find(|i| **i >= total) {
            return Err(SnapshotError::Invalid(format!(
                "played track {} is outside the {}-track playlist",
                index, total
            )));
        }

        if let Some(round) = &session.round {
            if round.track_index >= total {
                return Err(SnapshotError::Invalid(format!(
                    "round {} references track {} which doesn't exist",
                    round.number, round.track_index
                )));
            }
            if let Some(team_id) = &round.buzzed_team {
                if session.team(team_id).is_none() {
                    return Err(SnapshotError::Invalid(format!(
                        "round {} buzz belongs to unknown team '{}'",
                        round.number, team_id
                    )));
                }
            }
        }

        if session.is_completed() != session.outcome.is_some() {
            return Err(SnapshotError::Invalid(
                "completed phase and outcome disagree".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse a snapshot of any known version, upgrading it to the current one
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let mut value: Value = serde_json::from_str(json)?;
        migrate(&mut value)?;
        let snapshot: Self = serde_json::from_value(value)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Snapshots written before versioning was introduced count as version 1
fn schema_version(value: &Value) -> u32 {
    value
        .get("schema_version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1)
}

fn migrate(value: &mut Value) -> Result<(), SnapshotError> {
    let mut version = schema_version(value);
    if version > SNAPSHOT_SCHEMA_VERSION {
        return Err(SnapshotError::VersionTooNew {
            found: version,
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }

    let root = value.as_object_mut().ok_or(SnapshotError::Migration {
        from: version,
        reason: "snapshot is not a JSON object".to_string(),
    })?;

    while version < SNAPSHOT_SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(root),
            2 => migrate_v2_to_v3(root),
            3 => migrate_v3_to_v4(root),
            _ => {
                return Err(SnapshotError::Migration {
                    from: version,
                    reason: "no migration path".to_string(),
                })
            }
        }
        version += 1;
        tracing::info!("Migrated snapshot to schema version {}", version);
    }

    root.insert("schema_version".to_string(), Value::from(version));
    Ok(())
}

type JsonObject = serde_json::Map<String, Value>;

fn session_teams_mut(root: &mut JsonObject) -> Option<&mut Vec<Value>> {
    root.get_mut("session")?.get_mut("teams")?.as_array_mut()
}

/// Sessions from the multi-team era can't be played any more; drop them
fn migrate_v1_to_v2(root: &mut JsonObject) {
    let team_count = session_teams_mut(root).map(|teams| teams.len());
    if let Some(count) = team_count {
        if count != TEAM_COUNT && count > 0 {
            tracing::warn!("Dropping saved session with {} teams", count);
            root.insert("session".to_string(), Value::Null);
        }
    }
}

fn migrate_v2_to_v3(root: &mut JsonObject) {
    let Some(teams) = session_teams_mut(root) else {
        return;
    };
    for team in teams {
        let Some(sound) = team.get_mut("buzzer_sound") else {
            continue;
        };
        let renamed = sound.as_str().and_then(|old| {
            LEGACY_BUZZER_SOUNDS
                .iter()
                .find(|(from, _)| *from == old)
                .map(|(_, to)| *to)
        });
        if let Some(new_path) = renamed {
            *sound = Value::from(new_path);
        }
    }
}

fn migrate_v3_to_v4(root: &mut JsonObject) {
    let Some(history) = root.get_mut("history").and_then(Value::as_array_mut) else {
        return;
    };
    for entry in history.iter_mut().filter_map(Value::as_object_mut) {
        entry
            .entry("end_reason")
            .or_insert_with(|| Value::from("tracks_exhausted"));
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::session;
    use super::super::{EndReason, SessionPhase};
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn legacy_session_json(buzzer: &str, team_count: usize) -> Value {
        let mut value = serde_json::to_value(session(10, true)).unwrap();
        let teams = value["teams"].as_array_mut().unwrap();
        teams[0]["buzzer_sound"] = Value::from(buzzer);
        if team_count > 2 {
            let mut extra = teams[1].clone();
            extra["id"] = Value::from("green");
            teams.push(extra);
        }
        value
    }

    #[test]
    fn test_round_trip_current_version() {
        let mut game = session(10, true);
        let mut rng = StdRng::seed_from_u64(3);
        game.select_next_track(&mut rng).unwrap();

        let snapshot = SessionSnapshot::new(Some(game.clone()), vec![]);
        let json = snapshot.to_json_pretty().unwrap();
        let restored = SessionSnapshot::from_json(&json).unwrap();

        assert_eq!(restored.schema_version, SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(restored.session, Some(game));
        assert_eq!(restored.dominant_artists, None);
    }

    #[test]
    fn test_dominant_artists_survive_json() {
        let snapshot = SessionSnapshot::new(Some(session(8, false)), vec![])
            .with_dominant_artists(vec!["artist 0".to_string()]);
        let restored = SessionSnapshot::from_json(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(restored.dominant_artists, Some(vec!["artist 0".to_string()]));
    }

    #[test]
    fn test_rejects_newer_version() {
        let json = json!({
            "schema_version": SNAPSHOT_SCHEMA_VERSION + 1,
            "exported_at": "2026-01-01T00:00:00Z",
            "session": null
        });
        let err = SessionSnapshot::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, SnapshotError::VersionTooNew { .. }));
    }

    #[test]
    fn test_v1_drops_multi_team_session() {
        let json = json!({
            "exported_at": "2025-01-01T00:00:00Z",
            "session": legacy_session_json("/sounds/buzzer-1.mp3", 3),
        });
        let snapshot = SessionSnapshot::from_json(&json.to_string()).unwrap();
        assert!(snapshot.session.is_none());
        assert_eq!(snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION);
    }

    #[test]
    fn test_v2_renames_buzzer_sounds() {
        let json = json!({
            "schema_version": 2,
            "exported_at": "2025-03-01T00:00:00Z",
            "session": legacy_session_json("/sounds/buzzer-teal.mp3", 2),
        });
        let snapshot = SessionSnapshot::from_json(&json.to_string()).unwrap();
        let session = snapshot.session.unwrap();
        assert_eq!(session.teams()[0].buzzer_sound, "/sounds/buzzer-bell.mp3");
        assert_eq!(session.teams()[1].buzzer_sound, "/sounds/buzzer-2.mp3");
    }

    #[test]
    fn test_v3_fills_history_end_reason() {
        let json = json!({
            "schema_version": 3,
            "exported_at": "2025-06-01T00:00:00Z",
            "session": null,
            "history": [{
                "id": "01J0000000000000000000000",
                "date": "2025-05-30T21:00:00Z",
                "playlist_name": "Road Trip",
                "teams": [{"name": "Blue", "score": 7}, {"name": "Red", "score": 5}],
                "winner": "Blue",
                "total_questions": 20
            }]
        });
        let snapshot = SessionSnapshot::from_json(&json.to_string()).unwrap();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].end_reason, EndReason::TracksExhausted);
        assert_eq!(snapshot.history[0].winning_score, None);
    }

    #[test]
    fn test_validate_catches_inconsistent_phase() {
        let mut game = session(10, true);
        game.phase = SessionPhase::Completed;
        let snapshot = SessionSnapshot::new(Some(game), vec![]);
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let snapshot = SessionSnapshot::new(Some(session(8, false)), vec![]);
        snapshot.save(&path).unwrap();

        let loaded = SessionSnapshot::load(&path).unwrap();
        assert_eq!(loaded.session, snapshot.session);
        assert_eq!(loaded.exported_at, snapshot.exported_at);
    }
}
