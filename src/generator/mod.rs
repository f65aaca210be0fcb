//! Question generation
//!
//! Even question indices produce open-recall buzz-in questions, odd indices
//! produce four-option drag-to-corner questions. Multiple-choice families are
//! gated on playlist-wide uniqueness so that every emitted question has four
//! genuinely distinct options.

pub mod stagger;

use crate::config::GameConfig;
use crate::enrichment::TriviaSource;
use crate::text::{dedup_ignore_case, eq_ignore_case, normalize};
use crate::types::{Question, QuestionFamily, QuestionFormat, Track};
use crate::validator::{PlaylistValidator, ValidationVerdict};
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Wrong answers per multiple-choice question
pub const DISTRACTOR_COUNT: usize = 3;

/// How many similar artists to ask the trivia source for
const SIMILAR_ARTIST_LIMIT: usize = 10;

/// How many sibling tracks to sample tags from when building genre distractors
const GENRE_SAMPLE_TRACKS: usize = 6;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Playlist failed validation: {0}")]
    InvalidPlaylist(String),

    #[error("No multiple choice question family is eligible for track '{0}'")]
    NoEligibleFamily(String),

    #[error("Could not find 3 distinct wrong answers after {0} attempts")]
    DistractorsExhausted(u32),
}

/// A question before its format is decided
#[derive(Debug, Clone)]
struct Draft {
    family: QuestionFamily,
    question_text: String,
    correct_answer: String,
}

/// Data the trivia source returned for the current track
#[derive(Debug, Default)]
struct Enrichment {
    tags: Vec<String>,
    similar_artists: Vec<String>,
}

pub struct QuestionGenerator {
    tracks: Vec<Track>,
    /// Normalized names excluded from artist questions
    dominant_artists: HashSet<String>,
    verdict: ValidationVerdict,
    min_unique: usize,
    max_attempts: u32,
    trivia: Option<Arc<dyn TriviaSource>>,
}

impl QuestionGenerator {
    /// Validate `tracks` and freeze the verdict
    pub fn new(tracks: Vec<Track>, config: &GameConfig) -> Self {
        let verdict = PlaylistValidator::from_config(config).validate(&tracks);

        if verdict.is_valid {
            tracing::info!(
                "Playlist accepted: {} tracks, {} titles, {} artists, {} albums",
                tracks.len(),
                verdict.unique_titles,
                verdict.unique_artists,
                verdict.unique_albums
            );
        } else {
            tracing::warn!("Playlist rejected: {}", verdict.warnings.join("; "));
        }

        Self {
            tracks,
            dominant_artists: HashSet::new(),
            verdict,
            min_unique: config.min_unique_candidates,
            max_attempts: config.max_generation_attempts.max(1),
            trivia: None,
        }
    }

    /// Exclude these artists (case-insensitive) from artist questions
    pub fn with_dominant_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dominant_artists = artists.into_iter().map(|a| normalize(a.as_ref())).collect();
        self
    }

    pub fn with_trivia_source(mut self, source: Arc<dyn TriviaSource>) -> Self {
        self.trivia = Some(source);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.verdict.is_valid
    }

    pub fn warnings(&self) -> &[String] {
        &self.verdict.warnings
    }

    pub fn verdict(&self) -> &ValidationVerdict {
        &self.verdict
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn is_dominant(&self, artist: &str) -> bool {
        self.dominant_artists.contains(&normalize(artist))
    }

    /// Build the question for round `question_index` about `track`
    pub async fn generate_question<R>(
        &self,
        track: &Track,
        question_index: usize,
        rng: &mut R,
    ) -> Result<Question, GeneratorError>
    where
        R: Rng + Send + ?Sized,
    {
        if !self.verdict.is_valid {
            return Err(GeneratorError::InvalidPlaylist(self.verdict.warnings.join("; ")));
        }

        if question_index % 2 == 0 {
            self.generate_buzz_in(track, rng)
        } else {
            self.generate_drag_to_corner(track, rng).await
        }
    }

    fn generate_buzz_in<R>(&self, track: &Track, rng: &mut R) -> Result<Question, GeneratorError>
    where
        R: Rng + ?Sized,
    {
        let mut drafts = vec![Draft {
            family: QuestionFamily::SongTitle,
            question_text: "Name this song!".to_string(),
            correct_answer: track.name.clone(),
        }];

        if let Some(artist) = track.primary_artist().filter(|a| !self.is_dominant(a)) {
            drafts.push(Draft {
                family: QuestionFamily::Artist,
                question_text: "Who is the artist?".to_string(),
                correct_answer: artist.to_string(),
            });
        }

        let draft = drafts
            .choose(rng)
            .cloned()
            .ok_or_else(|| GeneratorError::NoEligibleFamily(track.name.clone()))?;

        Ok(Question {
            track: track.clone(),
            family: draft.family,
            question_text: draft.question_text,
            correct_answer: draft.correct_answer,
            format: QuestionFormat::BuzzIn,
        })
    }

    async fn generate_drag_to_corner<R>(
        &self,
        track: &Track,
        rng: &mut R,
    ) -> Result<Question, GeneratorError>
    where
        R: Rng + Send + ?Sized,
    {
        let enrichment = self.fetch_enrichment(track).await;
        let families = self.eligible_families(track, &enrichment);
        if families.is_empty() {
            tracing::error!("No eligible question family for '{}'", track.name);
            return Err(GeneratorError::NoEligibleFamily(track.name.clone()));
        }

        for attempt in 1..=self.max_attempts {
            let Some(family) = families.choose(rng).copied() else {
                break;
            };

            let (draft, candidates) = self.draft_family(family, track, &enrichment, rng).await;
            let distractors = valid_distractors(&draft.correct_answer, candidates);

            if distractors.len() < DISTRACTOR_COUNT {
                tracing::debug!(
                    "Attempt {}: {:?} produced only {} distractors for '{}', retrying",
                    attempt,
                    family,
                    distractors.len(),
                    track.name
                );
                continue;
            }

            let mut options = Vec::with_capacity(DISTRACTOR_COUNT + 1);
            options.push(draft.correct_answer.clone());
            options.extend(distractors.into_iter().take(DISTRACTOR_COUNT));
            options.shuffle(rng);

            let option_reveal_delays = stagger::reveal_delays(rng, options.len());

            return Ok(Question {
                track: track.clone(),
                family: draft.family,
                question_text: draft.question_text,
                correct_answer: draft.correct_answer,
                format: QuestionFormat::DragToCorner {
                    options,
                    option_reveal_delays,
                },
            });
        }

        tracing::error!(
            "Gave up on multiple choice question for '{}' after {} attempts",
            track.name,
            self.max_attempts
        );
        Err(GeneratorError::DistractorsExhausted(self.max_attempts))
    }

    fn eligible_families(&self, track: &Track, enrichment: &Enrichment) -> Vec<QuestionFamily> {
        let mut families = Vec::new();

        if self.verdict.unique_titles >= self.min_unique {
            families.push(QuestionFamily::SongTitle);
        }

        let artist_allowed = track
            .primary_artist()
            .is_some_and(|artist| !self.is_dominant(artist));
        if artist_allowed && self.verdict.unique_artists >= self.min_unique {
            families.push(QuestionFamily::Artist);
        }

        if !track.album.name.trim().is_empty() && self.verdict.unique_albums >= self.min_unique {
            families.push(QuestionFamily::Album);
        }

        if !enrichment.tags.is_empty() {
            families.push(QuestionFamily::Genre);
        }

        if !enrichment.similar_artists.is_empty() {
            families.push(QuestionFamily::SimilarArtist);
        }

        families
    }

    async fn fetch_enrichment(&self, track: &Track) -> Enrichment {
        let (Some(source), Some(artist)) = (&self.trivia, track.primary_artist()) else {
            return Enrichment::default();
        };

        let (tags, similar) = tokio::join!(
            source.track_tags(artist, &track.name),
            source.similar_artists(artist, SIMILAR_ARTIST_LIMIT)
        );

        let tags = tags.unwrap_or_else(|e| {
            tracing::warn!("{} tags unavailable for '{}': {}", source.name(), track.name, e);
            Vec::new()
        });

        let similar_artists: Vec<String> = similar
            .unwrap_or_else(|e| {
                tracing::warn!("{} similar artists unavailable for '{}': {}", source.name(), artist, e);
                Vec::new()
            })
            .into_iter()
            .filter(|a| !eq_ignore_case(a, artist))
            .collect();

        Enrichment {
            tags: dedup_ignore_case(tags),
            similar_artists: dedup_ignore_case(similar_artists),
        }
    }

    /// Question text, correct answer and up to three wrong-answer candidates
    async fn draft_family<R>(
        &self,
        family: QuestionFamily,
        track: &Track,
        enrichment: &Enrichment,
        rng: &mut R,
    ) -> (Draft, Vec<String>)
    where
        R: Rng + Send + ?Sized,
    {
        let others = || self.tracks.iter().filter(move |t| t.id != track.id);

        match family {
            QuestionFamily::SongTitle => {
                let pool = others().map(|t| t.name.clone());
                (
                    Draft {
                        family,
                        question_text: "Which is the correct song title?".to_string(),
                        correct_answer: track.name.clone(),
                    },
                    sample_distinct(rng, pool, &[track.name.as_str()]),
                )
            }
            QuestionFamily::Artist => {
                let artist = track.primary_artist().unwrap_or_default().to_string();
                let pool = others()
                    .filter_map(Track::primary_artist)
                    .map(str::to_string);
                let candidates = sample_distinct(rng, pool, &[artist.as_str()]);
                (
                    Draft {
                        family,
                        question_text: "Who is the artist?".to_string(),
                        correct_answer: artist,
                    },
                    candidates,
                )
            }
            QuestionFamily::Album => {
                let pool = others().map(|t| t.album.name.clone());
                (
                    Draft {
                        family,
                        question_text: "What album is this from?".to_string(),
                        correct_answer: track.album.name.clone(),
                    },
                    sample_distinct(rng, pool, &[track.album.name.as_str()]),
                )
            }
            QuestionFamily::Genre => {
                let correct = enrichment.tags.first().cloned().unwrap_or_default();
                let candidates = self.genre_candidates(track, &enrichment.tags, rng).await;
                (
                    Draft {
                        family,
                        question_text: "What genre is this song?".to_string(),
                        correct_answer: correct,
                    },
                    candidates,
                )
            }
            QuestionFamily::SimilarArtist => {
                let artist = track.primary_artist().unwrap_or_default();
                let correct = enrichment.similar_artists.first().cloned().unwrap_or_default();
                let mut excluded: Vec<&str> =
                    enrichment.similar_artists.iter().map(String::as_str).collect();
                excluded.push(artist);
                let pool = self
                    .tracks
                    .iter()
                    .filter_map(Track::primary_artist)
                    .map(str::to_string);
                let candidates = sample_distinct(rng, pool, &excluded);
                (
                    Draft {
                        family,
                        question_text: format!("Which artist sounds most like {}?", artist),
                        correct_answer: correct,
                    },
                    candidates,
                )
            }
        }
    }

    /// Top tags of randomly chosen sibling tracks that don't describe this track
    async fn genre_candidates<R>(&self, track: &Track, own_tags: &[String], rng: &mut R) -> Vec<String>
    where
        R: Rng + Send + ?Sized,
    {
        let Some(source) = &self.trivia else {
            return Vec::new();
        };

        let mut siblings: Vec<&Track> = self.tracks.iter().filter(|t| t.id != track.id).collect();
        siblings.shuffle(rng);

        let mut candidates: Vec<String> = Vec::new();
        for sibling in siblings.into_iter().take(GENRE_SAMPLE_TRACKS) {
            if candidates.len() >= DISTRACTOR_COUNT {
                break;
            }
            let Some(artist) = sibling.primary_artist() else {
                continue;
            };

            match source.track_tags(artist, &sibling.name).await {
                Ok(tags) => {
                    let fresh = tags.into_iter().find(|tag| {
                        !own_tags.iter().any(|own| eq_ignore_case(own, tag))
                            && !candidates.iter().any(|c| eq_ignore_case(c, tag))
                    });
                    candidates.extend(fresh);
                }
                Err(e) => {
                    tracing::debug!("Skipping tags for '{}': {}", sibling.name, e);
                }
            }
        }

        candidates
    }
}

/// Up to three random distinct values from `pool`, none matching `excluded`
fn sample_distinct<R, I>(rng: &mut R, pool: I, excluded: &[&str]) -> Vec<String>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut unique: Vec<String> = dedup_ignore_case(pool)
        .into_iter()
        .filter(|candidate| !excluded.iter().any(|e| eq_ignore_case(e, candidate)))
        .collect();
    unique.shuffle(rng);
    unique.truncate(DISTRACTOR_COUNT);
    unique
}

/// Drop anything equal to the correct answer, then deduplicate
fn valid_distractors(correct: &str, candidates: Vec<String>) -> Vec<String> {
    if correct.trim().is_empty() {
        return Vec::new();
    }
    dedup_ignore_case(
        candidates
            .into_iter()
            .filter(|candidate| !eq_ignore_case(candidate, correct)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{TriviaError, TriviaResult};
    use crate::types::{Album, Artist};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn track(id: &str, name: &str, artist: &str, album: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artists: vec![Artist {
                name: artist.to_string(),
            }],
            album: Album {
                name: album.to_string(),
            },
            preview_url: Some(format!("https://example.com/{id}.mp3")),
        }
    }

    fn varied_tracks() -> Vec<Track> {
        (0..10)
            .map(|i| {
                track(
                    &format!("t{i}"),
                    &format!("Song {i}"),
                    &format!("Artist {}", i % 5),
                    &format!("Album {}", i % 4),
                )
            })
            .collect()
    }

    /// 10 tracks, 6 unique titles, Queen x8 and Eagles x2
    fn queen_tracks() -> Vec<Track> {
        let titles = [
            "Bohemian Rhapsody",
            "Somebody to Love",
            "Under Pressure",
            "Radio Ga Ga",
            "Bohemian Rhapsody",
            "under pressure",
            "Somebody To Love",
            "Radio Ga Ga ",
        ];
        let mut tracks: Vec<Track> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| track(&format!("q{i}"), title, "Queen", "Greatest Hits"))
            .collect();
        tracks.push(track("e0", "Hotel California", "Eagles", "Hotel California"));
        tracks.push(track("e1", "Take It Easy", "Eagles", "Eagles"));
        tracks
    }

    fn assert_option_integrity(question: &Question) {
        let options = question.options().expect("drag-to-corner has options");
        assert_eq!(options.len(), 4);
        assert_eq!(
            options.iter().filter(|o| **o == question.correct_answer).count(),
            1
        );
        let normalized: HashSet<String> = options.iter().map(|o| normalize(o)).collect();
        assert_eq!(normalized.len(), 4, "duplicate options: {options:?}");

        let delays = question.option_reveal_delays().unwrap();
        assert_eq!(delays.len(), options.len());
        assert!(delays.iter().all(|d| *d >= 0.0));
    }

    struct FakeTrivia {
        tags: HashMap<String, Vec<String>>,
        similar: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl TriviaSource for FakeTrivia {
        async fn track_tags(&self, _artist: &str, track: &str) -> TriviaResult<Vec<String>> {
            if self.fail {
                return Err(TriviaError::ApiError("down".to_string()));
            }
            Ok(self.tags.get(track).cloned().unwrap_or_default())
        }

        async fn similar_artists(&self, _artist: &str, _limit: usize) -> TriviaResult<Vec<String>> {
            if self.fail {
                return Err(TriviaError::Timeout(std::time::Duration::from_secs(1)));
            }
            Ok(self.similar.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_alternates_by_parity() {
        let tracks = varied_tracks();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default());
        let mut rng = StdRng::seed_from_u64(1);

        for index in 0..20 {
            let question = generator
                .generate_question(&tracks[index % tracks.len()], index, &mut rng)
                .await
                .unwrap();
            if index % 2 == 0 {
                assert!(question.is_buzz_in());
                assert!(question.options().is_none());
            } else {
                assert!(!question.is_buzz_in());
                assert_option_integrity(&question);
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_generator_refuses() {
        let tracks = varied_tracks().into_iter().take(5).collect::<Vec<_>>();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default());
        assert!(!generator.is_valid());
        assert!(generator.warnings()[0].contains('8'));

        let mut rng = StdRng::seed_from_u64(1);
        let result = generator.generate_question(&tracks[0], 0, &mut rng).await;
        assert!(matches!(result, Err(GeneratorError::InvalidPlaylist(_))));
    }

    #[tokio::test]
    async fn test_buzz_in_answers() {
        let tracks = varied_tracks();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = HashSet::new();

        for _ in 0..50 {
            let question = generator.generate_question(&tracks[2], 0, &mut rng).await.unwrap();
            match question.family {
                QuestionFamily::SongTitle => assert_eq!(question.correct_answer, "Song 2"),
                QuestionFamily::Artist => assert_eq!(question.correct_answer, "Artist 2"),
                other => panic!("unexpected buzz-in family {other:?}"),
            }
            seen.insert(question.family);
        }
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_dominant_artist_never_asked() {
        let tracks = varied_tracks();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default())
            .with_dominant_artists(["ARTIST 2 "]);
        let mut rng = StdRng::seed_from_u64(5);

        for index in 0..60 {
            let question = generator
                .generate_question(&tracks[2], index, &mut rng)
                .await
                .unwrap();
            assert_ne!(question.family, QuestionFamily::Artist);
        }
    }

    #[tokio::test]
    async fn test_few_artists_falls_back_to_titles() {
        let tracks = queen_tracks();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default());
        assert!(generator.is_valid());
        assert_eq!(generator.verdict().unique_artists, 2);
        let mut rng = StdRng::seed_from_u64(11);

        for (i, queen_track) in tracks.iter().take(8).enumerate() {
            for round in 0..10 {
                let question = generator
                    .generate_question(queen_track, 2 * (i + round) + 1, &mut rng)
                    .await
                    .unwrap();
                assert_eq!(question.family, QuestionFamily::SongTitle);
                assert_option_integrity(&question);
            }
        }
    }

    #[tokio::test]
    async fn test_no_eligible_family() {
        // valid through artists, but the only titles repeat and the artist is excluded
        let tracks: Vec<Track> = (0..8)
            .map(|i| track(&format!("t{i}"), "Same", &format!("Artist {}", i % 4), "Same"))
            .collect();
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default())
            .with_dominant_artists(["Artist 0"]);
        assert!(generator.is_valid());

        let mut rng = StdRng::seed_from_u64(2);
        let result = generator.generate_question(&tracks[0], 1, &mut rng).await;
        assert_eq!(result, Err(GeneratorError::NoEligibleFamily("Same".to_string())));
    }

    #[tokio::test]
    async fn test_enrichment_families() {
        let tracks = queen_tracks();
        let tags = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), vec![format!("genre {}", i % 5), "rock".to_string()]))
            .collect();
        let source = FakeTrivia {
            tags,
            similar: vec!["Queen".to_string(), "David Bowie".to_string(), "Led Zeppelin".to_string()],
            fail: false,
        };
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default())
            .with_trivia_source(Arc::new(source));
        let mut rng = StdRng::seed_from_u64(21);
        let mut families = HashSet::new();

        for index in 0..80 {
            let result = generator
                .generate_question(&tracks[index % 8], 2 * index + 1, &mut rng)
                .await;
            let question = match result {
                Ok(q) => q,
                Err(GeneratorError::DistractorsExhausted(_)) => continue,
                Err(e) => panic!("unexpected error {e}"),
            };
            assert_option_integrity(&question);
            if question.family == QuestionFamily::SimilarArtist {
                // Queen is the track's own artist, so the top pick is Bowie
                assert_eq!(question.correct_answer, "David Bowie");
            }
            families.insert(question.family);
        }

        assert!(families.contains(&QuestionFamily::SongTitle));
        assert!(families.contains(&QuestionFamily::Genre));
    }

    #[tokio::test]
    async fn test_failed_enrichment_degrades() {
        let tracks = varied_tracks();
        let source = FakeTrivia {
            tags: HashMap::new(),
            similar: Vec::new(),
            fail: true,
        };
        let generator = QuestionGenerator::new(tracks.clone(), &GameConfig::default())
            .with_trivia_source(Arc::new(source));
        let mut rng = StdRng::seed_from_u64(8);

        for index in 0..20 {
            let question = generator
                .generate_question(&tracks[index % 10], 2 * index + 1, &mut rng)
                .await
                .unwrap();
            assert!(matches!(
                question.family,
                QuestionFamily::SongTitle | QuestionFamily::Artist | QuestionFamily::Album
            ));
        }
    }

    #[test]
    fn test_valid_distractors_filters_correct_and_duplicates() {
        let candidates = vec![
            "Rock".to_string(),
            " rock".to_string(),
            "Jazz".to_string(),
            "JAZZ ".to_string(),
            "Pop".to_string(),
        ];
        assert_eq!(valid_distractors("POP", candidates), vec!["Rock", "Jazz"]);
    }
}
