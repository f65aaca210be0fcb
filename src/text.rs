//! Case-insensitive string helpers shared by the validator and generator.

use crate::types::Track;
use std::collections::{HashMap, HashSet};

/// Comparison key: trimmed and lowercased
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Deduplicate case-insensitively, keeping the first spelling seen and the
/// original order.
pub fn dedup_ignore_case<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        let item = item.into();
        if item.trim().is_empty() {
            continue;
        }
        if seen.insert(normalize(&item)) {
            unique.push(item);
        }
    }
    unique
}

/// Number of distinct non-empty values, case-insensitive
pub fn count_unique<'a, I>(items: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    items
        .into_iter()
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Primary artists credited on more than `share` of all tracks, normalized.
pub fn dominant_artists(tracks: &[Track], share: f64) -> HashSet<String> {
    if tracks.is_empty() {
        return HashSet::new();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for artist in tracks.iter().filter_map(Track::primary_artist) {
        *counts.entry(normalize(artist)).or_default() += 1;
    }

    let total = tracks.len() as f64;
    counts
        .into_iter()
        .filter(|(_, count)| *count as f64 / total > share)
        .map(|(artist, _)| artist)
        .collect()
}
