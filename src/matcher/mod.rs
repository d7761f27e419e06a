use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::models::{AssetRecord, Gender, LookalikeMatch};
use crate::store::AssetSnapshot;

/// Selection policy. Different deployments of the original shipped one
/// or the other; both are kept behind configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Uniform pick from the gender-filtered set, with a synthetic
    /// similarity from age and score differences.
    Random,
    /// Closest celebrity beauty score to the query score.
    Nearest,
}

impl FromStr for MatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(MatchMode::Random),
            "nearest" | "best" => Ok(MatchMode::Nearest),
            other => anyhow::bail!("unknown match mode: {}", other),
        }
    }
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Random => "random",
            MatchMode::Nearest => "nearest",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchQuery {
    pub beauty_score: f64,
    pub age: u32,
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchSelector {
    mode: MatchMode,
}

impl MatchSelector {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Picks a lookalike from the snapshot. An empty store yields the
    /// "Unknown" sentinel rather than an error.
    pub fn select(&self, snapshot: &AssetSnapshot, query: &MatchQuery) -> LookalikeMatch {
        if snapshot.is_empty() {
            return LookalikeMatch::unknown();
        }

        let candidates = filter_by_gender(&snapshot.records, query.gender);
        debug!(
            "Matching against {} of {} records (mode: {})",
            candidates.len(),
            snapshot.records.len(),
            self.mode.as_str()
        );

        let (record, similarity) = match self.mode {
            MatchMode::Random => pick_random(&candidates, query),
            MatchMode::Nearest => pick_nearest(&candidates, query),
        };

        LookalikeMatch {
            name: record.display_name.clone(),
            similarity: round1(similarity.clamp(0.0, 100.0)),
            image: image_url(&record.display_name),
            info: record.info.clone(),
        }
    }
}

/// Coarse gender agreement; an empty filter result falls back to the
/// entire store rather than failing the match.
fn filter_by_gender(records: &[AssetRecord], gender: Gender) -> Vec<&AssetRecord> {
    if gender == Gender::Unknown {
        return records.iter().collect();
    }

    let matched: Vec<&AssetRecord> = records.iter().filter(|r| r.gender() == gender).collect();
    if matched.is_empty() {
        records.iter().collect()
    } else {
        matched
    }
}

fn pick_random<'a>(candidates: &[&'a AssetRecord], query: &MatchQuery) -> (&'a AssetRecord, f64) {
    let mut rng = rand::rng();
    let record = candidates[rng.random_range(0..candidates.len())];

    let celeb_age = record.info.as_ref().and_then(|i| i.age).unwrap_or(25);
    let age_diff = (query.age as f64 - celeb_age as f64).abs();
    let age_similarity = (100.0 - age_diff * 2.0).max(0.0);

    let beauty_similarity = (query.beauty_score * 8.0 + rng.random_range(-10.0..=10.0))
        .clamp(60.0, 95.0);

    (record, (age_similarity + beauty_similarity) / 2.0)
}

fn pick_nearest<'a>(candidates: &[&'a AssetRecord], query: &MatchQuery) -> (&'a AssetRecord, f64) {
    let mut best = candidates[0];
    let mut best_diff = f64::MAX;

    for record in candidates {
        let diff = (celebrity_score(record) - query.beauty_score).abs();
        if diff < best_diff {
            best_diff = diff;
            best = record;
        }
    }

    (best, 100.0 - best_diff * 10.0)
}

/// A celebrity's own score on the same [1, 10] scale: taken from the
/// metadata table when present, otherwise derived stably from the image
/// hash so repeated requests agree.
fn celebrity_score(record: &AssetRecord) -> f64 {
    if let Some(score) = record.info.as_ref().and_then(|i| i.beauty_score) {
        return score.clamp(1.0, 10.0);
    }

    let byte = record
        .file_hash
        .get(..2)
        .and_then(|h| u8::from_str_radix(h, 16).ok())
        .unwrap_or(128);
    6.0 + (byte as f64 / 255.0) * 3.5
}

fn image_url(display_name: &str) -> String {
    format!("/celebrities/{}/image", display_name.replace(' ', "%20"))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
