use rand::Rng;

use crate::models::{Emotion, FeatureScores, Gender};

pub const SYMMETRY_WEIGHT: f64 = 0.30;
pub const SKIN_CLARITY_WEIGHT: f64 = 0.25;
pub const PROPORTIONS_WEIGHT: f64 = 0.25;
pub const EXPRESSION_WEIGHT: f64 = 0.20;

/// Half-width of the uniform noise injected into every score.
pub const NOISE_SPAN: f64 = 0.5;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Fixed expression table keyed by detected emotion. An absent emotion
/// reads as a flat 75.
pub fn expression_score(emotion: Option<Emotion>) -> f64 {
    match emotion {
        Some(Emotion::Happy) => 90.0,
        Some(Emotion::Neutral) => 85.0,
        Some(Emotion::Surprise) => 80.0,
        Some(Emotion::Sad) => 70.0,
        Some(Emotion::Fear) => 65.0,
        Some(Emotion::Angry) => 60.0,
        Some(Emotion::Disgust) => 55.0,
        None => 75.0,
    }
}

/// Flat age brackets, peaking at 20-30.
pub fn age_factor(age: u32) -> f64 {
    match age {
        20..=30 => 1.1,
        15..=19 | 31..=35 => 1.0,
        36..=45 => 0.9,
        _ => 0.8,
    }
}

pub fn gender_factor(gender: Gender) -> f64 {
    if gender == Gender::Female {
        1.05
    } else {
        1.0
    }
}

pub fn emotion_factor(emotion: Option<Emotion>) -> f64 {
    if emotion == Some(Emotion::Happy) {
        1.1
    } else {
        1.0
    }
}

/// Combines the sub-scores and multipliers into the final [1, 10] score.
///
/// The noise term is passed in rather than drawn here, which keeps the
/// deterministic part of the formula reproducible on its own. This is an
/// arbitrary novelty formula, not a measurement of anything.
pub fn combine(
    features: &FeatureScores,
    age: u32,
    gender: Gender,
    emotion: Option<Emotion>,
    noise: f64,
) -> f64 {
    let weighted = features.symmetry * SYMMETRY_WEIGHT
        + features.skin_clarity * SKIN_CLARITY_WEIGHT
        + features.proportions * PROPORTIONS_WEIGHT
        + features.expression * EXPRESSION_WEIGHT;

    let score = (weighted / 100.0) * 10.0
        * age_factor(age)
        * gender_factor(gender)
        * emotion_factor(emotion)
        + noise;

    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn sample_noise() -> f64 {
    rand::rng().random_range(-NOISE_SPAN..=NOISE_SPAN)
}
