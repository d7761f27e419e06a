use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Parses the loose labels that show up in metadata tables and
    /// detector output ("Man", "woman", "F", ...).
    pub fn from_label(label: &str) -> Gender {
        match label.trim().to_lowercase().as_str() {
            "male" | "man" | "m" | "boy" => Gender::Male,
            "female" | "woman" | "f" | "girl" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Neutral,
    Sad,
    Angry,
    Fear,
    Disgust,
    Surprise,
}

impl Emotion {
    pub fn from_label(label: &str) -> Option<Emotion> {
        match label.trim().to_lowercase().as_str() {
            "happy" | "happiness" => Some(Emotion::Happy),
            "neutral" => Some(Emotion::Neutral),
            "sad" | "sadness" => Some(Emotion::Sad),
            "angry" | "anger" => Some(Emotion::Angry),
            "fear" | "afraid" => Some(Emotion::Fear),
            "disgust" => Some(Emotion::Disgust),
            "surprise" | "surprised" => Some(Emotion::Surprise),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
            Emotion::Surprise => "surprise",
        }
    }
}

/// Axis-aligned face bounding box in image pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// The four heuristic percentage sub-scores, each in [0, 100].
///
/// Field names are camelCase on the wire because the original frontend
/// consumes them that way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureScores {
    pub symmetry: f64,
    pub skin_clarity: f64,
    pub proportions: f64,
    pub expression: f64,
}

/// Transient per-request analysis output. Never persisted.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub age: u32,
    pub gender: Gender,
    pub emotion: Option<Emotion>,
    pub feature_scores: FeatureScores,
    pub beauty_score: f64,
}

/// Canonical celebrity metadata row, normalized once at load time from
/// whatever column names the source CSV uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelebrityInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthplace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beauty_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One reference image in the asset store. Identity is the filename stem.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub display_name: String,
    pub image_path: PathBuf,
    pub file_hash: String,
    pub info: Option<CelebrityInfo>,
}

impl AssetRecord {
    pub fn gender(&self) -> Gender {
        self.info
            .as_ref()
            .and_then(|i| i.gender)
            .unwrap_or(Gender::Unknown)
    }
}

/// The lookalike picked for one request, discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookalikeMatch {
    pub name: String,
    pub similarity: f64,
    pub image: String,
    pub info: Option<CelebrityInfo>,
}

impl LookalikeMatch {
    /// Sentinel returned when the asset store is empty.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            similarity: 0.0,
            image: String::new(),
            info: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityInsights {
    pub achievements: Vec<String>,
    pub personality_traits: Vec<String>,
    pub future_predictions: Vec<String>,
    pub fun_facts: Vec<String>,
}

impl PersonalityInsights {
    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
            && self.personality_traits.is_empty()
            && self.future_predictions.is_empty()
            && self.fun_facts.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub age: u32,
    pub gender: Gender,
    pub emotion: Emotion,
    pub beauty_score: f64,
    pub facial_features: FeatureScores,
}

/// Full JSON body returned by `POST /analyze/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: AnalysisPayload,
    pub lookalike: LookalikeMatch,
    pub personality_insights: PersonalityInsights,
    pub fun_comment: String,
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
}
