use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::metrics;
use crate::analyzer::FaceAnalyzer;
use crate::commentary::{templates, CommentaryGenerator};
use crate::config::Config;
use crate::matcher::{MatchQuery, MatchSelector};
use crate::models::{
    AnalysisPayload, AnalysisResponse, AnalysisResult, Emotion, FeatureScores,
};
use crate::store::AssetStore;

pub struct AppState {
    pub store: Arc<AssetStore>,
    pub analyzer: Arc<FaceAnalyzer>,
    pub matcher: MatchSelector,
    pub commentary: Arc<CommentaryGenerator>,
    pub scratch_dir: Option<PathBuf>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store: Arc::new(AssetStore::load(config.assets.clone())),
            analyzer: Arc::new(FaceAnalyzer::new(config.analysis.feature_estimator)),
            matcher: MatchSelector::new(config.analysis.match_mode),
            commentary: Arc::new(CommentaryGenerator::new(&config.commentary)),
            scratch_dir: config.analysis.scratch_dir.clone(),
        }
    }
}

/// Error taxonomy for the HTTP surface. Client errors carry instructive
/// or deliberately informal messages; internal detail never leaves the
/// logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Please upload a valid image file (JPG, PNG, etc.)")]
    NotAnImage,
    #[error("{0}")]
    NoUsableFace(&'static str),
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    fn no_usable_face() -> Self {
        ApiError::NoUsableFace(templates::pick(&templates::NO_DETECTION_MESSAGES))
    }

    fn internal(err: anyhow::Error) -> Self {
        error!("Internal error during request: {:#}", err);
        ApiError::Internal(templates::pick(&templates::INTERNAL_ERROR_MESSAGES))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotAnImage | ApiError::NoUsableFace(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

enum PipelineError {
    /// Upload did not decode as an image.
    Unreadable(anyhow::Error),
    Internal(anyhow::Error),
}

pub async fn service_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.store.stats();
    Json(serde_json::json!({
        "message": "Face analysis service is running!",
        "celebrities_loaded": stats.images,
        "metadata_records": stats.metadata_records,
        "feature_estimator": state.analyzer.estimator_kind().as_str(),
        "match_mode": state.matcher.mode().as_str(),
        "remote_commentary": state.commentary.remote_enabled(),
        "opencv_available": cfg!(feature = "opencv-face"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

/// The analyze pipeline: validate the upload, persist it to a scoped
/// temp file, run the analysis on a blocking worker, then match and
/// comment. The temp file is dropped on every exit path.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        _ => return Err(ApiError::NotAnImage),
    };

    let is_image = field
        .content_type()
        .map(|ct| ct.starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        metrics::record_analysis("rejected");
        return Err(ApiError::NotAnImage);
    }

    let bytes = field.bytes().await.map_err(|e| {
        warn!("Failed to read upload body: {}", e);
        metrics::record_analysis("rejected");
        ApiError::NotAnImage
    })?;

    let analysis_id = Uuid::new_v4().to_string();
    let analyzer = state.analyzer.clone();
    let scratch_dir = state.scratch_dir.clone();

    let outcome = tokio::task::spawn_blocking(move || -> Result<AnalysisResult, PipelineError> {
        let mut tmp = match &scratch_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|e| PipelineError::Internal(e.into()))?;

        tmp.write_all(&bytes)
            .and_then(|_| tmp.flush())
            .map_err(|e| PipelineError::Internal(e.into()))?;

        analyzer
            .analyze_file(tmp.path())
            .map_err(PipelineError::Unreadable)
        // tmp drops here, removing the file on success and failure alike
    })
    .await;

    let analysis = match outcome {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(PipelineError::Unreadable(e))) => {
            warn!("Unusable upload for analysis {}: {:#}", analysis_id, e);
            metrics::record_analysis("client_error");
            return Err(ApiError::no_usable_face());
        }
        Ok(Err(PipelineError::Internal(e))) => {
            metrics::record_analysis("server_error");
            return Err(ApiError::internal(e));
        }
        Err(join_err) => {
            metrics::record_analysis("server_error");
            return Err(ApiError::internal(join_err.into()));
        }
    };

    let snapshot = state.store.snapshot();
    let lookalike = state.matcher.select(
        &snapshot,
        &MatchQuery {
            beauty_score: analysis.beauty_score,
            age: analysis.age,
            gender: analysis.gender,
        },
    );

    let (personality_insights, fun_comment) = state
        .commentary
        .generate(
            analysis.age,
            analysis.gender,
            analysis.beauty_score,
            analysis.emotion,
        )
        .await;

    metrics::record_analysis("ok");
    info!(
        "Analysis {} completed: age={} gender={} score={:.1} lookalike={}",
        analysis_id,
        analysis.age,
        analysis.gender.as_str(),
        analysis.beauty_score,
        lookalike.name
    );

    Ok(Json(AnalysisResponse {
        success: true,
        analysis: AnalysisPayload {
            age: analysis.age,
            gender: analysis.gender,
            emotion: analysis.emotion.unwrap_or(Emotion::Neutral),
            beauty_score: round1(analysis.beauty_score),
            facial_features: round_features(&analysis.feature_scores),
        },
        lookalike,
        personality_insights,
        fun_comment,
        analysis_id,
        timestamp: Utc::now(),
    }))
}

pub async fn list_celebrities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let names: Vec<&str> = snapshot
        .records
        .iter()
        .map(|r| r.display_name.as_str())
        .collect();
    let images: Vec<String> = snapshot
        .records
        .iter()
        .map(|r| format!("/celebrities/{}/image", r.display_name.replace(' ', "%20")))
        .collect();

    Json(serde_json::json!({
        "count": names.len(),
        "names": names,
        "images": images,
    }))
}

pub async fn celebrity_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, StatusCode> {
    let snapshot = state.store.snapshot();
    let record = snapshot.find_record(&name).ok_or(StatusCode::NOT_FOUND)?;

    if !record.image_path.exists() {
        return Err(StatusCode::NOT_FOUND);
    }

    match ServeFile::new(&record.image_path)
        .oneshot(axum::http::Request::new(()))
        .await
    {
        Ok(response) => Ok(response.into_response()),
        Err(e) => {
            error!("Failed to serve image: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn csv_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let sample: Vec<_> = snapshot.metadata.iter().take(5).collect();

    Json(serde_json::json!({
        "total_records": snapshot.metadata.len(),
        "sample_records": sample,
    }))
}

pub async fn reload_celebrities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = state.store.clone();
    let stats = tokio::task::spawn_blocking(move || store.reload())
        .await
        .map_err(|e| ApiError::internal(e.into()))?;

    metrics::record_store_reload();
    Ok(Json(serde_json::json!({
        "message": "Celebrities reloaded",
        "count": stats.images,
        "metadata_records": stats.metadata_records,
    })))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_features(features: &FeatureScores) -> FeatureScores {
    FeatureScores {
        symmetry: round1(features.symmetry),
        skin_clarity: round1(features.skin_clarity),
        proportions: round1(features.proportions),
        expression: round1(features.expression),
    }
}
