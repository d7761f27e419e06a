use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;

use starmatch::analyzer::{features::FeatureEstimatorKind, FaceAnalyzer};
use starmatch::api::{create_app, handlers::AppState};
use starmatch::commentary::CommentaryGenerator;
use starmatch::config::{AssetsConfig, CommentaryConfig};
use starmatch::matcher::{MatchMode, MatchSelector};
use starmatch::store::AssetStore;

fn build_app(image_dir: &Path, scratch_dir: Option<PathBuf>) -> Router {
    let store = AssetStore::load(AssetsConfig {
        image_dir: image_dir.to_path_buf(),
        metadata_csv: Some(image_dir.join("celebrities.csv")),
    });

    let commentary = CommentaryConfig {
        openai_api_key: None,
        openai_base_url: None,
        groq_api_key: None,
        groq_base_url: None,
        request_timeout_secs: 5,
    };

    let state = AppState {
        store: Arc::new(store),
        analyzer: Arc::new(FaceAnalyzer::new(FeatureEstimatorKind::Pixel)),
        matcher: MatchSelector::new(MatchMode::Random),
        commentary: Arc::new(CommentaryGenerator::new(&commentary)),
        scratch_dir,
    };

    create_app(state)
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_upload(content_type: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "starmatch-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_empty(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_ok_even_with_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path(), None);

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn status_reports_counts_and_capabilities() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("IU.jpg"), png_bytes()).unwrap();
    let app = build_app(dir.path(), None);

    let json = body_json(get(&app, "/").await).await;
    assert_eq!(json["celebrities_loaded"], 1);
    assert_eq!(json["feature_estimator"], "pixel");
    assert_eq!(json["match_mode"], "random");
    assert_eq!(json["remote_commentary"], false);
}

#[tokio::test]
async fn non_image_upload_is_rejected_with_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path(), None);

    let response = app
        .clone()
        .oneshot(multipart_upload("text/plain", b"hello there"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn analyze_on_empty_store_returns_unknown_lookalike() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path(), None);

    let response = app
        .clone()
        .oneshot(multipart_upload("image/png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["lookalike"]["name"], "Unknown");
    assert_eq!(json["lookalike"]["similarity"], 0.0);

    let score = json["analysis"]["beauty_score"].as_f64().unwrap();
    assert!((1.0..=10.0).contains(&score));
}

#[tokio::test]
async fn analyze_with_assets_returns_full_payload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("IU.jpg"), png_bytes()).unwrap();
    std::fs::write(
        dir.path().join("celebrities.csv"),
        "name,gender,age,group\nIU,female,31,Solo\n",
    )
    .unwrap();
    let app = build_app(dir.path(), None);

    let response = app
        .clone()
        .oneshot(multipart_upload("image/png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["lookalike"]["name"], "IU");
    assert_eq!(json["lookalike"]["image"], "/celebrities/IU/image");

    let similarity = json["lookalike"]["similarity"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&similarity));

    let features = &json["analysis"]["facial_features"];
    for key in ["symmetry", "skinClarity", "proportions", "expression"] {
        let value = features[key].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&value), "{} out of range", key);
    }

    assert!(!json["personality_insights"]["achievements"]
        .as_array()
        .unwrap()
        .is_empty());
    assert!(!json["fun_comment"].as_str().unwrap().is_empty());
    assert!(json["analysis_id"].is_string());
}

#[tokio::test]
async fn reload_picks_up_added_image() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.jpg"), png_bytes()).unwrap();
    let app = build_app(dir.path(), None);

    let json = body_json(get(&app, "/").await).await;
    assert_eq!(json["celebrities_loaded"], 1);

    // A different image, so duplicate collapsing does not eat it.
    let mut other = png_bytes();
    other.extend_from_slice(b"trailer");
    std::fs::write(dir.path().join("two.jpg"), other).unwrap();

    let response = post_empty(&app, "/reload-celebrities/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);

    let json = body_json(get(&app, "/").await).await;
    assert_eq!(json["celebrities_loaded"], 2);
}

#[tokio::test]
async fn scratch_dir_is_clean_after_success_and_failure() {
    let assets = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let app = build_app(assets.path(), Some(scratch.path().to_path_buf()));

    let ok = app
        .clone()
        .oneshot(multipart_upload("image/png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    // Claims to be an image but does not decode: the 400 path.
    let failed = app
        .clone()
        .oneshot(multipart_upload("image/png", b"not really pixels"))
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::BAD_REQUEST);

    let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "temp files were not cleaned up");
}

#[tokio::test]
async fn undecodable_image_gets_playful_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path(), None);

    let response = app
        .clone()
        .oneshot(multipart_upload("image/jpeg", b"corrupted"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(!json["detail"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn celebrity_listing_and_image_are_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Jennie.png"), png_bytes()).unwrap();
    let app = build_app(dir.path(), None);

    let json = body_json(get(&app, "/celebrities/").await).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["names"][0], "Jennie");

    let response = get(&app, "/celebrities/Jennie/image").await;
    assert_eq!(response.status(), StatusCode::OK);

    let missing = get(&app, "/celebrities/Nobody/image").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn csv_stats_reports_table_contents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("celebrities.csv"),
        "name,gender,age\nIU,female,31\nMinho,male,32\n",
    )
    .unwrap();
    let app = build_app(dir.path(), None);

    let json = body_json(get(&app, "/csv-stats/").await).await;
    assert_eq!(json["total_records"], 2);
    assert_eq!(json["sample_records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn metrics_endpoint_responds() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path(), None);

    let response = get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}
