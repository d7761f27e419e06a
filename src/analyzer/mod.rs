pub mod extractor;
pub mod features;
pub mod haar;
#[cfg(feature = "opencv-face")]
pub mod opencv_detector;
pub mod scoring;

use anyhow::Context;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

use crate::models::{AnalysisResult, FeatureScores};
use extractor::{AttributeExtractor, ImageInput};
use features::{FeatureEstimator, FeatureEstimatorKind};

/// The per-request analysis pipeline: attribute extraction, feature
/// estimation, score combination. CPU-bound; callers run it on a
/// blocking worker.
pub struct FaceAnalyzer {
    extractor: AttributeExtractor,
    estimator: Box<dyn FeatureEstimator>,
    estimator_kind: FeatureEstimatorKind,
}

impl FaceAnalyzer {
    pub fn new(kind: FeatureEstimatorKind) -> Self {
        Self {
            extractor: AttributeExtractor::new(),
            estimator: kind.build(),
            estimator_kind: kind,
        }
    }

    pub fn estimator_kind(&self) -> FeatureEstimatorKind {
        self.estimator_kind
    }

    /// Decodes and analyzes an uploaded image file. The only error here
    /// is a payload that does not decode as an image.
    pub fn analyze_file(&self, path: &Path) -> anyhow::Result<AnalysisResult> {
        let image = image::open(path).context("uploaded file did not decode as an image")?;
        Ok(self.analyze_image(&image, Some(path)))
    }

    pub fn analyze_image(&self, image: &DynamicImage, path: Option<&Path>) -> AnalysisResult {
        let attrs = self.extractor.extract(&ImageInput { image, path });

        let geometry = self.estimator.estimate(image, attrs.region.as_ref());
        let feature_scores = FeatureScores {
            symmetry: geometry.symmetry,
            skin_clarity: geometry.skin_clarity,
            proportions: geometry.proportions,
            expression: scoring::expression_score(attrs.emotion),
        };

        let beauty_score = scoring::combine(
            &feature_scores,
            attrs.age,
            attrs.gender,
            attrs.emotion,
            scoring::sample_noise(),
        );

        debug!(
            "Analysis: age={} gender={} emotion={:?} score={:.1}",
            attrs.age,
            attrs.gender.as_str(),
            attrs.emotion,
            beauty_score
        );

        AnalysisResult {
            age: attrs.age,
            gender: attrs.gender,
            emotion: attrs.emotion,
            feature_scores,
            beauty_score,
        }
    }
}
