use image::{DynamicImage, GrayImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::FaceRegion;

const IDEAL_FACE_RATIO: f64 = 0.78;

const DEFAULT_SYMMETRY: f64 = 82.0;
const DEFAULT_PROPORTIONS: f64 = 78.0;

/// Geometry sub-scores in [0, 100]; expression is added separately from
/// the emotion table.
#[derive(Debug, Clone, Copy)]
pub struct GeometryScores {
    pub symmetry: f64,
    pub skin_clarity: f64,
    pub proportions: f64,
}

/// Which estimator the analyzer runs. The randomized variant reproduces
/// the stub behavior several deployments shipped with; the pixel variant
/// computes the same scores from the image itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureEstimatorKind {
    Pixel,
    Random,
}

impl FromStr for FeatureEstimatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pixel" => Ok(FeatureEstimatorKind::Pixel),
            "random" => Ok(FeatureEstimatorKind::Random),
            other => anyhow::bail!("unknown feature estimator: {}", other),
        }
    }
}

impl FeatureEstimatorKind {
    pub fn build(self) -> Box<dyn FeatureEstimator> {
        match self {
            FeatureEstimatorKind::Pixel => Box::new(PixelFeatureEstimator),
            FeatureEstimatorKind::Random => Box::new(RandomFeatureEstimator),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureEstimatorKind::Pixel => "pixel",
            FeatureEstimatorKind::Random => "random",
        }
    }
}

pub trait FeatureEstimator: Send + Sync {
    fn estimate(&self, image: &DynamicImage, region: Option<&FaceRegion>) -> GeometryScores;
}

/// Derives the sub-scores from pixel statistics: mirrored-half difference
/// for symmetry, blur residual for skin clarity, bounding-box aspect for
/// proportions. Falls back to fixed mid-range values for the face-bound
/// scores when no region was detected.
pub struct PixelFeatureEstimator;

impl FeatureEstimator for PixelFeatureEstimator {
    fn estimate(&self, image: &DynamicImage, region: Option<&FaceRegion>) -> GeometryScores {
        let gray = image.to_luma8();

        let symmetry = match region.and_then(|r| crop_region(&gray, r)) {
            Some(face) => symmetry_score(&face),
            None => DEFAULT_SYMMETRY,
        };

        let skin_clarity = clarity_score(&gray);

        let proportions = match region {
            Some(r) => proportions_score(r),
            None => DEFAULT_PROPORTIONS,
        };

        GeometryScores {
            symmetry,
            skin_clarity,
            proportions,
        }
    }
}

/// Uniform draws in the same ranges the stub deployments used.
pub struct RandomFeatureEstimator;

impl FeatureEstimator for RandomFeatureEstimator {
    fn estimate(&self, _image: &DynamicImage, _region: Option<&FaceRegion>) -> GeometryScores {
        let mut rng = rand::rng();
        GeometryScores {
            symmetry: rng.random_range(70.0..=95.0),
            skin_clarity: rng.random_range(75.0..=95.0),
            proportions: rng.random_range(75.0..=90.0),
        }
    }
}

fn crop_region(gray: &GrayImage, region: &FaceRegion) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if region.x >= width || region.y >= height {
        return None;
    }
    let w = region.width.min(width - region.x);
    let h = region.height.min(height - region.y);
    if w < 2 || h < 2 {
        return None;
    }
    Some(image::imageops::crop_imm(gray, region.x, region.y, w, h).to_image())
}

/// Mean per-pixel difference between the face and its mirror image,
/// scaled so a perfect mirror lands at 95 and heavy asymmetry at 50.
fn symmetry_score(face: &GrayImage) -> f64 {
    let (width, height) = face.dimensions();
    let half = width / 2;
    if half == 0 {
        return DEFAULT_SYMMETRY;
    }

    let mut total = 0.0;
    for y in 0..height {
        for x in 0..half {
            let left = face.get_pixel(x, y)[0] as f64;
            let right = face.get_pixel(width - 1 - x, y)[0] as f64;
            total += (left - right).abs();
        }
    }

    let diff = total / (half * height) as f64 / 255.0;
    (95.0 - diff * 300.0).clamp(50.0, 95.0)
}

/// Smoothness as the mean residual against a blurred copy: noisy or
/// blemished textures leave a larger residual.
fn clarity_score(gray: &GrayImage) -> f64 {
    let blurred = image::imageops::blur(gray, 2.0);

    let mut total = 0.0;
    for (orig, smooth) in gray.pixels().zip(blurred.pixels()) {
        total += (orig[0] as f64 - smooth[0] as f64).abs();
    }

    let residual = total / (gray.width() * gray.height()) as f64 / 255.0;
    (95.0 - residual * 600.0).clamp(50.0, 95.0)
}

fn proportions_score(region: &FaceRegion) -> f64 {
    let deviation = (region.aspect_ratio() - IDEAL_FACE_RATIO).abs();
    (95.0 - deviation * 150.0).clamp(60.0, 95.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient_image(size: u32) -> DynamicImage {
        let img = GrayImage::from_fn(size, size, |x, y| Luma([((x + y) % 256) as u8]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn estimator_kind_parses() {
        assert_eq!(
            "pixel".parse::<FeatureEstimatorKind>().unwrap(),
            FeatureEstimatorKind::Pixel
        );
        assert_eq!(
            " Random ".parse::<FeatureEstimatorKind>().unwrap(),
            FeatureEstimatorKind::Random
        );
        assert!("montecarlo".parse::<FeatureEstimatorKind>().is_err());
    }

    #[test]
    fn pixel_scores_are_bounded() {
        let image = gradient_image(64);
        let region = FaceRegion {
            x: 8,
            y: 8,
            width: 40,
            height: 48,
        };
        let scores = PixelFeatureEstimator.estimate(&image, Some(&region));
        assert!((50.0..=95.0).contains(&scores.symmetry));
        assert!((50.0..=95.0).contains(&scores.skin_clarity));
        assert!((60.0..=95.0).contains(&scores.proportions));
    }

    #[test]
    fn pixel_estimator_defaults_without_region() {
        let image = gradient_image(64);
        let scores = PixelFeatureEstimator.estimate(&image, None);
        assert_eq!(scores.symmetry, DEFAULT_SYMMETRY);
        assert_eq!(scores.proportions, DEFAULT_PROPORTIONS);
    }

    #[test]
    fn mirrored_face_scores_high_symmetry() {
        // Left half mirrors right half exactly.
        let face = GrayImage::from_fn(40, 40, |x, _| {
            let folded = if x < 20 { x } else { 39 - x };
            Luma([(folded * 6) as u8])
        });
        assert!(symmetry_score(&face) > 90.0);
    }

    #[test]
    fn random_scores_respect_ranges() {
        let image = gradient_image(16);
        for _ in 0..200 {
            let scores = RandomFeatureEstimator.estimate(&image, None);
            assert!((70.0..=95.0).contains(&scores.symmetry));
            assert!((75.0..=95.0).contains(&scores.skin_clarity));
            assert!((75.0..=90.0).contains(&scores.proportions));
        }
    }

    #[test]
    fn square_region_is_penalized_against_ideal_ratio() {
        let square = FaceRegion {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        let oval = FaceRegion {
            x: 0,
            y: 0,
            width: 78,
            height: 100,
        };
        assert!(proportions_score(&oval) > proportions_score(&square));
    }
}
