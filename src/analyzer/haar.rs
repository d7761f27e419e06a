use image::{GrayImage, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use tracing::debug;

use crate::models::FaceRegion;

type IntegralImage = image::ImageBuffer<Luma<u64>, Vec<u64>>;

const MIN_WINDOW: u32 = 48;
const MAX_WINDOW: u32 = 512;
const SCALE_STEP: f64 = 1.2;
const ACCEPT_THRESHOLD: f64 = 0.55;
const OVERLAP_THRESHOLD: f64 = 0.3;

/// Haar-style cascade over integral images. Looks for the brightness
/// patterns of a frontal face (dark eye band, bright nose bridge, mouth
/// line) with a sliding window at multiple scales.
pub struct HaarFaceDetector {
    features: Vec<HaarFeature>,
}

/// One rectangle feature in unit coordinates of the detection window,
/// so a single definition serves every window scale.
#[derive(Clone, Copy, Debug)]
struct HaarFeature {
    kind: FeatureKind,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    min_contrast: f64,
    weight: f64,
}

#[derive(Clone, Copy, Debug)]
enum FeatureKind {
    /// Upper half darker than lower half (eye band over cheeks).
    DarkOverLight,
    /// Center strip brighter than its sides (nose bridge).
    BrightCenterVertical,
    /// Middle third darker than the thirds above and below (mouth line).
    DarkCenterHorizontal,
}

#[derive(Clone, Copy, Debug)]
pub struct FaceCandidate {
    pub region: FaceRegion,
    pub confidence: f64,
}

impl HaarFaceDetector {
    pub fn new() -> Self {
        Self {
            features: vec![
                HaarFeature {
                    kind: FeatureKind::DarkOverLight,
                    x: 0.15,
                    y: 0.20,
                    w: 0.70,
                    h: 0.28,
                    min_contrast: 0.015,
                    weight: 2.0,
                },
                HaarFeature {
                    kind: FeatureKind::BrightCenterVertical,
                    x: 0.30,
                    y: 0.25,
                    w: 0.40,
                    h: 0.35,
                    min_contrast: 0.010,
                    weight: 1.5,
                },
                HaarFeature {
                    kind: FeatureKind::DarkCenterHorizontal,
                    x: 0.25,
                    y: 0.55,
                    w: 0.50,
                    h: 0.30,
                    min_contrast: 0.010,
                    weight: 1.7,
                },
                HaarFeature {
                    kind: FeatureKind::DarkOverLight,
                    x: 0.10,
                    y: 0.05,
                    w: 0.80,
                    h: 0.35,
                    min_contrast: 0.010,
                    weight: 1.2,
                },
                HaarFeature {
                    kind: FeatureKind::BrightCenterVertical,
                    x: 0.05,
                    y: 0.20,
                    w: 0.30,
                    h: 0.25,
                    min_contrast: 0.008,
                    weight: 0.8,
                },
            ],
        }
    }

    /// Runs the full multi-scale scan and returns surviving candidates,
    /// strongest first.
    pub fn detect(&self, gray: &GrayImage) -> Vec<FaceCandidate> {
        let (width, height) = gray.dimensions();
        if width < MIN_WINDOW || height < MIN_WINDOW {
            return Vec::new();
        }

        let integral: IntegralImage = integral_image::<_, u64>(gray);

        let mut candidates = Vec::new();
        let mut window = MIN_WINDOW;
        while window <= width.min(height) && window <= MAX_WINDOW {
            candidates.extend(self.scan_at_scale(&integral, gray.dimensions(), window));
            window = ((window as f64) * SCALE_STEP) as u32 + 1;
        }

        let survivors = suppress_overlaps(candidates);
        debug!("Haar scan kept {} face candidates", survivors.len());
        survivors
    }

    /// The single most confident detection, if any.
    pub fn primary_face(&self, gray: &GrayImage) -> Option<FaceRegion> {
        self.detect(gray).first().map(|c| c.region)
    }

    fn scan_at_scale(
        &self,
        integral: &IntegralImage,
        (img_width, img_height): (u32, u32),
        window: u32,
    ) -> Vec<FaceCandidate> {
        let step = (window / 4).max(8);
        let mut found = Vec::new();

        let mut y = 0;
        while y + window <= img_height {
            let mut x = 0;
            while x + window <= img_width {
                let confidence = self.score_window(integral, x, y, window);
                if confidence >= ACCEPT_THRESHOLD {
                    found.push(FaceCandidate {
                        region: FaceRegion {
                            x,
                            y,
                            width: window,
                            height: window,
                        },
                        confidence,
                    });
                }
                x += step;
            }
            y += step;
        }

        found
    }

    /// Weighted fraction of features whose expected contrast shows up in
    /// this window.
    fn score_window(&self, integral: &IntegralImage, wx: u32, wy: u32, window: u32) -> f64 {
        let mut matched = 0.0;
        let mut total = 0.0;

        for feature in &self.features {
            let fx = wx + (feature.x * window as f64) as u32;
            let fy = wy + (feature.y * window as f64) as u32;
            let fw = ((feature.w * window as f64) as u32).max(2);
            let fh = ((feature.h * window as f64) as u32).max(2);

            let contrast = feature_contrast(integral, feature.kind, fx, fy, fw, fh);
            if contrast > feature.min_contrast {
                matched += feature.weight;
            }
            total += feature.weight;
        }

        matched / total
    }
}

impl Default for HaarFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed contrast of the pattern, in normalized [0, 1] luma units.
fn feature_contrast(
    integral: &IntegralImage,
    kind: FeatureKind,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> f64 {
    match kind {
        FeatureKind::DarkOverLight => {
            let half = h / 2;
            let upper = region_mean(integral, x, y, w, half);
            let lower = region_mean(integral, x, y + half, w, h - half);
            lower - upper
        }
        FeatureKind::BrightCenterVertical => {
            let third = w / 3;
            let left = region_mean(integral, x, y, third, h);
            let center = region_mean(integral, x + third, y, third, h);
            let right = region_mean(integral, x + 2 * third, y, w - 2 * third, h);
            center - (left + right) / 2.0
        }
        FeatureKind::DarkCenterHorizontal => {
            let third = h / 3;
            let upper = region_mean(integral, x, y, w, third);
            let middle = region_mean(integral, x, y + third, w, third);
            let lower = region_mean(integral, x, y + 2 * third, w, h - 2 * third);
            (upper + lower) / 2.0 - middle
        }
    }
}

/// Mean luma of the rectangle, normalized to [0, 1]. The integral image
/// is one pixel wider and taller than the source.
fn region_mean(integral: &IntegralImage, x: u32, y: u32, w: u32, h: u32) -> f64 {
    if w == 0 || h == 0 {
        return 0.0;
    }
    let (iw, ih) = integral.dimensions();
    let right = (x + w - 1).min(iw.saturating_sub(2));
    let bottom = (y + h - 1).min(ih.saturating_sub(2));
    if x > right || y > bottom {
        return 0.0;
    }

    let sum = sum_image_pixels(integral, x, y, right, bottom)[0] as f64;
    let area = ((right - x + 1) * (bottom - y + 1)) as f64;
    sum / area / 255.0
}

fn suppress_overlaps(mut candidates: Vec<FaceCandidate>) -> Vec<FaceCandidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceCandidate> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| overlap_ratio(&k.region, &candidate.region) >= OVERLAP_THRESHOLD);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn overlap_ratio(a: &FaceRegion, b: &FaceRegion) -> f64 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = ((x2 - x1) * (y2 - y1)) as f64;
    let union = (a.width * a.height + b.width * b.height) as f64 - intersection;
    intersection / union
}
