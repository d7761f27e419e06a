use image::{DynamicImage, GrayImage};
use rand::Rng;
use std::path::Path;
use tracing::debug;
#[cfg(feature = "opencv-face")]
use tracing::warn;

use super::haar::HaarFaceDetector;
use crate::models::{Emotion, FaceRegion, Gender};

pub const DEFAULT_AGE: u32 = 25;

const BRIGHT_EMOTION_THRESHOLD: f64 = 150.0;
const DARK_EMOTION_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct FaceAttributes {
    pub age: u32,
    pub gender: Gender,
    pub emotion: Option<Emotion>,
    pub region: Option<FaceRegion>,
}

impl FaceAttributes {
    pub fn defaults() -> Self {
        Self {
            age: DEFAULT_AGE,
            gender: Gender::Unknown,
            emotion: None,
            region: None,
        }
    }
}

/// Uniform result of one backend attempt. Errors are logged by the
/// backend itself and collapse to `Failed`, so a broken backend can
/// never abort the request.
#[derive(Debug, Clone)]
pub enum DetectorOutcome {
    Detected(FaceAttributes),
    NoDetection,
    Failed,
}

pub struct ImageInput<'a> {
    pub image: &'a DynamicImage,
    pub path: Option<&'a Path>,
}

pub trait AttributeBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn inspect(&self, input: &ImageInput) -> DetectorOutcome;
}

/// Backend A: face detection plus heuristic age/gender regression over
/// the detected face crop. Supplies the face region used downstream by
/// the pixel feature estimator; never reports an emotion.
pub struct FaceEngineBackend {
    detector: HaarFaceDetector,
    #[cfg(feature = "opencv-face")]
    cascade: Option<super::opencv_detector::OpenCvCascade>,
}

impl FaceEngineBackend {
    pub fn new() -> Self {
        #[cfg(feature = "opencv-face")]
        let cascade = match super::opencv_detector::OpenCvCascade::new() {
            Ok(cascade) => Some(cascade),
            Err(e) => {
                warn!("OpenCV cascade unavailable, using built-in detector: {}", e);
                None
            }
        };

        Self {
            detector: HaarFaceDetector::new(),
            #[cfg(feature = "opencv-face")]
            cascade,
        }
    }

    fn find_face(&self, input: &ImageInput, gray: &GrayImage) -> Option<FaceRegion> {
        #[cfg(feature = "opencv-face")]
        if let (Some(cascade), Some(path)) = (&self.cascade, input.path) {
            match cascade.detect_primary(path) {
                Ok(Some(region)) => return Some(region),
                Ok(None) => {}
                Err(e) => warn!("OpenCV detection failed: {}", e),
            }
        }
        #[cfg(not(feature = "opencv-face"))]
        let _ = input;

        self.detector.primary_face(gray)
    }
}

impl Default for FaceEngineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeBackend for FaceEngineBackend {
    fn name(&self) -> &'static str {
        "face-engine"
    }

    fn inspect(&self, input: &ImageInput) -> DetectorOutcome {
        let gray = input.image.to_luma8();
        let region = match self.find_face(input, &gray) {
            Some(region) => region,
            None => return DetectorOutcome::NoDetection,
        };

        let crop = crop_to_image(&gray, &region);
        let attrs = FaceAttributes {
            age: estimate_age(&crop),
            gender: estimate_gender(&crop),
            emotion: None,
            region: Some(region),
        };
        DetectorOutcome::Detected(attrs)
    }
}

/// Backend B: whole-image statistics, the "basic" analyzer several
/// deployments ran with when no face model was installed. The only
/// emotion source in the cascade.
pub struct ImageStatsBackend;

impl AttributeBackend for ImageStatsBackend {
    fn name(&self) -> &'static str {
        "image-stats"
    }

    fn inspect(&self, input: &ImageInput) -> DetectorOutcome {
        let gray = input.image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return DetectorOutcome::NoDetection;
        }

        let (brightness, contrast) = luma_stats(&gray);

        let emotion = if brightness > BRIGHT_EMOTION_THRESHOLD {
            Emotion::Happy
        } else if brightness < DARK_EMOTION_THRESHOLD {
            Emotion::Sad
        } else {
            Emotion::Neutral
        };

        // Contrast-to-age mapping and the gender coin flip are carried
        // over from the original basic analyzer.
        let age = (20.0 + (contrast / 255.0) * 60.0).round().clamp(18.0, 65.0) as u32;
        let gender = if rand::rng().random_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };

        DetectorOutcome::Detected(FaceAttributes {
            age,
            gender,
            emotion: Some(emotion),
            region: None,
        })
    }
}

/// Ordered cascade over the detector backends. Age and gender come from
/// the first backend that detects anything; the emotion always comes
/// from the first backend that reports one.
pub struct AttributeExtractor {
    backends: Vec<Box<dyn AttributeBackend>>,
}

impl AttributeExtractor {
    pub fn new() -> Self {
        Self {
            backends: vec![Box::new(FaceEngineBackend::new()), Box::new(ImageStatsBackend)],
        }
    }

    pub fn with_backends(backends: Vec<Box<dyn AttributeBackend>>) -> Self {
        Self { backends }
    }

    pub fn extract(&self, input: &ImageInput) -> FaceAttributes {
        let mut primary: Option<FaceAttributes> = None;
        let mut emotion: Option<Emotion> = None;

        for backend in &self.backends {
            if primary.is_some() && emotion.is_some() {
                break;
            }

            match backend.inspect(input) {
                DetectorOutcome::Detected(attrs) => {
                    debug!(
                        "{}: age={} gender={} emotion={:?}",
                        backend.name(),
                        attrs.age,
                        attrs.gender.as_str(),
                        attrs.emotion
                    );
                    if emotion.is_none() {
                        emotion = attrs.emotion;
                    }
                    if primary.is_none() {
                        primary = Some(attrs);
                    }
                }
                DetectorOutcome::NoDetection => {
                    debug!("{}: no detection", backend.name());
                }
                DetectorOutcome::Failed => {
                    debug!("{}: backend failed", backend.name());
                }
            }
        }

        let mut attrs = primary.unwrap_or_else(FaceAttributes::defaults);
        if attrs.emotion.is_none() {
            attrs.emotion = emotion;
        }
        attrs
    }
}

impl Default for AttributeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn crop_to_image(gray: &GrayImage, region: &FaceRegion) -> GrayImage {
    let (width, height) = gray.dimensions();
    let x = region.x.min(width.saturating_sub(1));
    let y = region.y.min(height.saturating_sub(1));
    let w = region.width.min(width - x).max(1);
    let h = region.height.min(height - y).max(1);
    image::imageops::crop_imm(gray, x, y, w, h).to_image()
}

/// Smoother skin leaves a smaller blur residual; the residual is mapped
/// onto an 18-60 age range. A stand-in for the external age model.
fn estimate_age(face: &GrayImage) -> u32 {
    let blurred = image::imageops::blur(face, 2.0);
    let mut total = 0.0;
    for (orig, smooth) in face.pixels().zip(blurred.pixels()) {
        total += (orig[0] as f64 - smooth[0] as f64).abs();
    }
    let residual = total / (face.width() * face.height()) as f64 / 255.0;

    (18.0 + residual * 400.0).round().clamp(18.0, 60.0) as u32
}

/// Jaw-shadow heuristic: a lower face third noticeably darker than the
/// middle third reads as male. A stand-in for the external gender model.
fn estimate_gender(face: &GrayImage) -> Gender {
    let height = face.height();
    if height < 3 {
        return Gender::Unknown;
    }

    let third = height / 3;
    let middle = band_mean(face, third, 2 * third);
    let lower = band_mean(face, 2 * third, height);

    if lower + 0.02 < middle {
        Gender::Male
    } else {
        Gender::Female
    }
}

fn band_mean(gray: &GrayImage, from_row: u32, to_row: u32) -> f64 {
    let width = gray.width();
    if width == 0 || to_row <= from_row {
        return 0.0;
    }
    let mut total = 0.0;
    for y in from_row..to_row {
        for x in 0..width {
            total += gray.get_pixel(x, y)[0] as f64;
        }
    }
    total / (width * (to_row - from_row)) as f64 / 255.0
}

fn luma_stats(gray: &GrayImage) -> (f64, f64) {
    let count = (gray.width() * gray.height()) as f64;
    let mean = gray.pixels().map(|p| p[0] as f64).sum::<f64>() / count;
    let variance = gray
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    struct StubBackend {
        name: &'static str,
        outcome: DetectorOutcome,
    }

    impl AttributeBackend for StubBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn inspect(&self, _input: &ImageInput) -> DetectorOutcome {
            self.outcome.clone()
        }
    }

    fn flat_image(level: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([level])))
    }

    fn extract_from(extractor: &AttributeExtractor, image: &DynamicImage) -> FaceAttributes {
        extractor.extract(&ImageInput { image, path: None })
    }

    #[test]
    fn stats_backend_reads_emotion_from_brightness() {
        let backend = ImageStatsBackend;
        let bright = flat_image(220);
        let dark = flat_image(40);
        let mid = flat_image(120);

        for (image, expected) in [
            (&bright, Emotion::Happy),
            (&dark, Emotion::Sad),
            (&mid, Emotion::Neutral),
        ] {
            match backend.inspect(&ImageInput { image, path: None }) {
                DetectorOutcome::Detected(attrs) => assert_eq!(attrs.emotion, Some(expected)),
                other => panic!("expected detection, got {:?}", other),
            }
        }
    }

    #[test]
    fn age_and_gender_come_from_first_detection() {
        let first = StubBackend {
            name: "a",
            outcome: DetectorOutcome::Detected(FaceAttributes {
                age: 31,
                gender: Gender::Male,
                emotion: None,
                region: None,
            }),
        };
        let second = StubBackend {
            name: "b",
            outcome: DetectorOutcome::Detected(FaceAttributes {
                age: 77,
                gender: Gender::Female,
                emotion: Some(Emotion::Happy),
                region: None,
            }),
        };

        let extractor =
            AttributeExtractor::with_backends(vec![Box::new(first), Box::new(second)]);
        let attrs = extract_from(&extractor, &flat_image(120));

        // Age/gender from the first backend, emotion filled in by the second.
        assert_eq!(attrs.age, 31);
        assert_eq!(attrs.gender, Gender::Male);
        assert_eq!(attrs.emotion, Some(Emotion::Happy));
    }

    #[test]
    fn failed_backend_is_skipped() {
        let broken = StubBackend {
            name: "broken",
            outcome: DetectorOutcome::Failed,
        };
        let working = StubBackend {
            name: "working",
            outcome: DetectorOutcome::Detected(FaceAttributes {
                age: 22,
                gender: Gender::Female,
                emotion: Some(Emotion::Neutral),
                region: None,
            }),
        };

        let extractor =
            AttributeExtractor::with_backends(vec![Box::new(broken), Box::new(working)]);
        let attrs = extract_from(&extractor, &flat_image(120));
        assert_eq!(attrs.age, 22);
        assert_eq!(attrs.gender, Gender::Female);
    }

    #[test]
    fn no_detection_anywhere_yields_defaults() {
        let a = StubBackend {
            name: "a",
            outcome: DetectorOutcome::NoDetection,
        };
        let b = StubBackend {
            name: "b",
            outcome: DetectorOutcome::Failed,
        };

        let extractor = AttributeExtractor::with_backends(vec![Box::new(a), Box::new(b)]);
        let attrs = extract_from(&extractor, &flat_image(120));
        assert_eq!(attrs.age, DEFAULT_AGE);
        assert_eq!(attrs.gender, Gender::Unknown);
        assert_eq!(attrs.emotion, None);
    }

    #[test]
    fn real_cascade_falls_back_to_stats_on_flat_image() {
        // No face pattern in a flat image, so age/gender and emotion all
        // come from the stats backend.
        let extractor = AttributeExtractor::new();
        let attrs = extract_from(&extractor, &flat_image(200));
        assert!(attrs.region.is_none());
        assert_eq!(attrs.emotion, Some(Emotion::Happy));
        assert!(attrs.gender != Gender::Unknown);
    }
}
