use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::FaceRegion;

/// Frontal-face cascade backed by the system OpenCV install. Only built
/// with the `opencv-face` feature; the pure-Rust detector remains the
/// fallback when the cascade file or library is missing.
pub struct OpenCvCascade {
    cascade_path: PathBuf,
}

impl OpenCvCascade {
    pub fn new() -> Result<Self> {
        let cascade_path = find_cascade()?;
        info!("OpenCV cascade found at {}", cascade_path.display());
        Ok(Self { cascade_path })
    }

    /// Largest detected face, if any.
    pub fn detect_primary(&self, image_path: &Path) -> Result<Option<FaceRegion>> {
        use opencv::{core, imgcodecs, imgproc, objdetect, prelude::*};

        let mut cascade = objdetect::CascadeClassifier::new(&self.cascade_path.to_string_lossy())
            .context("failed to load Haar cascade")?;
        if cascade.empty()? {
            bail!("cascade classifier is empty");
        }

        let img = imgcodecs::imread(&image_path.to_string_lossy(), imgcodecs::IMREAD_COLOR)
            .context("failed to load image")?;
        if img.empty() {
            bail!("image could not be read");
        }

        let mut gray = Mat::default();
        imgproc::cvt_color(
            &img,
            &mut gray,
            imgproc::COLOR_BGR2GRAY,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .context("failed to convert to grayscale")?;

        let mut faces = core::Vector::<core::Rect>::new();
        cascade
            .detect_multi_scale(
                &gray,
                &mut faces,
                1.1,
                5,
                0,
                core::Size::new(30, 30),
                core::Size::new(0, 0),
            )
            .context("cascade detection failed")?;

        let mut best: Option<FaceRegion> = None;
        for rect in faces.iter() {
            let candidate = FaceRegion {
                x: rect.x.max(0) as u32,
                y: rect.y.max(0) as u32,
                width: rect.width.max(0) as u32,
                height: rect.height.max(0) as u32,
            };
            let larger = best
                .map(|b| candidate.width * candidate.height > b.width * b.height)
                .unwrap_or(true);
            if larger {
                best = Some(candidate);
            }
        }

        Ok(best)
    }
}

fn find_cascade() -> Result<PathBuf> {
    let local_cascade = PathBuf::from("models/haarcascade_frontalface_default.xml");
    if local_cascade.exists() {
        return Ok(local_cascade);
    }

    let possible_paths = [
        "/opt/homebrew/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
        "/usr/local/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
        "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
    ];

    for path in possible_paths {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    bail!("could not find Haar cascade file; place one at models/haarcascade_frontalface_default.xml")
}
