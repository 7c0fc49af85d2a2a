#![warn(clippy::all, clippy::clone_on_ref_ptr, clippy::mod_module_files)]

//! Face localization that starts from the eyes.
//!
//! An eye detector is run on the image at several rotations, the hits are
//! deduplicated and paired up, and every plausible pair spawns a leveled crop
//! of the expected face region that a face detector re-checks. The actual
//! pattern classifiers are supplied by the caller through [`ObjectDetector`].

pub mod area;
pub mod config;
pub mod detector;
pub mod finder;
pub mod point;
pub mod rotate;

use image::{buffer::ConvertBuffer, GrayImage};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

pub use area::DetectedArea;
pub use config::{FaceProportions, FinderConfig};
pub use detector::{ObjectDetector, RawRect, ScanParams};
pub use finder::{CropWindow, EyePair, FaceFinder, FaceSearchTrace, SearchOutcome};
pub use point::Point;

#[derive(Error, Debug)]
pub enum EyePairError {
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("Scale factor must be a finite number greater than 1, got {0}")]
    InvalidScaleFactor(f64),
    #[error("Invalid finder configuration: {0}")]
    InvalidConfig(String),
    #[error("Frame deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },
}

/// How a face was found. Only useful for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceProvenance {
    /// Center of the searched crop in the leveled image.
    pub crop_center: Point,
    /// Clockwise rotation, in degrees, that leveled the eyes.
    pub relative_angle: f64,
    /// Whether the face only showed up in the upside-down crop.
    pub upside_down: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    /// Face rectangle in pixel coordinates of the searched image. It is
    /// generally tilted, following the line between the eyes.
    pub area: DetectedArea,
    pub provenance: FaceProvenance,
}

/// One-shot search with default tuning. Callers processing many frames should
/// keep a [`FaceFinder`] around instead.
pub fn detect_faces<T: ConvertBuffer<GrayImage>>(
    image_buffer: &T,
    eye_detector: Arc<dyn ObjectDetector>,
    face_detector: Arc<dyn ObjectDetector>,
    params: &ScanParams,
) -> Result<Vec<Face>, EyePairError> {
    let image_buffer = image_buffer.convert();
    FaceFinder::new(eye_detector, face_detector).find_faces(&image_buffer, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn nothing_to_find_is_not_an_error() {
        let image = RgbImage::from_pixel(64, 48, Rgb([40, 80, 120]));
        let nothing = Arc::new(|_: &GrayImage, _: &ScanParams| Vec::<RawRect>::new());
        let faces = detect_faces(
            &image,
            Arc::clone(&nothing) as Arc<dyn ObjectDetector>,
            nothing,
            &ScanParams::default(),
        )
        .unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn detectors_see_grayscale_at_every_angle() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let eye_detector = Arc::new(move |image: &GrayImage, _: &ScanParams| {
            recorder.lock().unwrap().push(image.dimensions());
            Vec::<RawRect>::new()
        });
        let face_detector = Arc::new(|_: &GrayImage, _: &ScanParams| Vec::<RawRect>::new());
        let image = RgbImage::new(30, 20);
        detect_faces(&image, eye_detector, face_detector, &ScanParams::default()).unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        // 0 and 90 degrees, plus the two diagonal scans on a 36x36 canvas.
        assert_eq!(seen, vec![(20, 30), (30, 20), (36, 36), (36, 36)]);
    }

    #[test]
    fn errors_read_well() {
        let error = EyePairError::InvalidScaleFactor(0.5);
        assert_eq!(
            error.to_string(),
            "Scale factor must be a finite number greater than 1, got 0.5"
        );
    }
}
