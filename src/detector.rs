//! Boundary to the pattern classifiers that produce candidate rectangles.

use crate::EyePairError;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned candidate rectangle as reported by a detector, in pixel
/// coordinates of the raster it was run on (upper-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RawRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Detectors have been known to report degenerate rectangles; those carry
    /// no usable geometry.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Squared length of the diagonal.
    pub fn diagonal_squared(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        w * w + h * h
    }
}

/// Tuning passed through to every detector invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Pyramid step between scanned window sizes. Must be greater than 1.
    pub scale_factor: f64,
    /// How many overlapping raw hits a candidate needs to be reported.
    pub min_neighbors: u32,
}

impl ScanParams {
    pub fn new(scale_factor: f64, min_neighbors: u32) -> Result<Self, EyePairError> {
        let params = Self { scale_factor, min_neighbors };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), EyePairError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(EyePairError::InvalidScaleFactor(self.scale_factor));
        }
        Ok(())
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self { scale_factor: 1.1, min_neighbors: 10 }
    }
}

/// A black-box object detector, e.g. a cascade classifier trained for eyes or
/// frontal faces.
///
/// Implementations give no ordering guarantee over the returned rectangles.
/// Detectors are shared between worker threads, hence `Send + Sync`.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &GrayImage, params: &ScanParams) -> Vec<RawRect>;
}

impl<F> ObjectDetector for F
where
    F: Fn(&GrayImage, &ScanParams) -> Vec<RawRect> + Send + Sync,
{
    fn detect(&self, image: &GrayImage, params: &ScanParams) -> Vec<RawRect> {
        self(image, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_must_exceed_one() {
        assert!(ScanParams::new(1.1, 0).is_ok());
        for bad in [1.0, 0.5, -2.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ScanParams::new(bad, 3),
                Err(EyePairError::InvalidScaleFactor(_))
            ));
        }
    }

    #[test]
    fn default_params_are_valid() {
        assert!(ScanParams::default().validate().is_ok());
    }

    #[test]
    fn closures_are_detectors() {
        let detector = |image: &GrayImage, _: &ScanParams| {
            vec![RawRect::new(0, 0, image.width() as i32, image.height() as i32)]
        };
        let found = detector.detect(&GrayImage::new(8, 6), &ScanParams::default());
        assert_eq!(found, vec![RawRect::new(0, 0, 8, 6)]);
    }

    #[test]
    fn degenerate_rectangles_have_no_area() {
        assert!(RawRect::new(3, 3, 4, 5).has_area());
        assert!(!RawRect::new(3, 3, 0, 5).has_area());
        assert!(!RawRect::new(3, 3, 4, -1).has_area());
        assert_eq!(RawRect::new(0, 0, 3, 4).diagonal_squared(), 25.0);
    }
}
