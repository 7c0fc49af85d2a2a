use crate::EyePairError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Expected face extent around the midpoint between the eyes, in units of the
/// average eye radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceProportions {
    /// Distance from the eye midpoint to the left and right crop border.
    pub half_width: f64,
    /// Distance from the eye midpoint to the upper crop border.
    pub above_eyes: f64,
    /// Distance from the eye midpoint to the lower crop border.
    pub below_eyes: f64,
    /// Smallest half-diagonal a face rectangle needs to be accepted.
    pub min_radius: f64,
}

impl Default for FaceProportions {
    fn default() -> Self {
        Self { half_width: 4.0, above_eyes: 5.0, below_eyes: 5.0, min_radius: 3.0 }
    }
}

/// Tuning of the eye pairing and face search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Counter-clockwise raster rotations, in degrees, at which the eye detector
    /// runs. Detectors trained on upright objects miss tilted ones, so several
    /// orientations are sampled.
    pub scan_angles: Vec<f64>,
    /// Minimum ratio between the smaller and the larger radius for two
    /// detections to count as the same kind of object.
    pub similar_size_scale: f64,
    /// Accepted eye center distance, as multiples of the average eye radius
    /// (exclusive on both ends).
    pub eye_distance_range: (f64, f64),
    pub face: FaceProportions,
    /// Abandon a frame whose processing runs longer than this.
    pub frame_deadline: Option<Duration>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            scan_angles: vec![0.0, 45.0, 90.0, -45.0],
            similar_size_scale: 0.5,
            eye_distance_range: (1.5, 3.5),
            face: FaceProportions::default(),
            frame_deadline: None,
        }
    }
}

impl FinderConfig {
    pub fn validate(&self) -> Result<(), EyePairError> {
        if self.scan_angles.is_empty() {
            return Err(EyePairError::InvalidConfig("at least one scan angle is required".into()));
        }
        if let Some(angle) = self.scan_angles.iter().find(|a| !a.is_finite()) {
            return Err(EyePairError::InvalidConfig(format!("scan angle {angle} is not finite")));
        }
        if !(self.similar_size_scale > 0.0 && self.similar_size_scale <= 1.0) {
            return Err(EyePairError::InvalidConfig(format!(
                "similar size scale must be in (0, 1], got {}",
                self.similar_size_scale
            )));
        }
        let (min, max) = self.eye_distance_range;
        if !(min >= 0.0 && min < max && max.is_finite()) {
            return Err(EyePairError::InvalidConfig(format!(
                "eye distance range ({min}, {max}) is empty"
            )));
        }
        let face = &self.face;
        let extents = [face.half_width, face.above_eyes, face.below_eyes, face.min_radius];
        if extents.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(EyePairError::InvalidConfig(format!(
                "face proportions must be finite and non-negative: {face:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = FinderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_angles, vec![0.0, 45.0, 90.0, -45.0]);
    }

    #[test]
    fn rejects_bad_tuning() {
        let no_angles = FinderConfig { scan_angles: vec![], ..Default::default() };
        assert!(matches!(no_angles.validate(), Err(EyePairError::InvalidConfig(_))));

        let zero_scale = FinderConfig { similar_size_scale: 0.0, ..Default::default() };
        assert!(zero_scale.validate().is_err());

        let inverted_range = FinderConfig { eye_distance_range: (3.5, 1.5), ..Default::default() };
        assert!(inverted_range.validate().is_err());

        let negative_face = FinderConfig {
            face: FaceProportions { half_width: -1.0, ..Default::default() },
            ..Default::default()
        };
        assert!(negative_face.validate().is_err());
    }
}
