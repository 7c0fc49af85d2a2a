//! Eye-first face search.
//!
//! 1. The eye detector runs on the image rotated to every configured angle;
//!    every hit is carried back into the frame of the unrotated image.
//! 2. Repeated hits of the same eye, within one scan and across scans, are
//!    collapsed into one detection.
//! 3. Detections of similar size at a plausible distance become eye pairs.
//! 4. For each pair the image is rotated so the eyes sit level, the expected
//!    face region is cropped and handed to the face detector, upright first
//!    and upside down if that fails. Hits are carried back into the frame of
//!    the unrotated image.

use crate::{
    area::DetectedArea,
    config::FinderConfig,
    detector::{ObjectDetector, RawRect, ScanParams},
    point::Point,
    rotate::{center_of, rotate_clockwise, rotate_counter_clockwise, rotate_half_turn},
    EyePairError, Face, FaceProvenance,
};
use image::{imageops, GrayImage};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Two detections of similar size at a plausible inter-eye distance. The left
/// eye (smaller center x) always comes first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EyePair {
    left: DetectedArea,
    right: DetectedArea,
}

impl EyePair {
    pub fn new(a: DetectedArea, b: DetectedArea) -> Self {
        if a.center().x <= b.center().x {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }

    pub fn left(&self) -> &DetectedArea {
        &self.left
    }

    pub fn right(&self) -> &DetectedArea {
        &self.right
    }

    pub fn average_radius(&self) -> f64 {
        (self.left.radius() + self.right.radius()) / 2.0
    }

    /// Tilt of the line between the eyes in degrees, folded into [-90, 90):
    /// faces are assumed upright unless the upside-down scan says otherwise.
    pub fn relative_angle(&self) -> f64 {
        let angle = self.left.center().relative_angle(&self.right.center());
        (angle + 90.0).rem_euclid(180.0) - 90.0
    }

    /// Midpoint between the two eye centers.
    pub fn face_origin(&self) -> Point {
        self.left.center().midpoint(&self.right.center())
    }
}

/// Crop rectangle within the leveled (rotated) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// How the face search for one eye pair ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchOutcome {
    Found { upside_down: bool },
    /// The face region fell outside the image.
    EmptyCrop,
    /// The face detector found nothing, upright or upside down.
    NoDetection,
    /// The best candidate was too small for the eyes that spawned it.
    BelowMinimumRadius,
}

/// Report of one per-pair face search, handed to an observer for debugging or
/// visualization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSearchTrace {
    pub pair_index: usize,
    pub relative_angle: f64,
    /// Eye midpoint in the leveled image.
    pub leveled_face_origin: Point,
    pub crop: CropWindow,
    pub outcome: SearchOutcome,
}

/// Tracks the optional per-frame time budget.
struct FrameClock {
    started: Instant,
    deadline: Option<Duration>,
}

impl FrameClock {
    fn start(deadline: Option<Duration>) -> Self {
        Self { started: Instant::now(), deadline }
    }

    fn check(&self) -> Result<(), EyePairError> {
        match self.deadline {
            Some(deadline) if self.started.elapsed() >= deadline => {
                Err(EyePairError::DeadlineExceeded { elapsed: self.started.elapsed() })
            },
            _ => Ok(()),
        }
    }
}

/// Finds faces by way of eye pairs.
///
/// Detectors are loaded once by the caller and shared; a finder holds no
/// per-image state, so one instance can serve any number of frames.
pub struct FaceFinder {
    eye_detector: Arc<dyn ObjectDetector>,
    face_detector: Arc<dyn ObjectDetector>,
    config: FinderConfig,
}

impl FaceFinder {
    pub fn new(
        eye_detector: Arc<dyn ObjectDetector>,
        face_detector: Arc<dyn ObjectDetector>,
    ) -> Self {
        Self { eye_detector, face_detector, config: FinderConfig::default() }
    }

    pub fn with_config(
        eye_detector: Arc<dyn ObjectDetector>,
        face_detector: Arc<dyn ObjectDetector>,
        config: FinderConfig,
    ) -> Result<Self, EyePairError> {
        config.validate()?;
        Ok(Self { eye_detector, face_detector, config })
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Runs the full search: eye pairs first, then one face search per pair.
    pub fn find_faces(
        &self,
        image: &GrayImage,
        params: &ScanParams,
    ) -> Result<Vec<Face>, EyePairError> {
        let clock = FrameClock::start(self.config.frame_deadline);
        let pairs = self.pairs_of_eyes(image, params, &clock)?;
        self.faces_from_pairs(image, &pairs, params, &clock, &|_| {})
    }

    pub fn find_pairs_of_eyes(
        &self,
        image: &GrayImage,
        params: &ScanParams,
    ) -> Result<Vec<EyePair>, EyePairError> {
        let clock = FrameClock::start(self.config.frame_deadline);
        self.pairs_of_eyes(image, params, &clock)
    }

    pub fn find_faces_using_pairs(
        &self,
        image: &GrayImage,
        pairs: &[EyePair],
        params: &ScanParams,
    ) -> Result<Vec<Face>, EyePairError> {
        self.find_faces_using_pairs_observed(image, pairs, params, &|_| {})
    }

    /// Like [`FaceFinder::find_faces_using_pairs`], reporting every per-pair
    /// search to `observer`. Searches run in parallel, so reports arrive in no
    /// particular order; use [`FaceSearchTrace::pair_index`] to match them up.
    pub fn find_faces_using_pairs_observed(
        &self,
        image: &GrayImage,
        pairs: &[EyePair],
        params: &ScanParams,
        observer: &(dyn Fn(&FaceSearchTrace) + Sync),
    ) -> Result<Vec<Face>, EyePairError> {
        let clock = FrameClock::start(self.config.frame_deadline);
        self.faces_from_pairs(image, pairs, params, &clock, observer)
    }

    fn pairs_of_eyes(
        &self,
        image: &GrayImage,
        params: &ScanParams,
        clock: &FrameClock,
    ) -> Result<Vec<EyePair>, EyePairError> {
        check_input(image, params)?;
        clock.check()?;

        let scans = self.scan_all_angles(image, &*self.eye_detector, params)?;
        clock.check()?;

        let eyes = merge_detections(scans, self.config.similar_size_scale);
        debug!("{} distinct eye candidates after merging", eyes.len());

        let pairs = pair_eyes(&eyes, &self.config);
        debug!("{} plausible eye pairs", pairs.len());
        Ok(pairs)
    }

    /// Runs `detector` on the image rotated by every configured angle and
    /// returns one list of hits per angle, in the frame of the unrotated image.
    fn scan_all_angles(
        &self,
        image: &GrayImage,
        detector: &dyn ObjectDetector,
        params: &ScanParams,
    ) -> Result<Vec<Vec<DetectedArea>>, EyePairError> {
        let image_center = center_of(image);
        self.config
            .scan_angles
            .par_iter()
            .map(|&angle| -> Result<Vec<DetectedArea>, EyePairError> {
                let rotated = rotate_counter_clockwise(image, angle)?;
                let rotated_center = center_of(&rotated);
                let areas: Vec<_> = usable_rects(detector.detect(&rotated, params))
                    .map(|rect| {
                        let mut area = DetectedArea::from_rect(&rect);
                        area.rotate_clockwise(&rotated_center, angle);
                        area.project(&rotated_center, &image_center);
                        area
                    })
                    .collect();
                debug!("{} raw detections at {angle} degrees", areas.len());
                Ok(areas)
            })
            .collect()
    }

    fn faces_from_pairs(
        &self,
        image: &GrayImage,
        pairs: &[EyePair],
        params: &ScanParams,
        clock: &FrameClock,
        observer: &(dyn Fn(&FaceSearchTrace) + Sync),
    ) -> Result<Vec<Face>, EyePairError> {
        check_input(image, params)?;
        let faces: Vec<Option<Face>> = pairs
            .par_iter()
            .enumerate()
            .map(|(index, pair)| -> Result<Option<Face>, EyePairError> {
                clock.check()?;
                self.search_face(image, index, pair, params, observer)
            })
            .collect::<Result<_, _>>()?;

        let faces: Vec<Face> = faces.into_iter().flatten().collect();
        debug!("{} faces found for {} eye pairs", faces.len(), pairs.len());
        Ok(faces)
    }

    /// Looks for a face around one eye pair. A pair without a face is not an
    /// error, just `None`.
    fn search_face(
        &self,
        image: &GrayImage,
        pair_index: usize,
        pair: &EyePair,
        params: &ScanParams,
        observer: &(dyn Fn(&FaceSearchTrace) + Sync),
    ) -> Result<Option<Face>, EyePairError> {
        let proportions = &self.config.face;
        let eye_radius = pair.average_radius();
        let min_diagonal_squared = (2.0 * proportions.min_radius * eye_radius).powi(2);
        let relative_angle = pair.relative_angle();

        // Level the eyes and follow the face origin into the leveled image.
        let image_center = center_of(image);
        let leveled = rotate_clockwise(image, relative_angle)?;
        let leveled_center = center_of(&leveled);
        let leveled_origin = pair
            .face_origin()
            .rotate_clockwise(&image_center, relative_angle)
            .project(&image_center, &leveled_center);

        let crop = crop_window(
            &leveled,
            &leveled_origin,
            proportions.half_width * eye_radius,
            proportions.above_eyes * eye_radius,
            proportions.below_eyes * eye_radius,
        );
        let report = |outcome| {
            observer(&FaceSearchTrace {
                pair_index,
                relative_angle,
                leveled_face_origin: leveled_origin,
                crop,
                outcome,
            })
        };

        if crop.is_empty() {
            debug!("Eye pair {pair_index}: face region {crop:?} is empty, skipping");
            report(SearchOutcome::EmptyCrop);
            return Ok(None);
        }

        let cropped =
            imageops::crop_imm(&leveled, crop.x, crop.y, crop.width, crop.height).to_image();
        let crop_center = center_of(&cropped);

        let (biggest, upside_down) = match self.face_in(&cropped, params, min_diagonal_squared) {
            Ok(rect) => (rect, false),
            Err(_) => {
                let flipped = rotate_half_turn(&cropped);
                match self.face_in(&flipped, params, min_diagonal_squared) {
                    Ok(rect) => (rect, true),
                    Err(rejection) => {
                        debug!("Eye pair {pair_index}: no face ({rejection:?})");
                        report(rejection);
                        return Ok(None);
                    },
                }
            },
        };

        let mut area = DetectedArea::from_rect(&biggest);
        if upside_down {
            area.rotate_clockwise(&crop_center, 180.0);
        }
        // Crop -> leveled image -> original image.
        area.project(&crop_center, &crop.center());
        area.rotate_counter_clockwise(&leveled_center, relative_angle);
        area.project(&leveled_center, &image_center);

        report(SearchOutcome::Found { upside_down });
        Ok(Some(Face {
            area,
            provenance: FaceProvenance { crop_center: crop.center(), relative_angle, upside_down },
        }))
    }

    /// Widest face the face detector reports in `crop`, or why there is none.
    fn face_in(
        &self,
        crop: &GrayImage,
        params: &ScanParams,
        min_diagonal_squared: f64,
    ) -> Result<RawRect, SearchOutcome> {
        let biggest =
            widest(self.face_detector.detect(crop, params)).ok_or(SearchOutcome::NoDetection)?;
        if biggest.diagonal_squared() < min_diagonal_squared {
            return Err(SearchOutcome::BelowMinimumRadius);
        }
        Ok(biggest)
    }
}

fn check_input(image: &GrayImage, params: &ScanParams) -> Result<(), EyePairError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EyePairError::EmptyImage { width, height });
    }
    params.validate()
}

fn usable_rects(rects: Vec<RawRect>) -> impl Iterator<Item = RawRect> {
    rects.into_iter().filter(|rect| {
        let usable = rect.has_area();
        if !usable {
            debug!("Detector reported a degenerate rectangle: {rect:?}. Discarding it.");
        }
        usable
    })
}

/// Widest usable rectangle; the first one reported wins ties.
fn widest(rects: Vec<RawRect>) -> Option<RawRect> {
    usable_rects(rects).reduce(|best, rect| if rect.width > best.width { rect } else { best })
}

/// Window of `half_width` left and right, `above` and `below` `origin`,
/// clamped to the image.
fn crop_window(
    image: &GrayImage,
    origin: &Point,
    half_width: f64,
    above: f64,
    below: f64,
) -> CropWindow {
    let (width, height) = (image.width() as f64, image.height() as f64);
    let min_x = (origin.x - half_width).clamp(0.0, width) as u32;
    let max_x = (origin.x + half_width).clamp(0.0, width) as u32;
    let min_y = (origin.y - above).clamp(0.0, height) as u32;
    let max_y = (origin.y + below).clamp(0.0, height) as u32;
    CropWindow {
        x: min_x,
        y: min_y,
        width: max_x.saturating_sub(min_x),
        height: max_y.saturating_sub(min_y),
    }
}

/// Collapses repeated detections of the same object.
///
/// The first scan is deduplicated against itself until no similar, overlapping
/// pair remains. Every detection of the remaining scans is then folded into the
/// first matching survivor or, without a match, kept as a new one.
pub fn merge_detections(scans: Vec<Vec<DetectedArea>>, scale: f64) -> Vec<DetectedArea> {
    let mut scans = scans.into_iter();
    let mut merged = scans.next().unwrap_or_default();
    collapse_duplicates(&mut merged, scale);

    for area in scans.flatten() {
        match merged
            .iter_mut()
            .find(|existing| existing.similar_size(&area, scale) && existing.overlap(&area))
        {
            Some(existing) => existing.merge(area),
            None => merged.push(area),
        }
    }
    merged
}

fn collapse_duplicates(areas: &mut Vec<DetectedArea>, scale: f64) {
    loop {
        let mut merged_any = false;
        let mut i = 0;
        while i < areas.len() {
            let mut j = i + 1;
            while j < areas.len() {
                if areas[i].similar_size(&areas[j], scale) && areas[i].overlap(&areas[j]) {
                    let duplicate = areas.remove(j);
                    areas[i].merge(duplicate);
                    merged_any = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged_any {
            break;
        }
    }
}

/// Pairs up detections of similar size whose centers lie within the configured
/// distance range, measured in average radii.
pub fn pair_eyes(eyes: &[DetectedArea], config: &FinderConfig) -> Vec<EyePair> {
    let (nearest, farthest) = config.eye_distance_range;
    let mut pairs = Vec::new();
    for (i, first) in eyes.iter().enumerate() {
        for second in &eyes[i + 1..] {
            if !first.similar_size(second, config.similar_size_scale) {
                continue;
            }
            let distance = first.center().distance_to(&second.center());
            let average_radius = (first.radius() + second.radius()) / 2.0;
            if distance > nearest * average_radius && distance < farthest * average_radius {
                pairs.push(EyePair::new(first.clone(), second.clone()));
            }
        }
    }
    pairs
}
