use crate::{detector::RawRect, point::Point};
use serde::Serialize;

/// One candidate detection (an eye or a face): the rectangle's four corners,
/// its center and its circumscribing radius.
///
/// Rotations and projections move all five points together, so the rectangle
/// keeps its shape while it travels between coordinate frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedArea {
    upper_left: Point,
    upper_right: Point,
    lower_left: Point,
    lower_right: Point,
    center: Point,
    /// (width, height) of the rectangle as detected.
    dimensions: (f64, f64),
    /// Half the diagonal, i.e. the distance from `center` to any corner.
    radius: f64,
}

impl DetectedArea {
    pub fn new(upper_left: Point, width: f64, height: f64) -> Self {
        let center = Point::new(upper_left.x + width / 2.0, upper_left.y + height / 2.0);
        Self {
            upper_left,
            upper_right: Point::new(upper_left.x + width, upper_left.y),
            lower_left: Point::new(upper_left.x, upper_left.y + height),
            lower_right: Point::new(upper_left.x + width, upper_left.y + height),
            center,
            dimensions: (width, height),
            radius: center.distance_to(&upper_left),
        }
    }

    pub fn from_rect(rect: &RawRect) -> Self {
        Self::new(
            Point::new(rect.x as f64, rect.y as f64),
            rect.width as f64,
            rect.height as f64,
        )
    }

    pub fn upper_left(&self) -> Point {
        self.upper_left
    }

    pub fn upper_right(&self) -> Point {
        self.upper_right
    }

    pub fn lower_left(&self) -> Point {
        self.lower_left
    }

    pub fn lower_right(&self) -> Point {
        self.lower_right
    }

    /// Outline in drawing order: upper left, upper right, lower right, lower left.
    pub fn corners(&self) -> [Point; 4] {
        [self.upper_left, self.upper_right, self.lower_right, self.lower_left]
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn dimensions(&self) -> (f64, f64) {
        self.dimensions
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn map_points(&mut self, f: impl Fn(&Point) -> Point) {
        for point in [
            &mut self.upper_left,
            &mut self.upper_right,
            &mut self.lower_left,
            &mut self.lower_right,
            &mut self.center,
        ] {
            *point = f(&*point);
        }
    }

    pub fn rotate_clockwise(&mut self, origin: &Point, angle: f64) {
        self.map_points(|p| p.rotate_clockwise(origin, angle));
    }

    pub fn rotate_counter_clockwise(&mut self, origin: &Point, angle: f64) {
        self.map_points(|p| p.rotate_counter_clockwise(origin, angle));
    }

    /// Moves the area so that its offset from `new_origin` equals its current
    /// offset from `old_origin`.
    pub fn project(&mut self, old_origin: &Point, new_origin: &Point) {
        self.map_points(|p| p.project(old_origin, new_origin));
    }

    /// Loose overlap heuristic: centers closer than a quarter of the summed radii.
    ///
    /// This is a tuning policy for collapsing repeated detections of the same
    /// object, not a geometric intersection test.
    pub fn overlap(&self, other: &DetectedArea) -> bool {
        self.center.distance_to(&other.center) < (self.radius + other.radius) / 4.0
    }

    /// True when the smaller radius exceeds `scale` times the larger one.
    /// `scale` lies in (0, 1]; higher values demand closer sizes.
    pub fn similar_size(&self, other: &DetectedArea, scale: f64) -> bool {
        let smaller = self.radius.min(other.radius);
        let larger = self.radius.max(other.radius);
        smaller > larger * scale
    }

    /// Folds another detection of the same object into this one, leaving the
    /// representative of both in `self`. The caller drops `other` from its
    /// collection.
    ///
    /// Currently the smaller of the two is kept.
    pub fn merge(&mut self, other: DetectedArea) {
        if self.radius > other.radius {
            *self = other;
        }
    }
}
