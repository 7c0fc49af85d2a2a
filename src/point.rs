use serde::{Deserialize, Serialize};

/// A position in raster space. The y axis points down, as in pixel coordinates,
/// so "clockwise" below means clockwise as seen on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Rotates this point clockwise around `origin` by `angle` degrees.
    pub fn rotate_clockwise(&self, origin: &Point, angle: f64) -> Point {
        let (sin, cos) = angle.to_radians().sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Point::new(origin.x + dx * cos - dy * sin, origin.y + dx * sin + dy * cos)
    }

    /// Rotates this point counter-clockwise around `origin` by `angle` degrees.
    /// Exact inverse of [`Point::rotate_clockwise`] for the same origin and angle.
    pub fn rotate_counter_clockwise(&self, origin: &Point, angle: f64) -> Point {
        self.rotate_clockwise(origin, -angle)
    }

    /// Angle in degrees of the line from this point to `other`, measured
    /// counter-clockwise from the positive x axis. Result lies in (-180, 180].
    ///
    /// Rotating `other` clockwise around `self` by this angle puts both points
    /// on the same horizontal line.
    pub fn relative_angle(&self, other: &Point) -> f64 {
        (-(other.y - self.y)).atan2(other.x - self.x).to_degrees()
    }

    /// Returns the point whose offset from `new_origin` equals this point's
    /// offset from `old_origin`.
    pub fn project(&self, old_origin: &Point, new_origin: &Point) -> Point {
        Point::new(
            new_origin.x + (self.x - old_origin.x),
            new_origin.y + (self.y - old_origin.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn distance() {
        assert_eq!(Point::new(0.0, 0.0).distance_to(&Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn clockwise_is_clockwise_on_screen() {
        // With y pointing down, a quarter turn clockwise moves "east" to "south".
        let origin = Point::new(10.0, 10.0);
        let east = Point::new(11.0, 10.0);
        assert_close(east.rotate_clockwise(&origin, 90.0), Point::new(10.0, 11.0));
        assert_close(east.rotate_counter_clockwise(&origin, 90.0), Point::new(10.0, 9.0));
    }

    #[test]
    fn rotation_round_trip() {
        let point = Point::new(37.5, -12.25);
        let origin = Point::new(-4.0, 81.0);
        for angle in [0.0, 30.0, 45.0, 90.0, 180.0, 270.0, 359.0] {
            let there = point.rotate_clockwise(&origin, angle);
            assert_close(there.rotate_counter_clockwise(&origin, angle), point);
            let back = point.rotate_counter_clockwise(&origin, angle);
            assert_close(back.rotate_clockwise(&origin, angle), point);
        }
    }

    #[test]
    fn rotation_keeps_distance_to_origin() {
        let point = Point::new(3.0, 7.0);
        let origin = Point::new(1.0, 1.0);
        let rotated = point.rotate_clockwise(&origin, 123.0);
        assert!((rotated.distance_to(&origin) - point.distance_to(&origin)).abs() < EPSILON);
    }

    #[test]
    fn projection_identity() {
        let point = Point::new(5.0, 6.0);
        let origin = Point::new(-2.0, 9.5);
        assert_eq!(point.project(&origin, &origin), point);
    }

    #[test]
    fn projection_preserves_offset() {
        let point = Point::new(5.0, 6.0);
        let projected = point.project(&Point::new(1.0, 1.0), &Point::new(100.0, 50.0));
        assert_close(projected, Point::new(104.0, 55.0));
    }

    #[test]
    fn relative_angle_levels_the_line() {
        let left = Point::new(10.0, 10.0);
        assert!(left.relative_angle(&Point::new(20.0, 10.0)).abs() < EPSILON);
        // Right point higher on screen means a counter-clockwise tilt.
        assert!((left.relative_angle(&Point::new(20.0, 0.0)) - 45.0).abs() < EPSILON);
        assert!((left.relative_angle(&Point::new(20.0, 20.0)) + 45.0).abs() < EPSILON);

        let right = Point::new(31.0, 24.0);
        let angle = left.relative_angle(&right);
        let leveled = right.rotate_clockwise(&left, angle);
        assert!((leveled.y - left.y).abs() < EPSILON);
        assert!(leveled.x > left.x);
    }
}
