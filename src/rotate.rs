//! Raster rotation onto a canvas just large enough to hold the whole rotated
//! image, so nothing near the corners is cropped away.

use crate::{point::Point, EyePairError};
use image::{imageops, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate as rotate_about, Interpolation};
use log::trace;

/// Background value for canvas area not covered by the source raster.
const BACKGROUND: Luma<u8> = Luma([0]);

/// Slack for floating point noise when rounding canvas sizes up, so that an
/// exact quarter turn does not grow the canvas by a pixel.
const SIZE_EPSILON: f64 = 1e-6;

/// Center of a raster in continuous pixel coordinates.
pub fn center_of(image: &GrayImage) -> Point {
    Point::new(image.width() as f64 / 2.0, image.height() as f64 / 2.0)
}

/// Smallest (width, height) that contains a `width` x `height` raster rotated by
/// `angle` degrees around its own center.
///
/// The diagonal of the source is swept by the angle folded into [0, 90); which
/// of the two diagonal angles drives the width depends on the 90 degree band
/// the full angle falls in. Multiples of 90 degrees go through the same formula.
pub fn fitting_dimensions(width: u32, height: u32, angle: f64) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let diagonal = w.hypot(h);
    let diagonal_angle_a = w.atan2(h);
    let diagonal_angle_b = std::f64::consts::FRAC_PI_2 - diagonal_angle_a;

    let angle = angle.rem_euclid(360.0);
    let folded = angle.rem_euclid(90.0).to_radians();
    let span = |diagonal_angle: f64| (diagonal_angle + folded).sin() * diagonal;

    let width_follows_a = (0.0..90.0).contains(&angle) || (180.0..270.0).contains(&angle);
    let (fitting_width, fitting_height) = if width_follows_a {
        (span(diagonal_angle_a), span(diagonal_angle_b))
    } else {
        (span(diagonal_angle_b), span(diagonal_angle_a))
    };

    let round_up = |v: f64| ((v - SIZE_EPSILON).ceil() as u32).max(1);
    (round_up(fitting_width), round_up(fitting_height))
}

/// Rotates `image` counter-clockwise by `angle` degrees onto a fitted canvas.
pub fn rotate_counter_clockwise(
    image: &GrayImage,
    angle: f64,
) -> Result<GrayImage, EyePairError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EyePairError::EmptyImage { width, height });
    }

    let angle = angle.rem_euclid(360.0);
    let (fitting_width, fitting_height) = fitting_dimensions(width, height, angle);

    // The intermediate canvas has to hold both the source and the target.
    let canvas_width = fitting_width.max(width);
    let canvas_height = fitting_height.max(height);
    trace!(
        "Rotating {width}x{height} by {angle} degrees on a {canvas_width}x{canvas_height} \
         canvas, cropping to {fitting_width}x{fitting_height}"
    );

    let mut canvas = GrayImage::from_pixel(canvas_width, canvas_height, BACKGROUND);
    imageops::overlay(
        &mut canvas,
        image,
        (canvas_width - width) / 2,
        (canvas_height - height) / 2,
    );

    // imageproc addresses pixel centers by their integer index and turns
    // clockwise for positive angles.
    let pivot = ((canvas_width as f32 - 1.0) / 2.0, (canvas_height as f32 - 1.0) / 2.0);
    let rotated = rotate_about(
        &canvas,
        pivot,
        -(angle.to_radians() as f32),
        Interpolation::Bilinear,
        BACKGROUND,
    );

    Ok(imageops::crop_imm(
        &rotated,
        (canvas_width - fitting_width) / 2,
        (canvas_height - fitting_height) / 2,
        fitting_width,
        fitting_height,
    )
    .to_image())
}

/// Rotates `image` clockwise by `angle` degrees onto a fitted canvas.
pub fn rotate_clockwise(image: &GrayImage, angle: f64) -> Result<GrayImage, EyePairError> {
    rotate_counter_clockwise(image, -angle)
}

/// Turns `image` upside down. The canvas keeps its dimensions.
pub fn rotate_half_turn(image: &GrayImage) -> GrayImage {
    imageops::rotate180(image)
}
