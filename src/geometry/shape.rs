use kurbo::Shape;

use crate::foundation::core::{BezPath, Rect};

const PATH_TOLERANCE: f64 = 0.1;

/// Closed path for `rect` with corners rounded by `radius`.
///
/// A non-positive radius yields a plain rectangle; larger radii are limited to half the shorter
/// side so opposite corners never overlap.
pub fn rounded_rect_path(rect: Rect, radius: f64) -> BezPath {
    let r = clamp_corner_radius(rect, radius);
    if r <= 0.0 {
        return rect.to_path(PATH_TOLERANCE);
    }
    kurbo::RoundedRect::from_rect(rect, r).to_path(PATH_TOLERANCE)
}

pub fn clamp_corner_radius(rect: Rect, radius: f64) -> f64 {
    if !radius.is_finite() || radius <= 0.0 {
        return 0.0;
    }
    let r = rect.width().abs().min(rect.height().abs()) / 2.0;
    radius.min(r)
}

/// Scale a corner radius authored against `baseline` px to a `width`×`height` canvas.
pub fn scaled_corner_radius(radius: f64, width: f64, height: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return radius;
    }
    radius * width.min(height) / baseline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_radius_is_plain_rect() {
        let rect = Rect::new(-10.0, -5.0, 10.0, 5.0);
        let p = rounded_rect_path(rect, 0.0);
        assert!(
            p.elements()
                .iter()
                .all(|el| !matches!(el, kurbo::PathEl::CurveTo(..) | kurbo::PathEl::QuadTo(..)))
        );
        assert_eq!(p.bounding_box(), rect);
    }

    #[test]
    fn radius_is_clamped_to_half_short_side() {
        let rect = Rect::new(0.0, 0.0, 100.0, 40.0);
        assert_eq!(clamp_corner_radius(rect, 500.0), 20.0);
        assert_eq!(clamp_corner_radius(rect, 8.0), 8.0);
        assert_eq!(clamp_corner_radius(rect, f64::NAN), 0.0);

        let p = rounded_rect_path(rect, 500.0);
        let bb = p.bounding_box();
        assert!((bb.width() - 100.0).abs() < 1e-6);
        assert!((bb.height() - 40.0).abs() < 1e-6);
        assert!(p.contains(kurbo::Point::new(50.0, 20.0)));
        assert!(!p.contains(kurbo::Point::new(0.5, 0.5)));
    }

    #[test]
    fn radius_scales_against_baseline() {
        assert_eq!(scaled_corner_radius(24.0, 1320.0, 2868.0, 1500.0), 24.0 * 1320.0 / 1500.0);
        assert_eq!(scaled_corner_radius(24.0, 3000.0, 1500.0, 1500.0), 24.0);
    }
}
