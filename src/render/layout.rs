//! Where each layer goes on a canvas, independent of pixels.
//!
//! Every position is derived from fractions of the canvas size, so a preview and a full
//! resolution export of the same panel share one relative layout.

use crate::foundation::core::{Affine, Point, Rect};
use crate::frames::catalog::{FrameAssetRef, FrameModel};
use crate::geometry::shape::{clamp_corner_radius, scaled_corner_radius};
use crate::geometry::wrap::wrap_text;
use crate::model::settings::{DescriptionPosition, PreviewSetting, TextPosition};

/// Canvas width divided by the screenshot's long edge before user scaling.
const BASE_SIZE_DIVISOR: f64 = 1.33;
/// Frame width relative to the screenshot edge it wraps.
const FRAME_OVERSIZE: f64 = 1.1;
const LINE_HEIGHT: f64 = 1.2;
/// Wrapped text may use this fraction of the canvas width.
const TEXT_MAX_WIDTH: f64 = 0.8;

/// Screenshot geometry on a canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenshotPlacement {
    pub landscape: bool,
    /// Unscaled size of the screenshot rect, centered on the local origin.
    pub draw_width: f64,
    pub draw_height: f64,
    /// Local origin in canvas display units.
    pub center: Point,
    /// `center` as a fraction of the canvas size.
    pub relative_center: Point,
    pub rotation_deg: f64,
    /// Uniform factor (1.0 = 100%).
    pub scale: f64,
    /// Clip radius in local units, already limited to half the shorter side.
    pub corner_radius: f64,
}

impl ScreenshotPlacement {
    /// Local screenshot space to canvas display units.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.center.to_vec2())
            * Affine::rotate(self.rotation_deg.to_radians())
            * Affine::scale(self.scale)
    }

    pub fn local_rect(&self) -> Rect {
        Rect::new(
            -self.draw_width / 2.0,
            -self.draw_height / 2.0,
            self.draw_width / 2.0,
            self.draw_height / 2.0,
        )
    }
}

pub fn place_screenshot(
    canvas_width: f64,
    canvas_height: f64,
    image_width: u32,
    image_height: u32,
    setting: &PreviewSetting,
    radius_baseline: f64,
) -> ScreenshotPlacement {
    let landscape = image_width > image_height;
    let base = canvas_width / BASE_SIZE_DIVISOR;
    let (iw, ih) = (f64::from(image_width.max(1)), f64::from(image_height.max(1)));
    let (draw_width, draw_height) = if landscape {
        (base, base * ih / iw)
    } else {
        (base * iw / ih, base)
    };

    let center = Point::new(
        canvas_width / 2.0 + canvas_width * setting.position_x / 100.0,
        canvas_height / 2.0 + canvas_height * setting.position_y / 100.0,
    );
    let radius = scaled_corner_radius(
        setting.corner_radius,
        canvas_width,
        canvas_height,
        radius_baseline,
    );
    let local = Rect::new(0.0, 0.0, draw_width, draw_height);

    ScreenshotPlacement {
        landscape,
        draw_width,
        draw_height,
        center,
        relative_center: Point::new(center.x / canvas_width, center.y / canvas_height),
        rotation_deg: setting.rotation,
        scale: setting.scale / 100.0,
        corner_radius: clamp_corner_radius(local, radius),
    }
}

/// Bezel geometry, in the screenshot's local space.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlacement {
    pub model: FrameModel,
    pub asset: FrameAssetRef,
    pub width: f64,
    pub height: f64,
    /// Portrait bezel art turned 90° to wrap a landscape screenshot.
    pub rotated: bool,
}

impl FramePlacement {
    /// Frame space (image rect centered on the origin) to the screenshot's local space.
    pub fn local_transform(&self) -> Affine {
        if self.rotated {
            Affine::rotate(std::f64::consts::FRAC_PI_2)
        } else {
            Affine::IDENTITY
        }
    }

    pub fn local_rect(&self) -> Rect {
        Rect::new(
            -self.width / 2.0,
            -self.height / 2.0,
            self.width / 2.0,
            self.height / 2.0,
        )
    }
}

pub fn place_frame(
    shot: &ScreenshotPlacement,
    model: FrameModel,
    asset: FrameAssetRef,
    frame_image_width: u32,
    frame_image_height: u32,
) -> FramePlacement {
    let edge = if shot.landscape {
        shot.draw_height
    } else {
        shot.draw_width
    };
    let width = edge * FRAME_OVERSIZE;
    let aspect = f64::from(frame_image_height) / f64::from(frame_image_width.max(1));
    FramePlacement {
        model,
        asset,
        width,
        height: width * aspect,
        rotated: shot.landscape,
    }
}

/// Font scale factor for a canvas showing a `device_height` device at `canvas_height`.
pub fn font_scale(device_height: f64, canvas_height: f64) -> f64 {
    let export = (device_height / 800.0).max(3.5);
    if device_height <= 0.0 {
        return export;
    }
    export * canvas_height / device_height
}

/// One centered line of text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Horizontal center.
    pub x: f64,
    /// Vertical middle.
    pub y: f64,
}

/// Laid out title and description, in canvas display units.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub font_scale: f64,
    pub title_size: f64,
    pub description_size: f64,
    pub title: Vec<TextLine>,
    pub description: Vec<TextLine>,
}

impl TextBlock {
    /// Shadow offset and blur, in display units.
    pub fn shadow_offset(&self) -> f64 {
        2.0 * self.font_scale
    }

    pub fn shadow_blur(&self) -> f64 {
        4.0 * self.font_scale
    }
}

fn title_anchor(setting: &PreviewSetting, width: f64, height: f64) -> Point {
    let t = &setting.text;
    match t.text_position {
        TextPosition::Top => Point::new(width / 2.0, height * 0.15),
        TextPosition::Bottom => Point::new(width / 2.0, height * 0.85),
        TextPosition::Custom => Point::new(
            width * t.text_position_x / 100.0,
            height * t.text_position_y / 100.0,
        ),
        TextPosition::Center => Point::new(width / 2.0, height / 2.0),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Description,
}

/// Wrap and position the text overlay. `measure` returns the advance of a candidate line set in
/// the role's face at the given font size.
pub fn layout_text(
    setting: &PreviewSetting,
    canvas_width: f64,
    canvas_height: f64,
    device_height: f64,
    mut measure: impl FnMut(TextRole, &str, f64) -> f64,
) -> TextBlock {
    let t = &setting.text;
    let k = font_scale(device_height, canvas_height);
    let title_size = t.title_font_size * k;
    let description_size = t.description_font_size * k;
    let max_width = canvas_width * TEXT_MAX_WIDTH;

    let anchor = title_anchor(setting, canvas_width, canvas_height);
    let title_wrapped = wrap_text(&t.text_title, max_width, |s| measure(TextRole::Title, s, title_size));
    let n = title_wrapped.len() as f64;
    let title_top = anchor.y - title_size * (n / 2.0);
    let title = stack_lines(title_wrapped, anchor.x, title_top, title_size * LINE_HEIGHT);

    let desc_anchor = match t.description_position {
        DescriptionPosition::Custom => Point::new(
            canvas_width * t.description_position_x / 100.0,
            canvas_height * t.description_position_y / 100.0,
        ),
        DescriptionPosition::Below => Point::new(
            anchor.x,
            title_top + n * title_size * LINE_HEIGHT + description_size,
        ),
    };
    let desc_wrapped = wrap_text(&t.text_description, max_width, |s| {
        measure(TextRole::Description, s, description_size)
    });
    let description = stack_lines(
        desc_wrapped,
        desc_anchor.x,
        desc_anchor.y,
        description_size * LINE_HEIGHT,
    );

    TextBlock {
        font_scale: k,
        title_size,
        description_size,
        title,
        description,
    }
}

fn stack_lines(lines: Vec<String>, x: f64, first_y: f64, step: f64) -> Vec<TextLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextLine {
            text,
            x,
            y: first_y + i as f64 * step,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::catalog::frame_asset;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Every character is `size / 2` wide.
    fn mono(_: TextRole, s: &str, size: f64) -> f64 {
        s.chars().count() as f64 * size / 2.0
    }

    #[test]
    fn portrait_and_landscape_sizes() {
        let s = PreviewSetting::default();
        let p = place_screenshot(1320.0, 2868.0, 1179, 2556, &s, 1500.0);
        assert!(!p.landscape);
        assert!(approx(p.draw_height, 1320.0 / 1.33));
        assert!(approx(p.draw_width, 1320.0 / 1.33 * 1179.0 / 2556.0));

        let l = place_screenshot(1320.0, 2868.0, 2556, 1179, &s, 1500.0);
        assert!(l.landscape);
        assert!(approx(l.draw_width, 1320.0 / 1.33));

        // Square counts as portrait.
        assert!(!place_screenshot(100.0, 100.0, 10, 10, &s, 1500.0).landscape);
    }

    #[test]
    fn placement_is_relative_to_canvas_size() {
        let s = PreviewSetting {
            position_x: 10.0,
            position_y: -5.0,
            corner_radius: 30.0,
            ..PreviewSetting::default()
        };
        let full = place_screenshot(1320.0, 2868.0, 1179, 2556, &s, 1500.0);
        let small = place_screenshot(264.0, 573.6, 1179, 2556, &s, 1500.0);
        assert!(approx(full.relative_center.x, small.relative_center.x));
        assert!(approx(full.relative_center.y, small.relative_center.y));
        assert!(approx(full.center.x, 660.0 + 132.0));
        assert!(approx(full.corner_radius / full.draw_width, small.corner_radius / small.draw_width));
        assert!(approx(full.corner_radius, 30.0 * 1320.0 / 1500.0));
    }

    #[test]
    fn huge_radius_is_limited_to_half_short_side() {
        let s = PreviewSetting {
            corner_radius: 1e6,
            ..PreviewSetting::default()
        };
        let p = place_screenshot(1320.0, 2868.0, 1000, 2000, &s, 1500.0);
        assert!(approx(p.corner_radius, p.draw_width / 2.0));
    }

    #[test]
    fn transform_applies_scale_then_rotation_then_offset() {
        let s = PreviewSetting {
            rotation: 90.0,
            scale: 50.0,
            ..PreviewSetting::default()
        };
        let p = place_screenshot(200.0, 400.0, 100, 200, &s, 1500.0);
        let q = p.transform() * Point::new(10.0, 0.0);
        assert!(approx(q.x, 100.0));
        assert!(approx(q.y, 205.0));
    }

    #[test]
    fn frame_wraps_the_matching_edge() {
        let s = PreviewSetting::default();
        let portrait = place_screenshot(1320.0, 2868.0, 1179, 2556, &s, 1500.0);
        let f = place_frame(
            &portrait,
            FrameModel::Iphone16,
            frame_asset(FrameModel::Iphone16, "black"),
            1000,
            2000,
        );
        assert!(!f.rotated);
        assert!(approx(f.width, portrait.draw_width * 1.1));
        assert!(approx(f.height, f.width * 2.0));

        let landscape = place_screenshot(1320.0, 2868.0, 2556, 1179, &s, 1500.0);
        let f = place_frame(
            &landscape,
            FrameModel::Iphone16,
            frame_asset(FrameModel::Iphone16, "black"),
            1000,
            2000,
        );
        assert!(f.rotated);
        assert!(approx(f.width, landscape.draw_height * 1.1));
        let corner = f.local_transform() * Point::new(f.width / 2.0, 0.0);
        assert!(approx(corner.x, 0.0));
    }

    #[test]
    fn font_scale_matches_export_and_shrinks_for_previews() {
        assert!(approx(font_scale(2868.0, 2868.0), 2868.0 / 800.0));
        assert!(approx(font_scale(1320.0, 1320.0), 3.5));
        assert!(approx(font_scale(2868.0, 573.6), 2868.0 / 800.0 * 0.2));
    }

    #[test]
    fn bottom_title_with_description_below() {
        let mut s = PreviewSetting::default();
        s.text.text_title = "Hello".into();
        s.text.text_description = "World".into();
        let b = layout_text(&s, 1000.0, 2400.0, 2400.0, mono);
        assert!(approx(b.font_scale, 3.5));
        assert!(approx(b.title_size, 24.0 * 3.5));
        assert_eq!(b.title.len(), 1);
        assert!(approx(b.title[0].x, 500.0));
        assert!(approx(b.title[0].y, 2040.0 - 84.0 / 2.0));
        assert!(approx(b.description[0].y, b.title[0].y + 84.0 * 1.2 + 56.0));
        assert!(approx(b.shadow_blur(), 14.0));
    }

    #[test]
    fn long_titles_wrap_at_eighty_percent() {
        let mut s = PreviewSetting::default();
        s.text.text_title = "aaaa bbbb cccc dddd".into();
        s.text.text_description = String::new();
        s.text.text_position = TextPosition::Top;
        // size 84 → 42 px per char; "aaaa bbbb" = 378 < 400, "aaaa bbbb cccc" does not fit.
        let b = layout_text(&s, 500.0, 2400.0, 2400.0, mono);
        let lines: Vec<_> = b.title.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, vec!["aaaa bbbb", "cccc dddd"]);
        assert!(approx(b.title[0].y, 360.0 - 84.0));
        assert!(approx(b.title[1].y - b.title[0].y, 84.0 * 1.2));
        assert!(b.description.is_empty());
    }

    #[test]
    fn custom_anchors() {
        let mut s = PreviewSetting::default();
        s.text.text_position = TextPosition::Custom;
        s.text.text_position_x = 25.0;
        s.text.text_position_y = 10.0;
        s.text.description_position = DescriptionPosition::Custom;
        let b = layout_text(&s, 1000.0, 2000.0, 2000.0, |_, _, _| 1.0);
        assert!(approx(b.title[0].x, 250.0));
        assert!(approx(b.description[0].x, 500.0));
        assert!(approx(b.description[0].y, 1800.0));
    }
}
