use std::sync::Arc;

use serde_json::json;
use storeshot::{
    Canvas, CompositeRenderer, DeviceType, FontLibrary, MemoryFrameSource, Orientation, Project,
    RenderRequest, config::RenderConfig,
};

fn renderer_with_font() -> CompositeRenderer {
    let font_bytes = std::fs::read("tests/data/fonts/DejaVuSans.ttf").unwrap();
    CompositeRenderer::new(
        Arc::new(MemoryFrameSource::new()),
        FontLibrary::with_faces([font_bytes]),
        RenderConfig::default(),
    )
}

fn text_project() -> Project {
    let mut p = Project::new("text", DeviceType::Iphone, Orientation::Portrait);
    let partial = json!({
        "showText": true,
        "textColor": "#ff0000",
        "textPosition": "bottom",
    });
    p.update_settings(partial.as_object().unwrap()).unwrap();
    p
}

#[derive(Clone, Copy, Debug)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Bounds {
    fn relative(self, w: u32, h: u32) -> [f64; 4] {
        [
            f64::from(self.min_x) / f64::from(w),
            f64::from(self.min_y) / f64::from(h),
            f64::from(self.max_x + 1) / f64::from(w),
            f64::from(self.max_y + 1) / f64::from(h),
        ]
    }
}

/// Bounding box and centroid of the pixels matching `pred`.
fn scan(canvas: &Canvas, pred: impl Fn([u8; 4]) -> bool) -> Option<(Bounds, (f64, f64))> {
    let w = canvas.pixel_width();
    let mut bounds: Option<Bounds> = None;
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
    for (i, px) in canvas.data().chunks_exact(4).enumerate() {
        if !pred([px[0], px[1], px[2], px[3]]) {
            continue;
        }
        let (x, y) = (i as u32 % w, i as u32 / w);
        sx += f64::from(x);
        sy += f64::from(y);
        n += 1.0;
        bounds = Some(match bounds {
            None => Bounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => Bounds {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bounds.map(|b| (b, (sx / n, sy / n)))
}

fn is_fill(px: [u8; 4]) -> bool {
    px[0] > 180 && px[1] < 100 && px[2] < 100
}

fn is_shadow(px: [u8; 4]) -> bool {
    let hi = px[0].max(px[1]).max(px[2]);
    let lo = px[0].min(px[1]).min(px[2]);
    hi < 235 && hi - lo < 30
}

#[tokio::test]
async fn bottom_text_sits_in_the_lower_band() {
    let p = text_project();
    let mut r = renderer_with_font();
    let mut canvas = Canvas::new();
    let req = RenderRequest::for_panel(&p, 0, 1.0, 1.0).unwrap();
    let report = r.render(&mut canvas, &req).await.unwrap();
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    let text = report.text.expect("text drawn");
    assert!(text.title_lines >= 1);
    assert!(text.description_lines >= 1);

    let (w, h) = (canvas.pixel_width(), canvas.pixel_height());
    let (fill, _) = scan(&canvas, is_fill).expect("text fill pixels");
    let [x0, y0, x1, y1] = fill.relative(w, h);
    assert!(x0 >= 0.09 && x1 <= 0.91, "fill spans x {x0:.3}..{x1:.3}");
    assert!(y0 > 0.75 && y0 < 0.85, "fill starts at y {y0:.3}");
    assert!(y1 > 0.85 && y1 < 0.97, "fill ends at y {y1:.3}");
}

#[tokio::test]
async fn shadow_is_offset_down_and_right_of_fill() {
    let p = text_project();
    let mut r = renderer_with_font();
    let mut canvas = Canvas::new();
    let req = RenderRequest::for_panel(&p, 0, 0.5, 1.0).unwrap();
    r.render(&mut canvas, &req).await.unwrap();

    let (fill, fill_center) = scan(&canvas, is_fill).expect("text fill pixels");
    let (shadow, shadow_center) = scan(&canvas, is_shadow).expect("shadow pixels");
    assert!(shadow.max_x > fill.max_x);
    assert!(shadow.max_y > fill.max_y);
    assert!(shadow_center.0 > fill_center.0);
    assert!(shadow_center.1 > fill_center.1);
}

#[tokio::test]
async fn text_box_is_scale_invariant() {
    let p = text_project();
    let mut r = renderer_with_font();
    let mut canvas = Canvas::new();
    let mut boxes = Vec::new();
    for scale in [0.25, 1.0] {
        let req = RenderRequest::for_panel(&p, 0, scale, 1.0).unwrap();
        r.render(&mut canvas, &req).await.unwrap();
        let (fill, _) = scan(&canvas, is_fill).expect("text fill pixels");
        boxes.push(fill.relative(canvas.pixel_width(), canvas.pixel_height()));
    }
    for (small, full) in boxes[0].iter().zip(&boxes[1]) {
        assert!((small - full).abs() < 0.02, "{:?} vs {:?}", boxes[0], boxes[1]);
    }
}
