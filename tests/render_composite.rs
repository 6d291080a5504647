use std::sync::Arc;

use serde_json::json;
use storeshot::{
    Canvas, CompositeRenderer, DeviceType, FontLibrary, Layer, MemoryFrameSource, Orientation,
    Project, RenderRequest, config::RenderConfig,
};

fn renderer() -> CompositeRenderer {
    CompositeRenderer::new(
        Arc::new(MemoryFrameSource::new()),
        FontLibrary::with_faces(Vec::<Vec<u8>>::new()),
        RenderConfig::default(),
    )
}

fn solid_png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn project_with_landscape_shot() -> Project {
    let mut p = Project::new("e2e", DeviceType::Iphone, Orientation::Portrait);
    let i = p
        .add_screenshot("wide.png", &solid_png(2000, 1000, [255, 0, 0, 255]))
        .unwrap();
    p.select_screenshot(i as i32).unwrap();
    let partial = json!({
        "rotation": 0,
        "scale": 100,
        "positionX": 0,
        "positionY": 0,
        "cornerRadius": 0,
        "showFrame": false,
        "showText": false,
    });
    p.update_settings(partial.as_object().unwrap()).unwrap();
    p
}

#[tokio::test]
async fn landscape_screenshot_exports_at_device_size_centered() {
    let p = project_with_landscape_shot();
    let mut r = renderer();
    let req = RenderRequest::for_panel(&p, 0, 1.0, 1.0).unwrap();

    let img = r.export_full_resolution(&req).await.unwrap();
    assert_eq!((img.width, img.height), (1320, 2868));

    let mut canvas = Canvas::new();
    let report = r.render(&mut canvas, &req).await.unwrap();
    let shot = report.screenshot.expect("screenshot drawn");
    assert!(shot.landscape);
    assert!((shot.draw_width - 1320.0 / 1.33).abs() < 1e-6);
    assert!((shot.draw_height - shot.draw_width * 0.5).abs() < 1e-6);
    assert!((shot.center.x - 660.0).abs() < 1e-9);
    assert!((shot.center.y - 1434.0).abs() < 1e-9);
    assert!(report.frame.is_none());
    assert!(report.skipped.is_empty());

    let red = |px: [u8; 4]| px[0] > 250 && px[1] < 5 && px[2] < 5;
    let white = |px: [u8; 4]| px == [255, 255, 255, 255];
    // Half extents are ~496 x ~248.
    assert!(red(img.pixel(660, 1434)));
    assert!(red(img.pixel(660 - 480, 1434)));
    assert!(red(img.pixel(660 + 480, 1434 + 230)));
    assert!(white(img.pixel(660 - 510, 1434)));
    assert!(white(img.pixel(660, 1434 - 270)));
    assert!(white(img.pixel(660, 1434 + 270)));
}

#[tokio::test]
async fn rendering_is_idempotent() {
    let mut p = project_with_landscape_shot();
    p.update_setting("rotation", json!(13)).unwrap();
    p.update_setting("cornerRadius", json!(40)).unwrap();
    p.update_setting("useGradient", json!(true)).unwrap();
    let req = RenderRequest::for_panel(&p, 0, 0.2, 1.0).unwrap();

    let mut r = renderer();
    let mut a = Canvas::new();
    let mut b = Canvas::new();
    let ra = r.render(&mut a, &req).await.unwrap();
    let rb = r.render(&mut b, &req).await.unwrap();
    assert_eq!(ra, rb);
    assert_eq!(a.data(), b.data());

    // Repainting a used canvas yields the same pixels as a fresh one.
    r.render(&mut a, &req).await.unwrap();
    assert_eq!(a.data(), b.data());
}

#[tokio::test]
async fn relative_geometry_is_scale_invariant() {
    let mut p = project_with_landscape_shot();
    p.update_setting("positionX", json!(12)).unwrap();
    p.update_setting("positionY", json!(-20)).unwrap();
    p.update_setting("scale", json!(75)).unwrap();

    let mut r = renderer();
    let mut canvas = Canvas::new();
    let mut shots = Vec::new();
    for scale in [0.1, 0.25, 1.0] {
        let req = RenderRequest::for_panel(&p, 0, scale, 2.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert_eq!(
            (report.pixel_width, report.pixel_height),
            (
                (1320.0 * scale * 2.0_f64).round() as u32,
                (2868.0 * scale * 2.0_f64).round() as u32
            )
        );
        let shot = report.screenshot.unwrap();
        shots.push((shot.relative_center, shot.draw_width / report.display_width));
    }
    for (center, width_ratio) in &shots[1..] {
        assert!((center.x - shots[0].0.x).abs() < 1e-9);
        assert!((center.y - shots[0].0.y).abs() < 1e-9);
        assert!((width_ratio - shots[0].1).abs() < 1e-9);
    }
}

#[tokio::test]
async fn missing_frame_art_only_skips_the_frame() {
    let mut p = project_with_landscape_shot();
    p.update_setting("showFrame", json!(true)).unwrap();
    let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();

    let mut r = renderer();
    let mut canvas = Canvas::new();
    let report = r.render(&mut canvas, &req).await.unwrap();
    assert!(report.screenshot.is_some());
    assert!(report.was_skipped(Layer::Frame));
    assert!(!report.was_skipped(Layer::Screenshot));
}
