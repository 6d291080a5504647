use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::color::css_color_or;
use crate::assets::decode::decode_image;
use crate::assets::fonts::{FontLibrary, FontState, ResolvedFace, TextBrushRgba8, TextLayoutEngine};
use crate::config::RenderConfig;
use crate::foundation::core::{Affine, Rgba8, Vec2};
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::frames::catalog::{FrameAssetRef, detect_model, frame_asset};
use crate::frames::loader::FrameSource;
use crate::geometry::gradient::{gradient_geometry, rasterize_gradient};
use crate::geometry::shape::rounded_rect_path;
use crate::model::device::{DeviceDimensions, DeviceType, Orientation};
use crate::model::project::{Project, Screenshot};
use crate::model::settings::PreviewSetting;
use crate::render::canvas::{Canvas, ExportImage};
use crate::render::layout::{
    FramePlacement, ScreenshotPlacement, TextRole, layout_text, place_frame, place_screenshot,
};
use crate::render::raster::{
    ImagePaint, PixelRegion, affine_to_cpu, alpha_bounds, bezpath_to_cpu, blur_region_in_place,
    clear_pixmap, image_paint, mask_apply_alpha_in_place, premul_over_in_place, shadow_kernel_q16,
};

const SHADOW_COLOR: Rgba8 = Rgba8::new(0, 0, 0, 128);

/// What to draw, and at which resolution.
#[derive(Clone, Copy, Debug)]
pub struct RenderRequest<'a> {
    pub device_type: DeviceType,
    pub orientation: Orientation,
    pub screenshot: Option<&'a Screenshot>,
    pub setting: &'a PreviewSetting,
    pub dimensions: DeviceDimensions,
    /// Display size relative to the device resolution.
    pub resolution_scale: f64,
    /// Backing pixels per display unit.
    pub pixel_density: f64,
}

impl<'a> RenderRequest<'a> {
    /// Request for one panel of `project`.
    pub fn for_panel(
        project: &'a Project,
        panel: usize,
        resolution_scale: f64,
        pixel_density: f64,
    ) -> StoreshotResult<Self> {
        let setting = project.preview_settings.get(panel).ok_or_else(|| {
            StoreshotError::invariant(format!(
                "preview index {panel} out of range (have {})",
                project.preview_settings.len()
            ))
        })?;
        Ok(Self {
            device_type: project.device_type,
            orientation: project.orientation,
            screenshot: project.screenshot_for(setting),
            setting,
            dimensions: project.dimensions(),
            resolution_scale,
            pixel_density,
        })
    }

    /// Full device resolution at density 1.
    pub fn at_full_resolution(self) -> Self {
        Self {
            resolution_scale: 1.0,
            pixel_density: 1.0,
            ..self
        }
    }

    pub fn display_size(&self) -> (f64, f64) {
        (
            f64::from(self.dimensions.width) * self.resolution_scale,
            f64::from(self.dimensions.height) * self.resolution_scale,
        )
    }

    fn validate(&self) -> StoreshotResult<()> {
        for (what, v) in [
            ("resolution scale", self.resolution_scale),
            ("pixel density", self.pixel_density),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(StoreshotError::validation(format!(
                    "{what} must be finite and > 0"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Background,
    Screenshot,
    Frame,
    Text,
}

/// A layer that was not drawn, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedLayer {
    pub layer: Layer,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPlacement {
    pub font_scale: f64,
    pub title_lines: usize,
    pub description_lines: usize,
}

/// What a render actually drew.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderReport {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub display_width: f64,
    pub display_height: f64,
    pub screenshot: Option<ScreenshotPlacement>,
    pub frame: Option<FramePlacement>,
    pub text: Option<TextPlacement>,
    pub skipped: Vec<SkippedLayer>,
}

impl RenderReport {
    fn new(canvas: &Canvas) -> Self {
        let (display_width, display_height) = canvas.display_size();
        Self {
            pixel_width: canvas.pixel_width(),
            pixel_height: canvas.pixel_height(),
            display_width,
            display_height,
            screenshot: None,
            frame: None,
            text: None,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, layer: Layer, err: &StoreshotError) {
        tracing::warn!(?layer, error = %err, "layer skipped");
        self.skipped.push(SkippedLayer {
            layer,
            reason: err.to_string(),
        });
    }

    pub fn was_skipped(&self, layer: Layer) -> bool {
        self.skipped.iter().any(|s| s.layer == layer)
    }
}

/// Paints preview panels and full resolution exports.
///
/// Owns the caches that make repaints cheap: decoded bezels and the registered font faces.
/// Layers are painted in a fixed order (background, screenshot, frame, text); a layer whose
/// inputs fail to load is skipped without failing the render.
pub struct CompositeRenderer {
    frames: Arc<dyn FrameSource>,
    fonts: FontLibrary,
    text: TextLayoutEngine,
    config: RenderConfig,
    frame_cache: HashMap<FrameAssetRef, ImagePaint>,
    font_wait_expired: bool,
}

impl CompositeRenderer {
    pub fn new(frames: Arc<dyn FrameSource>, fonts: FontLibrary, config: RenderConfig) -> Self {
        Self {
            frames,
            fonts,
            text: TextLayoutEngine::new(),
            config,
            frame_cache: HashMap::new(),
            font_wait_expired: false,
        }
    }

    pub fn fonts(&self) -> &FontLibrary {
        &self.fonts
    }

    /// Clear and repaint `canvas` for `req`.
    #[tracing::instrument(skip_all, fields(
        width = req.dimensions.width,
        height = req.dimensions.height,
        scale = req.resolution_scale,
    ))]
    pub async fn render(
        &mut self,
        canvas: &mut Canvas,
        req: &RenderRequest<'_>,
    ) -> StoreshotResult<RenderReport> {
        req.validate()?;
        let (dw, dh) = req.display_size();
        canvas.resize(dw, dh, req.pixel_density)?;
        let mut report = RenderReport::new(canvas);

        paint_background(canvas, req.setting);

        if let Some(shot) = req.screenshot {
            match self.paint_screenshot(canvas, shot, req.setting) {
                Ok((placement, raw_size)) => {
                    if req.setting.frame.show_frame {
                        match self
                            .paint_frame(canvas, raw_size, &placement, req.setting)
                            .await
                        {
                            Ok(frame) => report.frame = Some(frame),
                            Err(e) => report.skip(Layer::Frame, &e),
                        }
                    }
                    report.screenshot = Some(placement);
                }
                Err(e) => report.skip(Layer::Screenshot, &e),
            }
        }

        if req.setting.text.show_text {
            match self.paint_text(canvas, req).await {
                Ok(text) => report.text = Some(text),
                Err(e) => report.skip(Layer::Text, &e),
            }
        }

        tracing::debug!(skipped = report.skipped.len(), "render finished");
        Ok(report)
    }

    /// Render `req` at the device's native resolution into a fresh buffer.
    pub async fn export_full_resolution(
        &mut self,
        req: &RenderRequest<'_>,
    ) -> StoreshotResult<ExportImage> {
        let req = req.at_full_resolution();
        let mut canvas = Canvas::new();
        let report = self.render(&mut canvas, &req).await?;
        if report.pixel_width != req.dimensions.width || report.pixel_height != req.dimensions.height
        {
            return Err(StoreshotError::export(format!(
                "rendered {}x{} instead of {}x{}",
                report.pixel_width, report.pixel_height, req.dimensions.width, req.dimensions.height
            )));
        }
        Ok(canvas.snapshot())
    }

    fn paint_screenshot(
        &mut self,
        canvas: &mut Canvas,
        shot: &Screenshot,
        setting: &PreviewSetting,
    ) -> StoreshotResult<(ScreenshotPlacement, (u32, u32))> {
        let pixels = shot.pixels()?;
        let paint = image_paint(&pixels)?;
        let (dw, dh) = canvas.display_size();
        let placement = place_screenshot(
            dw,
            dh,
            pixels.width,
            pixels.height,
            setting,
            self.config.corner_radius_baseline,
        );

        let to_pixels = Affine::scale(canvas.pixel_density()) * placement.transform();
        let rect = placement.local_rect();
        let image_xf = to_pixels * fit_image(rect, &paint);
        let mut layer = draw_layer(canvas, |ctx| {
            ctx.set_transform(affine_to_cpu(image_xf));
            ctx.set_paint(paint.paint.clone());
            ctx.fill_rect(&image_rect(&paint));
        });

        if placement.corner_radius > 0.0 {
            let clip = bezpath_to_cpu(&rounded_rect_path(rect, placement.corner_radius));
            let mask = draw_layer(canvas, |ctx| {
                ctx.set_transform(affine_to_cpu(to_pixels));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
                ctx.fill_path(&clip);
            });
            mask_apply_alpha_in_place(layer.data_as_u8_slice_mut(), mask.data_as_u8_slice())?;
        }

        premul_over_in_place(canvas.pixmap.data_as_u8_slice_mut(), layer.data_as_u8_slice())?;
        Ok((placement, (pixels.width, pixels.height)))
    }

    async fn paint_frame(
        &mut self,
        canvas: &mut Canvas,
        (raw_w, raw_h): (u32, u32),
        shot: &ScreenshotPlacement,
        setting: &PreviewSetting,
    ) -> StoreshotResult<FramePlacement> {
        let model = detect_model(raw_w, raw_h);
        let asset = frame_asset(model, &setting.frame.frame_color);
        let paint = self.frame_paint(&asset).await?;
        let frame = place_frame(shot, model, asset, paint.w, paint.h);

        let xf = Affine::scale(canvas.pixel_density())
            * shot.transform()
            * frame.local_transform()
            * fit_image(frame.local_rect(), &paint);
        let layer = draw_layer(canvas, |ctx| {
            ctx.set_transform(affine_to_cpu(xf));
            ctx.set_paint(paint.paint.clone());
            ctx.fill_rect(&image_rect(&paint));
        });
        premul_over_in_place(canvas.pixmap.data_as_u8_slice_mut(), layer.data_as_u8_slice())?;
        Ok(frame)
    }

    async fn frame_paint(&mut self, asset: &FrameAssetRef) -> StoreshotResult<ImagePaint> {
        if let Some(p) = self.frame_cache.get(asset) {
            return Ok(p.clone());
        }
        let frames = self.frames.clone();
        let bytes = frames.load(asset).await?;
        let decoded = decode_image(&bytes)?;
        let paint = image_paint(&decoded)?;
        tracing::debug!(path = %asset.path, w = paint.w, h = paint.h, "frame cached");
        self.frame_cache.insert(asset.clone(), paint.clone());
        Ok(paint)
    }

    async fn fonts_ready(&mut self) -> bool {
        match self.fonts.state() {
            FontState::Ready => true,
            FontState::Failed(_) => false,
            FontState::Pending if self.font_wait_expired => false,
            FontState::Pending => {
                let timeout = Duration::from_millis(self.config.font_ready_timeout_ms);
                let ready = self.fonts.wait_ready(timeout).await;
                self.font_wait_expired = !ready;
                ready
            }
        }
    }

    async fn paint_text(
        &mut self,
        canvas: &mut Canvas,
        req: &RenderRequest<'_>,
    ) -> StoreshotResult<TextPlacement> {
        if !self.fonts_ready().await {
            return Err(StoreshotError::render(format!(
                "fonts not ready ({:?})",
                self.fonts.state()
            )));
        }
        self.text.sync(&self.fonts);

        let t = &req.setting.text;
        let (Some(title_face), Some(desc_face)) = (
            self.text.resolve(&t.title_font_family, &t.title_font_weight),
            self.text
                .resolve(&t.description_font_family, &t.description_font_weight),
        ) else {
            return Err(StoreshotError::render("no font face registered"));
        };

        let (dw, dh) = canvas.display_size();
        let engine = &mut self.text;
        let block = layout_text(
            req.setting,
            dw,
            dh,
            f64::from(req.dimensions.height),
            |role, s, size| {
                let face = match role {
                    TextRole::Title => &title_face,
                    TextRole::Description => &desc_face,
                };
                engine.measure(s, face, size as f32)
            },
        );
        let placement = TextPlacement {
            font_scale: block.font_scale,
            title_lines: block.title.len(),
            description_lines: block.description.len(),
        };
        if block.title.is_empty() && block.description.is_empty() {
            return Ok(placement);
        }

        let color = css_color_or(&t.text_color, Rgba8::WHITE);
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let mut shaped = Vec::with_capacity(block.title.len() + block.description.len());
        for (lines, face, size) in [
            (&block.title, &title_face, block.title_size),
            (&block.description, &desc_face, block.description_size),
        ] {
            for line in lines {
                shaped.push(ShapedLine::new(
                    engine, &line.text, face, size, line.x, line.y, brush,
                )?);
            }
        }

        let density = canvas.pixel_density();
        let root = Affine::scale(density);
        let offset = block.shadow_offset();

        let mut shadow = draw_layer(canvas, |ctx| {
            draw_lines(ctx, &shaped, root, Vec2::new(offset, offset), Some(SHADOW_COLOR));
        });
        let kernel = shadow_kernel_q16(block.shadow_blur() * density)?;
        let radius = (kernel.len() / 2) as f64;
        let width = canvas.pixel_width();
        if let Some(region) = alpha_bounds(shadow.data_as_u8_slice(), width)
            .and_then(|b| PixelRegion::around(b, radius + 1.0, width, canvas.pixel_height()))
        {
            blur_region_in_place(shadow.data_as_u8_slice_mut(), width, region, &kernel);
        }
        premul_over_in_place(canvas.pixmap.data_as_u8_slice_mut(), shadow.data_as_u8_slice())?;

        let fill = draw_layer(canvas, |ctx| {
            draw_lines(ctx, &shaped, root, Vec2::ZERO, None);
        });
        premul_over_in_place(canvas.pixmap.data_as_u8_slice_mut(), fill.data_as_u8_slice())?;

        Ok(placement)
    }
}

fn paint_background(canvas: &mut Canvas, setting: &PreviewSetting) {
    let bg = &setting.background;
    if !bg.use_gradient {
        clear_pixmap(&mut canvas.pixmap, [255, 255, 255, 255]);
        return;
    }
    let (w, h) = (canvas.pixel_width(), canvas.pixel_height());
    let from = css_color_or(&bg.gradient_color1, Rgba8::WHITE);
    let to = css_color_or(&bg.gradient_color2, Rgba8::WHITE);
    let geometry = gradient_geometry(bg.gradient_direction, f64::from(w), f64::from(h));
    let bytes = rasterize_gradient(geometry, from, to, w, h);
    canvas.pixmap.data_as_u8_slice_mut().copy_from_slice(&bytes);
}

/// Maps image pixel space onto `rect`.
fn fit_image(rect: kurbo::Rect, paint: &ImagePaint) -> Affine {
    Affine::translate(rect.origin().to_vec2())
        * Affine::scale_non_uniform(
            rect.width() / f64::from(paint.w.max(1)),
            rect.height() / f64::from(paint.h.max(1)),
        )
}

fn image_rect(paint: &ImagePaint) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(paint.w), f64::from(paint.h))
}

/// Render `draw` into a transparent pixmap the size of `canvas`.
fn draw_layer(
    canvas: &Canvas,
    draw: impl FnOnce(&mut vello_cpu::RenderContext),
) -> vello_cpu::Pixmap {
    let (w, h) = (canvas.pixmap.width(), canvas.pixmap.height());
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    draw(&mut ctx);
    ctx.flush();
    let mut layer = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut layer);
    layer
}

/// A line shaped once and painted in both the shadow and the fill pass.
struct ShapedLine {
    layout: parley::Layout<TextBrushRgba8>,
    font: vello_cpu::peniko::FontData,
    /// Display-space position of the layout's top-left corner.
    origin: Vec2,
}

impl ShapedLine {
    fn new(
        engine: &mut TextLayoutEngine,
        text: &str,
        face: &ResolvedFace,
        size: f64,
        center_x: f64,
        middle_y: f64,
        brush: TextBrushRgba8,
    ) -> StoreshotResult<Self> {
        let layout = engine.layout_line(text, face, size as f32, brush)?;
        let width = f64::from(layout.width());
        // Vertical middle of the em box sits half the glyph extent above the baseline.
        let middle = layout
            .lines()
            .next()
            .map(|l| {
                let m = l.metrics();
                f64::from(m.baseline) - f64::from(m.ascent - m.descent) / 2.0
            })
            .unwrap_or(size / 2.0);
        Ok(Self {
            layout,
            font: face.font.clone(),
            origin: Vec2::new(center_x - width / 2.0, middle_y - middle),
        })
    }
}

fn draw_lines(
    ctx: &mut vello_cpu::RenderContext,
    lines: &[ShapedLine],
    root: Affine,
    offset: Vec2,
    color_override: Option<Rgba8>,
) {
    for l in lines {
        ctx.set_transform(affine_to_cpu(root * Affine::translate(l.origin + offset)));
        for line in l.layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let c = color_override.unwrap_or_else(|| {
                    let b = run.style().brush;
                    Rgba8::new(b.r, b.g, b.b, b.a)
                });
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));

                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&l.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::decode::encode_png;
    use crate::frames::loader::MemoryFrameSource;

    fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        encode_png(&image::RgbaImage::from_pixel(w, h, image::Rgba(px))).unwrap()
    }

    fn renderer(frames: MemoryFrameSource) -> CompositeRenderer {
        CompositeRenderer::new(
            Arc::new(frames),
            FontLibrary::with_faces(Vec::<Vec<u8>>::new()),
            RenderConfig::default(),
        )
    }

    fn project_with_shot(w: u32, h: u32) -> Project {
        let mut p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        p.add_screenshot("shot.png", &png(w, h, [255, 0, 0, 255]))
            .unwrap();
        p.select_screenshot(0).unwrap();
        p
    }

    #[tokio::test]
    async fn empty_panel_is_plain_white() {
        let p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert_eq!((report.pixel_width, report.pixel_height), (132, 287));
        assert!(report.screenshot.is_none());
        assert!(report.skipped.is_empty());
        assert_eq!(canvas.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(131, 286), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn screenshot_covers_center_and_missing_frame_is_skipped() {
        let p = project_with_shot(118, 256);
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();

        let shot = report.screenshot.as_ref().unwrap();
        assert!(!shot.landscape);
        assert!(report.was_skipped(Layer::Frame));
        assert!(report.frame.is_none());
        let [red, g, _, a] = canvas.pixel(66, 143);
        assert!(red > 200 && g < 40 && a == 255);
        // Outside the screenshot's footprint the background is untouched.
        assert_eq!(canvas.pixel(2, 2), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn frame_draws_over_screenshot_and_is_cached() {
        let mut frames = MemoryFrameSource::new();
        frames.insert(
            frame_asset(detect_model(118, 256), "black").path,
            png(10, 20, [0, 0, 255, 255]),
        );
        let p = project_with_shot(118, 256);
        let mut r = renderer(frames);
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();

        let frame = report.frame.as_ref().unwrap();
        assert!(!frame.rotated);
        assert!((frame.height / frame.width - 2.0).abs() < 1e-9);
        let [red, _, blue, _] = canvas.pixel(66, 143);
        assert!(blue > 200 && red < 40);
        assert_eq!(r.frame_cache.len(), 1);

        r.render(&mut canvas, &req).await.unwrap();
        assert_eq!(r.frame_cache.len(), 1);
    }

    #[tokio::test]
    async fn landscape_frame_is_rotated() {
        let p = project_with_shot(256, 118);
        let mut r = renderer(MemoryFrameSource::with_fallback(png(10, 20, [0, 0, 0, 255])));
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert!(report.screenshot.as_ref().unwrap().landscape);
        assert!(report.frame.as_ref().unwrap().rotated);
    }

    #[tokio::test]
    async fn corner_radius_clears_the_corners() {
        let mut p = project_with_shot(100, 100);
        p.update_setting("showFrame", serde_json::json!(false))
            .unwrap();
        p.update_setting("cornerRadius", serde_json::json!(1500))
            .unwrap();
        p.update_setting("scale", serde_json::json!(100)).unwrap();
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.1, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        let shot = report.screenshot.unwrap();
        // Radius is half the side: the screenshot becomes a disc.
        assert!((shot.corner_radius - shot.draw_width / 2.0).abs() < 1e-9);
        let half = shot.draw_width / 2.0;
        let corner_x = (shot.center.x - half + 1.0) as u32;
        let corner_y = (shot.center.y - half + 1.0) as u32;
        assert_eq!(canvas.pixel(corner_x, corner_y), [255, 255, 255, 255]);
        let [red, _, _, _] = canvas.pixel(shot.center.x as u32, shot.center.y as u32);
        assert!(red > 200);
    }

    #[tokio::test]
    async fn undecodable_screenshot_is_skipped_not_fatal() {
        let mut p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        p.screenshots.push(
            Screenshot::from_bytes("ok", &png(2, 2, [0, 0, 0, 255]))
                .unwrap()
                .with_data_url("data:image/png;base64,AAAA".into()),
        );
        p.select_screenshot(0).unwrap();
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.05, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert!(report.was_skipped(Layer::Screenshot));
        assert!(!report.was_skipped(Layer::Frame));
        assert_eq!(canvas.pixel(33, 71), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn gradient_background_runs_between_stops() {
        let mut p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        p.update_settings(
            serde_json::json!({
                "useGradient": true,
                "gradientDirection": "to bottom",
                "gradientColor1": "#000000",
                "gradientColor2": "#ffffff",
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.05, 1.0).unwrap();
        r.render(&mut canvas, &req).await.unwrap();
        let top = canvas.pixel(10, 0)[0];
        let bottom = canvas.pixel(10, canvas.pixel_height() - 1)[0];
        assert!(top < 10 && bottom > 245);
    }

    #[tokio::test]
    async fn text_without_faces_is_skipped() {
        let mut p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        p.update_setting("showText", serde_json::json!(true))
            .unwrap();
        let mut r = renderer(MemoryFrameSource::new());
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.05, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert!(report.was_skipped(Layer::Text));
        assert!(report.text.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_fonts_wait_once_then_skip() {
        let mut p = Project::new("t", DeviceType::Iphone, Orientation::Portrait);
        p.update_setting("showText", serde_json::json!(true))
            .unwrap();
        let mut r = CompositeRenderer::new(
            Arc::new(MemoryFrameSource::new()),
            FontLibrary::new(),
            RenderConfig::default(),
        );
        let mut canvas = Canvas::new();
        let req = RenderRequest::for_panel(&p, 0, 0.05, 1.0).unwrap();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert!(report.was_skipped(Layer::Text));
        assert!(r.font_wait_expired);
    }

    #[tokio::test]
    async fn export_is_device_sized_and_density_scales_previews() {
        let p = Project::new("t", DeviceType::Ipad, Orientation::Landscape);
        let mut r = renderer(MemoryFrameSource::new());
        let req = RenderRequest::for_panel(&p, 0, 0.1, 2.0).unwrap();
        let img = r.export_full_resolution(&req).await.unwrap();
        assert_eq!((img.width, img.height), (2732, 2048));

        let mut canvas = Canvas::new();
        let report = r.render(&mut canvas, &req).await.unwrap();
        assert_eq!((report.pixel_width, report.pixel_height), (546, 410));
        assert!((report.display_width - 273.2).abs() < 1e-9);
    }

    #[test]
    fn bad_panel_index_and_scale_are_rejected() {
        let p = Project::default();
        assert!(RenderRequest::for_panel(&p, 3, 1.0, 1.0).is_err());
        let req = RenderRequest::for_panel(&p, 0, 0.0, 1.0).unwrap();
        assert!(req.validate().is_err());
    }
}
