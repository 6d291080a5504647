//! Premultiplied RGBA8 buffer operations and `vello_cpu` glue.
//!
//! `vello_cpu` renders into a fresh buffer, so every layer is drawn into its own transparent
//! pixmap and then composited source-over onto the canvas with these helpers.

use std::sync::Arc;

use crate::assets::decode::DecodedImage;
use crate::foundation::core::{Affine, BezPath};
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::foundation::math::mul_div255_u8;

/// Pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PixelRegion {
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) x1: u32,
    pub(crate) y1: u32,
}

impl PixelRegion {
    /// Region covering `rect` grown by `margin`, clipped to a `width`×`height` buffer.
    pub(crate) fn around(rect: kurbo::Rect, margin: f64, width: u32, height: u32) -> Option<Self> {
        let r = rect.inflate(margin, margin);
        let clamp = |v: f64, max: u32| -> u32 { v.clamp(0.0, f64::from(max)) as u32 };
        let x0 = clamp(r.x0.floor(), width);
        let y0 = clamp(r.y0.floor(), height);
        let x1 = clamp(r.x1.ceil(), width);
        let y1 = clamp(r.y1.ceil(), height);
        (x1 > x0 && y1 > y0).then_some(Self { x0, y0, x1, y1 })
    }

    fn width(self) -> u32 {
        self.x1 - self.x0
    }

    fn height(self) -> u32 {
        self.y1 - self.y0
    }
}

/// Bounding box of pixels with non-zero alpha.
pub(crate) fn alpha_bounds(buf: &[u8], width: u32) -> Option<kurbo::Rect> {
    if width == 0 {
        return None;
    }
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, px) in buf.chunks_exact(4).enumerate() {
        if px[3] == 0 {
            continue;
        }
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| {
        kurbo::Rect::new(
            f64::from(x0),
            f64::from(y0),
            f64::from(x1) + 1.0,
            f64::from(y1) + 1.0,
        )
    })
}

pub(crate) fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> StoreshotResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StoreshotError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StoreshotError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(StoreshotError::render("pixmap byte len mismatch"));
    }
    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in bytes.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

/// Image paint sampling a decoded raster in its own pixel space.
#[derive(Clone)]
pub(crate) struct ImagePaint {
    pub(crate) paint: vello_cpu::Image,
    pub(crate) w: u32,
    pub(crate) h: u32,
}

pub(crate) fn image_paint(img: &DecodedImage) -> StoreshotResult<ImagePaint> {
    let pixmap = pixmap_from_premul_bytes(&img.rgba8_premul, img.width, img.height)?;
    Ok(ImagePaint {
        paint: vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        },
        w: img.width,
        h: img.height,
    })
}

pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> StoreshotResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(StoreshotError::render(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3] as u16;
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = add_sat_u8(sa as u8, mul_div255_u8(d[3] as u16, inv));
        for c in 0..3 {
            let dc = mul_div255_u8(d[c] as u16, inv);
            d[c] = add_sat_u8(s[c], dc);
        }
    }
    Ok(())
}

/// Scale every pixel of `src` by the alpha of the matching `mask` pixel.
pub(crate) fn mask_apply_alpha_in_place(src: &mut [u8], mask: &[u8]) -> StoreshotResult<()> {
    if src.len() != mask.len() {
        return Err(StoreshotError::render(
            "mask_apply expects equal-length rgba8 buffers",
        ));
    }
    for (s, m) in src.chunks_exact_mut(4).zip(mask.chunks_exact(4)) {
        let w16 = u16::from(m[3]);
        if w16 == 255 {
            continue;
        }
        for c in s.iter_mut() {
            *c = mul_div255_u8(u16::from(*c), w16);
        }
    }
    Ok(())
}

/// Canvas-style shadow blur: `blur` is the CSS `shadowBlur`, i.e. twice the gaussian sigma.
pub(crate) fn shadow_kernel_q16(blur_px: f64) -> StoreshotResult<Vec<u32>> {
    let sigma = (blur_px / 2.0) as f32;
    if !sigma.is_finite() || sigma <= 0.0 {
        return gaussian_kernel_q16(0, 1.0);
    }
    let radius = (sigma * 3.0).ceil() as u32;
    gaussian_kernel_q16(radius, sigma)
}

pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f32) -> StoreshotResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(StoreshotError::validation(
            "blur sigma must be finite and > 0",
        ));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = sigma as f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(StoreshotError::render("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let target: i64 = 65536;
    let delta = target - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        let new_mid = (mid_val + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

/// Blur only `region` of a `width`-wide premultiplied buffer, in place. Pixels outside the
/// region read as transparent, which is exact when the region already holds every opaque pixel
/// plus the kernel radius.
pub(crate) fn blur_region_in_place(
    buf: &mut [u8],
    width: u32,
    region: PixelRegion,
    kernel_q16: &[u32],
) {
    if kernel_q16.len() == 1 {
        return;
    }
    let (rw, rh) = (region.width(), region.height());
    let row_bytes = rw as usize * 4;
    let mut src = vec![0u8; row_bytes * rh as usize];
    for y in 0..rh {
        let from = (((region.y0 + y) * width + region.x0) as usize) * 4;
        let to = y as usize * row_bytes;
        src[to..to + row_bytes].copy_from_slice(&buf[from..from + row_bytes]);
    }
    let mut tmp = vec![0u8; src.len()];
    let mut dst = vec![0u8; src.len()];
    horizontal_blur_q16(&src, &mut tmp, rw, rh, kernel_q16);
    vertical_blur_q16(&tmp, &mut dst, rw, rh, kernel_q16);
    for y in 0..rh {
        let to = (((region.y0 + y) * width + region.x0) as usize) * 4;
        let from = y as usize * row_bytes;
        buf[to..to + row_bytes].copy_from_slice(&dst[from..from + row_bytes]);
    }
}

fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = x + ki as i32 - radius;
                if sx < 0 || sx >= w {
                    continue;
                }
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = y + ki as i32 - radius;
                if sy < 0 || sy >= h {
                    continue;
                }
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
