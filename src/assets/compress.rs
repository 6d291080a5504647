use crate::assets::decode::{decode_data_url_image, encode_data_url};
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::foundation::math::mul_div255_u8;

/// Re-encode an image data URL as JPEG at `quality` (1..=100), downscaling to `max_width` first
/// when the image is wider. Transparent areas flatten onto black.
pub fn compress_data_url(
    url: &str,
    quality: u8,
    max_width: Option<u32>,
) -> StoreshotResult<String> {
    if !(1..=100).contains(&quality) {
        return Err(StoreshotError::validation("jpeg quality must be in 1..=100"));
    }
    let decoded = decode_data_url_image(url)?;
    let mut rgba = decoded.to_rgba_image()?;

    if let Some(max_w) = max_width.filter(|&m| m > 0 && rgba.width() > m) {
        let ratio = f64::from(max_w) / f64::from(rgba.width());
        let new_h = ((f64::from(rgba.height()) * ratio).round() as u32).max(1);
        rgba = image::imageops::resize(
            &rgba,
            max_w,
            new_h,
            image::imageops::FilterType::Triangle,
        );
    }

    let (w, h) = rgba.dimensions();
    let mut rgb = image::RgbImage::new(w, h);
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let a = u16::from(src[3]);
        *dst = image::Rgb([
            mul_div255_u8(u16::from(src[0]), a),
            mul_div255_u8(u16::from(src[1]), a),
            mul_div255_u8(u16::from(src[2]), a),
        ]);
    }

    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| StoreshotError::decode(format!("encode jpeg: {e}")))?;
    Ok(encode_data_url("image/jpeg", &buf))
}
