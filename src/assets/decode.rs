use std::io::Cursor;

use base64::Engine as _;

use crate::foundation::error::{StoreshotError, StoreshotResult};

/// A decoded raster in premultiplied RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl DecodedImage {
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Straight-alpha copy as an `image` buffer.
    pub fn to_rgba_image(&self) -> StoreshotResult<image::RgbaImage> {
        let mut raw = self.rgba8_premul.clone();
        unpremultiply_rgba8_in_place(&mut raw);
        image::RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| StoreshotError::decode("image buffer length does not match dimensions"))
    }
}

pub fn decode_image(bytes: &[u8]) -> StoreshotResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| StoreshotError::decode(format!("decode image from memory: {e}")))?;
    Ok(from_dynamic(dyn_img))
}

pub(crate) fn from_dynamic(dyn_img: image::DynamicImage) -> DecodedImage {
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    DecodedImage {
        width,
        height,
        rgba8_premul,
    }
}

/// Decoded `data:` URL payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn parse_data_url(url: &str) -> StoreshotResult<DataUrl> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| StoreshotError::decode("not a data: url"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StoreshotError::decode("data url has no payload separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| StoreshotError::decode("only base64 data urls are supported"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| StoreshotError::decode(format!("invalid base64 payload: {e}")))?;
    Ok(DataUrl {
        mime: if mime.is_empty() {
            "application/octet-stream".to_owned()
        } else {
            mime.to_owned()
        },
        bytes,
    })
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Approximate payload size of a base64 data URL, in bytes.
pub fn data_url_payload_len(url: &str) -> usize {
    let b64 = url.split_once(',').map(|(_, p)| p).unwrap_or("");
    b64.len() * 3 / 4
}

/// Best-effort MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Bmp) => "image/bmp",
        Ok(image::ImageFormat::Tiff) => "image/tiff",
        _ => "application/octet-stream",
    }
}

pub fn decode_data_url_image(url: &str) -> StoreshotResult<DecodedImage> {
    let data = parse_data_url(url)?;
    decode_image(&data.bytes)
}

pub fn encode_png(img: &image::RgbaImage) -> StoreshotResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| StoreshotError::decode(format!("encode png: {e}")))?;
    Ok(buf)
}

/// Lossless durable form of a decoded image.
pub fn png_data_url(img: &DecodedImage) -> StoreshotResult<String> {
    let png = encode_png(&img.to_rgba_image()?)?;
    Ok(encode_data_url("image/png", &png))
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
