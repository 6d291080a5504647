use crate::assets::decode::{DecodedImage, encode_png, unpremultiply_rgba8_in_place};
use crate::foundation::error::{StoreshotError, StoreshotResult};

/// A raster render target.
///
/// Layout happens in display units (`display_width`×`display_height`); the backing pixmap holds
/// `display × pixel_density` pixels, so previews stay sharp on dense screens.
pub struct Canvas {
    pub(crate) pixmap: vello_cpu::Pixmap,
    display_width: f64,
    display_height: f64,
    pixel_density: f64,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("pixel_width", &self.pixel_width())
            .field("pixel_height", &self.pixel_height())
            .field("display_width", &self.display_width)
            .field("display_height", &self.display_height)
            .field("pixel_density", &self.pixel_density)
            .finish()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// An empty 1×1 canvas; the renderer sizes it on first use.
    pub fn new() -> Self {
        Self {
            pixmap: vello_cpu::Pixmap::new(1, 1),
            display_width: 1.0,
            display_height: 1.0,
            pixel_density: 1.0,
        }
    }

    /// Size the backing store for a `display_width`×`display_height` layout at `density`.
    /// Reallocates only when the pixel size changes.
    pub(crate) fn resize(
        &mut self,
        display_width: f64,
        display_height: f64,
        density: f64,
    ) -> StoreshotResult<()> {
        let to_px = |v: f64, what: &str| -> StoreshotResult<u16> {
            let px = (v * density).round();
            if !px.is_finite() || px < 1.0 || px > f64::from(u16::MAX) {
                return Err(StoreshotError::render(format!(
                    "canvas {what} of {px} px is out of range"
                )));
            }
            Ok(px as u16)
        };
        let w = to_px(display_width, "width")?;
        let h = to_px(display_height, "height")?;
        if self.pixmap.width() != w || self.pixmap.height() != h {
            self.pixmap = vello_cpu::Pixmap::new(w, h);
        }
        self.display_width = display_width;
        self.display_height = display_height;
        self.pixel_density = density;
        Ok(())
    }

    pub fn pixel_width(&self) -> u32 {
        u32::from(self.pixmap.width())
    }

    pub fn pixel_height(&self) -> u32 {
        u32::from(self.pixmap.height())
    }

    pub fn display_size(&self) -> (f64, f64) {
        (self.display_width, self.display_height)
    }

    pub fn pixel_density(&self) -> f64 {
        self.pixel_density
    }

    /// Premultiplied RGBA8 rows, top to bottom.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Premultiplied RGBA8 of one pixel; transparent outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        pixel_at(self.data(), self.pixel_width(), self.pixel_height(), x, y)
    }

    /// Copy the current contents out.
    pub fn snapshot(&self) -> ExportImage {
        ExportImage {
            width: self.pixel_width(),
            height: self.pixel_height(),
            rgba8_premul: self.data().to_vec(),
        }
    }
}

/// A rendered panel at its final pixel size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl ExportImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        pixel_at(&self.rgba8_premul, self.width, self.height, x, y)
    }

    /// Lossless PNG with straight alpha.
    pub fn to_png(&self) -> StoreshotResult<Vec<u8>> {
        let mut straight = self.rgba8_premul.clone();
        unpremultiply_rgba8_in_place(&mut straight);
        let img = image::RgbaImage::from_raw(self.width, self.height, straight)
            .ok_or_else(|| StoreshotError::export("export buffer size mismatch"))?;
        encode_png(&img)
    }

    pub fn into_decoded(self) -> DecodedImage {
        DecodedImage {
            width: self.width,
            height: self.height,
            rgba8_premul: self.rgba8_premul,
        }
    }
}

fn pixel_at(data: &[u8], width: u32, height: u32, x: u32, y: u32) -> [u8; 4] {
    if x >= width || y >= height {
        return [0, 0, 0, 0];
    }
    let i = ((y as usize) * (width as usize) + (x as usize)) * 4;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}
