use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assets::decode::{
    DecodedImage, decode_data_url_image, decode_image, encode_data_url, png_data_url, sniff_mime,
};
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::model::device::{DeviceDimensions, DeviceType, Orientation};
use crate::model::settings::PreviewSetting;

pub const MAX_PREVIEWS: usize = 6;

/// An imported screenshot.
///
/// `src` (a base64 data URL) is the durable form that gets persisted. The decoded pixels are a
/// transient display handle and never serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub name: String,
    #[serde(rename = "src", default)]
    pub data_url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(skip)]
    decoded: Option<Arc<DecodedImage>>,
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screenshot")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data_url_len", &self.data_url.len())
            .field("decoded", &self.decoded.is_some())
            .finish()
    }
}

impl PartialEq for Screenshot {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_url == other.data_url
            && self.width == other.width
            && self.height == other.height
    }
}

impl Screenshot {
    /// Decode raw file bytes; the original bytes become the durable data URL.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> StoreshotResult<Self> {
        let decoded = decode_image(bytes)?;
        Ok(Self {
            name: name.into(),
            data_url: encode_data_url(sniff_mime(bytes), bytes),
            width: decoded.width,
            height: decoded.height,
            decoded: Some(Arc::new(decoded)),
        })
    }

    /// A screenshot known only by its pixels. It gains a durable form when persisted.
    pub fn from_decoded(name: impl Into<String>, decoded: Arc<DecodedImage>) -> Self {
        Self {
            name: name.into(),
            data_url: String::new(),
            width: decoded.width,
            height: decoded.height,
            decoded: Some(decoded),
        }
    }

    /// Same screenshot with a different durable payload; the display handle is dropped.
    pub fn with_data_url(&self, data_url: String) -> Self {
        Self {
            name: self.name.clone(),
            data_url,
            width: self.width,
            height: self.height,
            decoded: None,
        }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn has_display_handle(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn display_handle(&self) -> Option<&Arc<DecodedImage>> {
        self.decoded.as_ref()
    }

    /// False for entries restored from a record whose images were dropped.
    pub fn has_image_data(&self) -> bool {
        !self.data_url.is_empty() || self.decoded.is_some()
    }

    /// Pixels for drawing: the display handle when present, else a decode of the data URL.
    pub fn pixels(&self) -> StoreshotResult<Arc<DecodedImage>> {
        if let Some(d) = &self.decoded {
            return Ok(d.clone());
        }
        if self.data_url.is_empty() {
            return Err(StoreshotError::decode(format!(
                "screenshot \"{}\" has no image data",
                self.name
            )));
        }
        Ok(Arc::new(decode_data_url_image(&self.data_url)?))
    }

    /// Decode the data URL once and keep the result as the display handle.
    pub fn attach_pixels(&mut self) -> StoreshotResult<()> {
        if self.decoded.is_none() {
            let d = decode_data_url_image(&self.data_url)?;
            self.width = d.width;
            self.height = d.height;
            self.decoded = Some(Arc::new(d));
        }
        Ok(())
    }

    /// The persistable form of this screenshot, re-encoding the display handle when no data URL
    /// is present. An image-less entry stays image-less.
    pub fn durable(&self) -> StoreshotResult<Self> {
        if !self.data_url.is_empty() {
            return Ok(self.with_data_url(self.data_url.clone()));
        }
        match &self.decoded {
            Some(d) => Ok(self.with_data_url(png_data_url(d)?)),
            None => Ok(self.with_data_url(String::new())),
        }
    }
}

/// A set of screenshots and 1..=6 preview panels composed against one device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub orientation: Orientation,
    pub screenshots: Vec<Screenshot>,
    pub preview_settings: Vec<PreviewSetting>,
    pub active_preview_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<DateTime<Utc>>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            device_type: DeviceType::default(),
            orientation: Orientation::default(),
            screenshots: Vec::new(),
            preview_settings: vec![PreviewSetting::default()],
            active_preview_index: 0,
            last_saved: None,
        }
    }
}

impl Project {
    pub fn new(name: impl Into<String>, device_type: DeviceType, orientation: Orientation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            device_type,
            orientation,
            ..Self::default()
        }
    }

    pub fn dimensions(&self) -> DeviceDimensions {
        DeviceDimensions::lookup(self.device_type, self.orientation)
    }

    pub fn active_setting(&self) -> &PreviewSetting {
        // `validate`/`sanitize` keep the index in range; fall back to panel 0 regardless.
        self.preview_settings
            .get(self.active_preview_index)
            .or_else(|| self.preview_settings.first())
            .unwrap_or_else(|| default_setting())
    }

    /// Screenshot a panel points at, if any.
    pub fn screenshot_for(&self, setting: &PreviewSetting) -> Option<&Screenshot> {
        usize::try_from(setting.screenshot_index)
            .ok()
            .and_then(|i| self.screenshots.get(i))
    }

    /// Append a copy of the active panel and activate it.
    pub fn add_preview(&mut self) -> StoreshotResult<usize> {
        if self.preview_settings.len() >= MAX_PREVIEWS {
            return Err(StoreshotError::invariant(format!(
                "a project holds at most {MAX_PREVIEWS} preview panels"
            )));
        }
        let copy = self.active_setting().clone();
        self.preview_settings.push(copy);
        self.active_preview_index = self.preview_settings.len() - 1;
        Ok(self.active_preview_index)
    }

    /// Remove the active panel and activate panel 0.
    pub fn remove_preview(&mut self) -> StoreshotResult<()> {
        if self.preview_settings.len() <= 1 {
            return Err(StoreshotError::invariant(
                "a project needs at least one preview panel",
            ));
        }
        let idx = self.active_preview_index.min(self.preview_settings.len() - 1);
        self.preview_settings.remove(idx);
        self.active_preview_index = 0;
        Ok(())
    }

    pub fn switch_preview(&mut self, index: usize) -> StoreshotResult<()> {
        if index >= self.preview_settings.len() {
            return Err(StoreshotError::invariant(format!(
                "preview index {index} out of range (have {})",
                self.preview_settings.len()
            )));
        }
        self.active_preview_index = index;
        Ok(())
    }

    /// Decode and append a screenshot; returns its index.
    pub fn add_screenshot(&mut self, name: impl Into<String>, bytes: &[u8]) -> StoreshotResult<usize> {
        let shot = Screenshot::from_bytes(name, bytes)?;
        self.screenshots.push(shot);
        Ok(self.screenshots.len() - 1)
    }

    /// Remove a screenshot, re-pointing panels that referenced later screenshots.
    pub fn remove_screenshot(&mut self, index: usize) -> StoreshotResult<Screenshot> {
        if index >= self.screenshots.len() {
            return Err(StoreshotError::invariant(format!(
                "screenshot index {index} out of range (have {})",
                self.screenshots.len()
            )));
        }
        let removed = self.screenshots.remove(index);
        let index = index as i32;
        for s in &mut self.preview_settings {
            if s.screenshot_index == index {
                s.screenshot_index = -1;
            } else if s.screenshot_index > index {
                s.screenshot_index -= 1;
            }
        }
        Ok(removed)
    }

    /// Point the active panel at a screenshot (or -1 for none).
    pub fn select_screenshot(&mut self, index: i32) -> StoreshotResult<()> {
        self.check_screenshot_index(index)?;
        let active = self.active_preview_index;
        let setting = self
            .preview_settings
            .get_mut(active)
            .ok_or_else(|| StoreshotError::invariant("active preview index out of range"))?;
        setting.screenshot_index = index;
        Ok(())
    }

    pub fn update_setting(&mut self, key: &str, value: serde_json::Value) -> StoreshotResult<()> {
        let merged = self.active_setting().with_setting(key, value)?;
        self.replace_active(merged)
    }

    pub fn update_settings(
        &mut self,
        partial: &serde_json::Map<String, serde_json::Value>,
    ) -> StoreshotResult<()> {
        let merged = self.active_setting().with_settings(partial)?;
        self.replace_active(merged)
    }

    fn replace_active(&mut self, merged: PreviewSetting) -> StoreshotResult<()> {
        self.check_screenshot_index(merged.screenshot_index)?;
        let active = self.active_preview_index;
        let slot = self
            .preview_settings
            .get_mut(active)
            .ok_or_else(|| StoreshotError::invariant("active preview index out of range"))?;
        *slot = merged;
        Ok(())
    }

    fn check_screenshot_index(&self, index: i32) -> StoreshotResult<()> {
        let ok = index == -1
            || usize::try_from(index)
                .map(|i| i < self.screenshots.len())
                .unwrap_or(false);
        if ok {
            Ok(())
        } else {
            Err(StoreshotError::invariant(format!(
                "screenshot index {index} out of range (have {})",
                self.screenshots.len()
            )))
        }
    }

    pub fn validate(&self) -> StoreshotResult<()> {
        let n = self.preview_settings.len();
        if n == 0 || n > MAX_PREVIEWS {
            return Err(StoreshotError::invariant(format!(
                "project has {n} preview panels (expected 1..={MAX_PREVIEWS})"
            )));
        }
        if self.active_preview_index >= n {
            return Err(StoreshotError::invariant(format!(
                "active preview index {} out of range (have {n})",
                self.active_preview_index
            )));
        }
        for (i, s) in self.preview_settings.iter().enumerate() {
            self.check_screenshot_index(s.screenshot_index)
                .map_err(|e| StoreshotError::invariant(format!("panel {i}: {e}")))?;
            s.validate()?;
        }
        Ok(())
    }

    /// Repair loaded data so [`Project::validate`] holds for the structural invariants.
    pub fn sanitize(&mut self) {
        if self.preview_settings.is_empty() {
            self.preview_settings.push(PreviewSetting::default());
        }
        self.preview_settings.truncate(MAX_PREVIEWS);
        if self.active_preview_index >= self.preview_settings.len() {
            self.active_preview_index = 0;
        }
        let n = self.screenshots.len();
        for s in &mut self.preview_settings {
            let in_range = usize::try_from(s.screenshot_index)
                .map(|i| i < n)
                .unwrap_or(false);
            if !in_range {
                s.screenshot_index = -1;
            }
        }
    }
}

fn default_setting() -> &'static PreviewSetting {
    static DEFAULT: std::sync::OnceLock<PreviewSetting> = std::sync::OnceLock::new();
    DEFAULT.get_or_init(PreviewSetting::default)
}
