use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::geometry::gradient::GradientDirection;

/// Anchor of the title block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextPosition {
    Top,
    Bottom,
    Center,
    Custom,
}

impl From<String> for TextPosition {
    fn from(s: String) -> Self {
        match s.trim() {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "custom" => Self::Custom,
            _ => Self::Center,
        }
    }
}

impl From<TextPosition> for String {
    fn from(p: TextPosition) -> Self {
        match p {
            TextPosition::Top => "top",
            TextPosition::Bottom => "bottom",
            TextPosition::Center => "center",
            TextPosition::Custom => "custom",
        }
        .to_owned()
    }
}

/// Where the description goes: right under the wrapped title, or at its own anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DescriptionPosition {
    Below,
    Custom,
}

impl From<String> for DescriptionPosition {
    fn from(s: String) -> Self {
        if s.trim() == "custom" {
            Self::Custom
        } else {
            Self::Below
        }
    }
}

impl From<DescriptionPosition> for String {
    fn from(p: DescriptionPosition) -> Self {
        match p {
            DescriptionPosition::Below => "below",
            DescriptionPosition::Custom => "custom",
        }
        .to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundSettings {
    pub use_gradient: bool,
    pub gradient_direction: GradientDirection,
    pub gradient_color1: String,
    pub gradient_color2: String,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            use_gradient: false,
            gradient_direction: GradientDirection::ToRight,
            gradient_color1: "#4a6bff".to_owned(),
            gradient_color2: "#45caff".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameSettings {
    pub show_frame: bool,
    pub frame_color: String,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            show_frame: true,
            frame_color: "black".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSettings {
    pub show_text: bool,
    pub text_title: String,
    pub text_description: String,
    pub title_font_size: f64,
    pub title_font_family: String,
    pub title_font_weight: String,
    pub description_font_size: f64,
    pub description_font_family: String,
    pub description_font_weight: String,
    pub text_color: String,
    pub text_position: TextPosition,
    pub text_position_x: f64,
    pub text_position_y: f64,
    pub description_position: DescriptionPosition,
    pub description_position_x: f64,
    pub description_position_y: f64,
}

pub const DEFAULT_FONT_FAMILY: &str = "'Segoe UI', sans-serif";

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            show_text: false,
            text_title: "Your App Name".to_owned(),
            text_description: "The perfect solution for your needs".to_owned(),
            title_font_size: 24.0,
            title_font_family: DEFAULT_FONT_FAMILY.to_owned(),
            title_font_weight: "bold".to_owned(),
            description_font_size: 16.0,
            description_font_family: DEFAULT_FONT_FAMILY.to_owned(),
            description_font_weight: "normal".to_owned(),
            text_color: "#ffffff".to_owned(),
            text_position: TextPosition::Bottom,
            text_position_x: 50.0,
            text_position_y: 80.0,
            description_position: DescriptionPosition::Below,
            description_position_x: 50.0,
            description_position_y: 90.0,
        }
    }
}

/// Settings of one preview panel.
///
/// Serializes to the flat camelCase object used by saved projects; absent keys take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewSetting {
    /// Index into the project's screenshots, or -1 for none.
    pub screenshot_index: i32,
    /// Degrees, clockwise.
    pub rotation: f64,
    /// Percent.
    pub scale: f64,
    /// Percent of canvas width, from center.
    pub position_x: f64,
    /// Percent of canvas height, from center.
    pub position_y: f64,
    /// Pixels at a 1500px canvas.
    pub corner_radius: f64,
    #[serde(flatten)]
    pub background: BackgroundSettings,
    #[serde(flatten)]
    pub frame: FrameSettings,
    #[serde(flatten)]
    pub text: TextSettings,
}

impl Default for PreviewSetting {
    fn default() -> Self {
        Self {
            screenshot_index: -1,
            rotation: 0.0,
            scale: 90.0,
            position_x: 0.0,
            position_y: 0.0,
            corner_radius: 24.0,
            background: BackgroundSettings::default(),
            frame: FrameSettings::default(),
            text: TextSettings::default(),
        }
    }
}

impl PreviewSetting {
    pub fn validate(&self) -> StoreshotResult<()> {
        let finite = [
            ("rotation", self.rotation),
            ("scale", self.scale),
            ("positionX", self.position_x),
            ("positionY", self.position_y),
            ("cornerRadius", self.corner_radius),
            ("textPositionX", self.text.text_position_x),
            ("textPositionY", self.text.text_position_y),
            ("descriptionPositionX", self.text.description_position_x),
            ("descriptionPositionY", self.text.description_position_y),
        ];
        for (key, v) in finite {
            if !v.is_finite() {
                return Err(StoreshotError::validation(format!("{key} must be finite")));
            }
        }
        if self.screenshot_index < -1 {
            return Err(StoreshotError::validation(
                "screenshotIndex must be -1 or a screenshot index",
            ));
        }
        if self.scale < 0.0 {
            return Err(StoreshotError::validation("scale must be >= 0"));
        }
        if self.corner_radius < 0.0 {
            return Err(StoreshotError::validation("cornerRadius must be >= 0"));
        }
        if !(self.text.title_font_size > 0.0 && self.text.title_font_size.is_finite()) {
            return Err(StoreshotError::validation(
                "titleFontSize must be finite and > 0",
            ));
        }
        if !(self.text.description_font_size > 0.0 && self.text.description_font_size.is_finite())
        {
            return Err(StoreshotError::validation(
                "descriptionFontSize must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// Return a copy with one camelCase key replaced.
    ///
    /// Unknown keys, type mismatches and values failing [`PreviewSetting::validate`] are errors.
    pub fn with_setting(&self, key: &str, value: serde_json::Value) -> StoreshotResult<Self> {
        let mut partial = serde_json::Map::new();
        partial.insert(key.to_owned(), value);
        self.with_settings(&partial)
    }

    /// Return a copy with every key of `partial` merged in.
    pub fn with_settings(
        &self,
        partial: &serde_json::Map<String, serde_json::Value>,
    ) -> StoreshotResult<Self> {
        let serde_json::Value::Object(mut current) = serde_json::to_value(self)? else {
            return Err(StoreshotError::serde("preview setting did not serialize to an object"));
        };
        for (key, value) in partial {
            if !current.contains_key(key) {
                return Err(StoreshotError::validation(format!(
                    "unknown preview setting \"{key}\""
                )));
            }
            current.insert(key.clone(), value.clone());
        }
        let merged: Self = serde_json::from_value(serde_json::Value::Object(current))
            .map_err(|e| StoreshotError::validation(format!("invalid preview setting: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
