use std::fmt;

use serde::{Deserialize, Serialize};

/// Devices with an authored bezel image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameModel {
    Iphone14,
    Iphone16,
    Iphone16ProMax,
    IpadPro,
}

pub const DEFAULT_MODEL: FrameModel = FrameModel::Iphone16;

/// Pixel distance allowed on each axis when matching a screenshot to a profile.
pub const MATCH_TOLERANCE_PX: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameColor {
    Black,
    White,
    Silver,
    Gold,
}

impl FrameColor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" => Some(Self::Black),
            "white" => Some(Self::White),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::White => "White",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
        }
    }
}

/// Native screen resolution of a model, long side first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: FrameModel,
    pub long_side: u32,
    pub short_side: u32,
    pub colors: &'static [FrameColor],
}

pub const PROFILES: &[DeviceProfile] = &[
    DeviceProfile {
        model: FrameModel::Iphone14,
        long_side: 2532,
        short_side: 1170,
        colors: &[FrameColor::Black, FrameColor::White],
    },
    DeviceProfile {
        model: FrameModel::Iphone16,
        long_side: 2556,
        short_side: 1179,
        colors: &[FrameColor::Black, FrameColor::White],
    },
    DeviceProfile {
        model: FrameModel::Iphone16ProMax,
        long_side: 2868,
        short_side: 1320,
        colors: &[
            FrameColor::Black,
            FrameColor::White,
            FrameColor::Silver,
            FrameColor::Gold,
        ],
    },
    DeviceProfile {
        model: FrameModel::IpadPro,
        long_side: 2732,
        short_side: 2048,
        colors: &[FrameColor::Black, FrameColor::Silver],
    },
];

impl FrameModel {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Iphone14 => "iPhone 14",
            Self::Iphone16 => "iPhone 16",
            Self::Iphone16ProMax => "iPhone 16 Pro Max",
            Self::IpadPro => "iPad Pro",
        }
    }

    pub fn profile(self) -> &'static DeviceProfile {
        // Every variant has exactly one entry in PROFILES.
        PROFILES
            .iter()
            .find(|p| p.model == self)
            .unwrap_or(&PROFILES[1])
    }
}

impl fmt::Display for FrameModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A bezel image, addressed by a path relative to the frames root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameAssetRef {
    pub model: FrameModel,
    pub color: FrameColor,
    pub path: String,
}

impl FrameAssetRef {
    fn new(model: FrameModel, color: FrameColor) -> Self {
        Self {
            model,
            color,
            path: format!(
                "frames/{} - {} - Portrait.png",
                model.display_name(),
                color.label()
            ),
        }
    }
}

/// Guess the device a screenshot was captured on. Orientation does not matter; when several
/// profiles are within tolerance the closest one wins; with no match the default model is used.
pub fn detect_model(width: u32, height: u32) -> FrameModel {
    let long = width.max(height);
    let short = width.min(height);
    PROFILES
        .iter()
        .filter(|p| {
            long.abs_diff(p.long_side) < MATCH_TOLERANCE_PX
                && short.abs_diff(p.short_side) < MATCH_TOLERANCE_PX
        })
        .min_by_key(|p| {
            let dl = u64::from(long.abs_diff(p.long_side));
            let ds = u64::from(short.abs_diff(p.short_side));
            dl * dl + ds * ds
        })
        .map(|p| p.model)
        .unwrap_or(DEFAULT_MODEL)
}

/// Resolve the bezel for `model` in `color`: the color variant when authored, else the model's
/// black variant, else the default model's black variant. Never fails.
pub fn frame_asset(model: FrameModel, color: &str) -> FrameAssetRef {
    let profile = model.profile();
    if let Some(c) = FrameColor::parse(color).filter(|c| profile.colors.contains(c)) {
        return FrameAssetRef::new(model, c);
    }
    if profile.colors.contains(&FrameColor::Black) {
        return FrameAssetRef::new(model, FrameColor::Black);
    }
    FrameAssetRef::new(DEFAULT_MODEL, FrameColor::Black)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_profiles_match_in_either_orientation() {
        assert_eq!(detect_model(2532, 1170), FrameModel::Iphone14);
        assert_eq!(detect_model(1170, 2532), FrameModel::Iphone14);
        assert_eq!(detect_model(1320, 2868), FrameModel::Iphone16ProMax);
        assert_eq!(detect_model(2048, 2732), FrameModel::IpadPro);
    }

    #[test]
    fn overlapping_tolerance_picks_nearest() {
        // Within 50px of both iPhone 14 and iPhone 16.
        assert_eq!(detect_model(2538, 1172), FrameModel::Iphone14);
        assert_eq!(detect_model(2550, 1178), FrameModel::Iphone16);
    }

    #[test]
    fn unknown_sizes_fall_back_to_default() {
        assert_eq!(detect_model(2000, 1000), DEFAULT_MODEL);
        assert_eq!(detect_model(0, 0), DEFAULT_MODEL);
        assert_eq!(detect_model(2532 + 50, 1170), DEFAULT_MODEL);
    }

    #[test]
    fn asset_lookup_falls_back_to_black() {
        let a = frame_asset(FrameModel::Iphone14, "white");
        assert_eq!(a.color, FrameColor::White);
        assert_eq!(a.path, "frames/iPhone 14 - White - Portrait.png");

        let a = frame_asset(FrameModel::Iphone14, "gold");
        assert_eq!(a.color, FrameColor::Black);
        assert_eq!(a.model, FrameModel::Iphone14);

        let a = frame_asset(FrameModel::IpadPro, "neon");
        assert_eq!(a.path, "frames/iPad Pro - Black - Portrait.png");
    }

    #[test]
    fn every_model_has_a_profile_with_black() {
        for m in [
            FrameModel::Iphone14,
            FrameModel::Iphone16,
            FrameModel::Iphone16ProMax,
            FrameModel::IpadPro,
        ] {
            assert_eq!(m.profile().model, m);
            assert!(m.profile().colors.contains(&FrameColor::Black));
        }
    }
}
