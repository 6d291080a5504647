//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a valid config.
//! `STORESHOT_*` environment variables override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoreshotError, StoreshotResult};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreshotConfig {
    pub render: RenderConfig,
    pub export: ExportConfig,
    pub storage: StorageConfig,
    pub assets: AssetsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas size (in px) at which `cornerRadius` is expressed.
    pub corner_radius_baseline: f64,
    /// How long the first text paint waits for the font library.
    pub font_ready_timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            corner_radius_baseline: 1500.0,
            font_ready_timeout_ms: 3_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub watchdog_ms: u64,
    pub settle_timeout_ms: u64,
    pub inter_panel_delay_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            watchdog_ms: 30_000,
            settle_timeout_ms: 10_000,
            inter_panel_delay_ms: 0,
        }
    }
}

impl ExportConfig {
    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn inter_panel_delay(&self) -> Duration {
        Duration::from_millis(self.inter_panel_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Total byte ceiling of the key-value store.
    pub kv_quota_bytes: usize,
    /// JPEG quality (1..=100) used when recompressing for the key-value tier.
    pub fallback_quality: u8,
    pub fallback_max_width: Option<u32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kv_quota_bytes: 5 * 1024 * 1024,
            fallback_quality: 60,
            fallback_max_width: Some(800),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub frames_dir: Option<PathBuf>,
    pub fonts_dir: Option<PathBuf>,
}

impl StoreshotConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> StoreshotResult<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    StoreshotError::validation(format!(
                        "failed to read config '{}': {e}",
                        p.display()
                    ))
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env_with(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> StoreshotResult<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        Ok(cfg)
    }

    /// Apply `STORESHOT_*` overrides read through `lookup`. Unparseable values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
            v.and_then(|v| v.trim().parse::<T>().ok())
        }

        if let Some(v) = num::<u64>(lookup("STORESHOT_EXPORT_WATCHDOG_MS")).filter(|&n| n > 0) {
            self.export.watchdog_ms = v;
        }
        if let Some(v) = num::<u64>(lookup("STORESHOT_SETTLE_TIMEOUT_MS")).filter(|&n| n > 0) {
            self.export.settle_timeout_ms = v;
        }
        if let Some(v) = num::<u64>(lookup("STORESHOT_INTER_PANEL_DELAY_MS")) {
            self.export.inter_panel_delay_ms = v;
        }
        if let Some(v) = num::<u64>(lookup("STORESHOT_FONT_READY_TIMEOUT_MS")) {
            self.render.font_ready_timeout_ms = v;
        }
        if let Some(v) = num::<usize>(lookup("STORESHOT_KV_QUOTA_BYTES")).filter(|&n| n > 0) {
            self.storage.kv_quota_bytes = v;
        }
        if let Some(v) = num::<u8>(lookup("STORESHOT_FALLBACK_QUALITY"))
            .filter(|q| (1..=100).contains(q))
        {
            self.storage.fallback_quality = v;
        }
        if let Some(v) = lookup("STORESHOT_FRAMES_DIR").filter(|s| !s.trim().is_empty()) {
            self.assets.frames_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("STORESHOT_FONTS_DIR").filter(|s| !s.trim().is_empty()) {
            self.assets.fonts_dir = Some(PathBuf::from(v));
        }
    }

    pub fn validate(&self) -> StoreshotResult<()> {
        if !self.render.corner_radius_baseline.is_finite() || self.render.corner_radius_baseline <= 0.0
        {
            return Err(StoreshotError::validation(
                "render.corner_radius_baseline must be finite and > 0",
            ));
        }
        if !(1..=100).contains(&self.storage.fallback_quality) {
            return Err(StoreshotError::validation(
                "storage.fallback_quality must be in 1..=100",
            ));
        }
        if self.storage.fallback_max_width == Some(0) {
            return Err(StoreshotError::validation(
                "storage.fallback_max_width must be > 0 when set",
            ));
        }
        if self.export.watchdog_ms == 0 {
            return Err(StoreshotError::validation("export.watchdog_ms must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = StoreshotConfig::from_json("{}").unwrap();
        assert_eq!(cfg, StoreshotConfig::default());
        assert_eq!(cfg.export.watchdog(), Duration::from_secs(30));
        assert_eq!(cfg.storage.fallback_quality, 60);
        assert_eq!(cfg.storage.fallback_max_width, Some(800));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg =
            StoreshotConfig::from_json(r#"{"storage":{"kv_quota_bytes":1024}}"#).unwrap();
        assert_eq!(cfg.storage.kv_quota_bytes, 1024);
        assert_eq!(cfg.storage.fallback_quality, 60);
        assert_eq!(cfg.render.corner_radius_baseline, 1500.0);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("STORESHOT_EXPORT_WATCHDOG_MS", "500"),
            ("STORESHOT_FALLBACK_QUALITY", "250"),
            ("STORESHOT_KV_QUOTA_BYTES", "nope"),
            ("STORESHOT_FRAMES_DIR", "/tmp/frames"),
        ]
        .into_iter()
        .collect();
        let mut cfg = StoreshotConfig::default();
        cfg.apply_env_with(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.export.watchdog_ms, 500);
        assert_eq!(cfg.storage.fallback_quality, 60);
        assert_eq!(cfg.storage.kv_quota_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.assets.frames_dir, Some(PathBuf::from("/tmp/frames")));
    }

    #[test]
    fn validate_rejects_zero_quality() {
        let mut cfg = StoreshotConfig::default();
        cfg.storage.fallback_quality = 0;
        assert!(cfg.validate().is_err());
    }
}
