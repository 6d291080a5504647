use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::foundation::error::{StoreshotError, StoreshotResult};

/// Readiness of a [`FontLibrary`]. Text is only painted once the library is `Ready`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontState {
    Pending,
    Ready,
    Failed(String),
}

/// Font files available to the text layer, plus a ready signal.
///
/// Clones share state.
#[derive(Clone)]
pub struct FontLibrary {
    inner: Arc<FontLibraryInner>,
}

struct FontLibraryInner {
    faces: RwLock<Vec<Arc<Vec<u8>>>>,
    state: watch::Sender<FontState>,
}

impl std::fmt::Debug for FontLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontLibrary")
            .field("faces", &self.face_count())
            .field("state", &self.state())
            .finish()
    }
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FontLibrary {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FontState::Pending);
        Self {
            inner: Arc::new(FontLibraryInner {
                faces: RwLock::new(Vec::new()),
                state,
            }),
        }
    }

    /// A library that is immediately ready with `faces`.
    pub fn with_faces(faces: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let lib = Self::new();
        for f in faces {
            lib.add_face(f);
        }
        lib.mark_ready();
        lib
    }

    pub fn add_face(&self, bytes: Vec<u8>) {
        let mut faces = self.inner.faces.write().unwrap_or_else(|e| e.into_inner());
        faces.push(Arc::new(bytes));
    }

    pub fn face_count(&self) -> usize {
        self.inner
            .faces
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Faces from index `from` onwards.
    pub(crate) fn faces_since(&self, from: usize) -> Vec<Arc<Vec<u8>>> {
        let faces = self.inner.faces.read().unwrap_or_else(|e| e.into_inner());
        faces.iter().skip(from).cloned().collect()
    }

    pub fn state(&self) -> FontState {
        self.inner.state.borrow().clone()
    }

    pub fn mark_ready(&self) {
        self.inner.state.send_replace(FontState::Ready);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.inner.state.send_replace(FontState::Failed(reason.into()));
    }

    /// Wait until the library leaves `Pending`, at most `timeout`. True when ready.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.inner.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| !matches!(s, FontState::Pending)),
        )
        .await;
        match waited {
            Ok(Ok(state)) => matches!(*state, FontState::Ready),
            _ => false,
        }
    }

    /// Load every `.ttf`/`.otf`/`.ttc` file in `dir` (sorted by name), then signal readiness.
    #[tracing::instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn load_dir(&self, dir: &Path) -> StoreshotResult<usize> {
        match self.read_dir_faces(dir).await {
            Ok(n) => {
                tracing::debug!(faces = n, "fonts loaded");
                self.mark_ready();
                Ok(n)
            }
            Err(e) => {
                tracing::warn!(error = %e, "font loading failed");
                self.mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn read_dir_faces(&self, dir: &Path) -> StoreshotResult<usize> {
        let read_err = |e: std::io::Error| {
            StoreshotError::decode(format!("failed to read fonts dir '{}': {e}", dir.display()))
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let p = entry.path();
            let is_font = p
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                .unwrap_or(false);
            if is_font {
                paths.push(p);
            }
        }
        paths.sort();
        for p in &paths {
            let bytes = tokio::fs::read(p).await.map_err(|e| {
                StoreshotError::decode(format!("failed to read font '{}': {e}", p.display()))
            })?;
            self.add_face(bytes);
        }
        Ok(paths.len())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A concrete face chosen for a CSS family list and weight.
#[derive(Clone)]
pub struct ResolvedFace {
    pub family: String,
    pub weight: f32,
    pub font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for ResolvedFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFace")
            .field("family", &self.family)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

struct RegisteredFace {
    family: String,
    weight: f32,
    font: vello_cpu::peniko::FontData,
}

/// Parse a CSS `font-weight` keyword or number. Unknown values read as 400.
pub fn parse_font_weight(s: &str) -> f32 {
    match s.trim().to_ascii_lowercase().as_str() {
        "normal" | "" => 400.0,
        "bold" | "bolder" => 700.0,
        "lighter" => 300.0,
        other => other
            .parse::<f32>()
            .ok()
            .filter(|w| w.is_finite() && (1.0..=1000.0).contains(w))
            .unwrap_or(400.0),
    }
}

/// Split a CSS `font-family` list into unquoted names.
pub fn parse_font_families(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Stateful helper for building Parley text layouts from a [`FontLibrary`].
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    synced: usize,
    faces: Vec<RegisteredFace>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            synced: 0,
            faces: Vec::new(),
        }
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Register faces added to `lib` since the last sync. Undecodable fonts are skipped.
    pub fn sync(&mut self, lib: &FontLibrary) {
        for bytes in lib.faces_since(self.synced) {
            self.synced += 1;
            if let Err(e) = self.register(bytes) {
                tracing::warn!(error = %e, "skipping font face");
            }
        }
    }

    fn register(&mut self, bytes: Arc<Vec<u8>>) -> StoreshotResult<()> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.as_ref().clone()), None);
        let (family_id, infos) = families
            .first()
            .ok_or_else(|| StoreshotError::decode("no font families registered from font bytes"))?;
        let family = self
            .font_ctx
            .collection
            .family_name(*family_id)
            .ok_or_else(|| StoreshotError::decode("registered font family has no name"))?
            .to_string();
        let weight = infos.first().map(|i| i.weight().value()).unwrap_or(400.0);
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
            0,
        );
        tracing::debug!(family = %family, weight, "registered font face");
        self.faces.push(RegisteredFace {
            family,
            weight,
            font,
        });
        Ok(())
    }

    /// Pick the face for a CSS family list: the first listed family that is registered, else the
    /// first registered family; within it, the nearest weight (earliest registered on ties).
    pub fn resolve(&self, families: &str, weight: &str) -> Option<ResolvedFace> {
        let wanted = parse_font_weight(weight);
        let requested = parse_font_families(families);
        let family = requested
            .iter()
            .find_map(|name| {
                self.faces
                    .iter()
                    .find(|f| f.family.eq_ignore_ascii_case(name))
                    .map(|f| f.family.clone())
            })
            .or_else(|| self.faces.first().map(|f| f.family.clone()))?;

        self.faces
            .iter()
            .filter(|f| f.family == family)
            .min_by(|a, b| {
                let da = (a.weight - wanted).abs();
                let db = (b.weight - wanted).abs();
                da.total_cmp(&db)
            })
            .map(|f| ResolvedFace {
                family: f.family.clone(),
                weight: f.weight,
                font: f.font.clone(),
            })
    }

    /// Shape `text` as a single unbroken line.
    pub fn layout_line(
        &mut self,
        text: &str,
        face: &ResolvedFace,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> StoreshotResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(StoreshotError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(face.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(face.weight),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Advance width of `text` laid out on one line.
    pub fn measure(&mut self, text: &str, face: &ResolvedFace, size_px: f32) -> f64 {
        match self.layout_line(text, face, size_px, TextBrushRgba8::default()) {
            Ok(layout) => f64::from(layout.width()),
            Err(_) => 0.0,
        }
    }
}
