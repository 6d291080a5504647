use std::collections::HashMap;

use crate::foundation::error::StoreshotResult;
use crate::model::project::Project;
use crate::render::canvas::Canvas;
use crate::render::compositor::{CompositeRenderer, RenderReport, RenderRequest};
use crate::render::fingerprint::{PanelFingerprint, fingerprint_request};

#[derive(Default)]
struct PanelSlot {
    canvas: Canvas,
    last: Option<(PanelFingerprint, RenderReport)>,
}

/// Result of [`PreviewRegistry::refresh`].
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewOutcome {
    pub report: RenderReport,
    /// The canvas already showed this exact state and was not repainted.
    pub reused: bool,
}

/// One preview canvas per panel, repainted only when its inputs change.
///
/// Renders that skipped a layer are not memoized, so a later refresh retries them (for example
/// once fonts finish loading).
#[derive(Default)]
pub struct PreviewRegistry {
    panels: HashMap<usize, PanelSlot>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(
        &mut self,
        renderer: &mut CompositeRenderer,
        project: &Project,
        panel: usize,
        resolution_scale: f64,
        pixel_density: f64,
    ) -> StoreshotResult<PreviewOutcome> {
        let req = RenderRequest::for_panel(project, panel, resolution_scale, pixel_density)?;
        let fp = fingerprint_request(&req);
        let slot = self.panels.entry(panel).or_default();

        if let Some((last_fp, report)) = &slot.last
            && *last_fp == fp
        {
            tracing::trace!(panel, "preview unchanged");
            return Ok(PreviewOutcome {
                report: report.clone(),
                reused: true,
            });
        }

        slot.last = None;
        let report = renderer.render(&mut slot.canvas, &req).await?;
        if report.skipped.is_empty() {
            slot.last = Some((fp, report.clone()));
        }
        Ok(PreviewOutcome {
            report,
            reused: false,
        })
    }

    pub fn canvas(&self, panel: usize) -> Option<&Canvas> {
        self.panels.get(&panel).map(|s| &s.canvas)
    }

    /// Drop canvases of panels at or beyond `count`.
    pub fn retain_panels(&mut self, count: usize) {
        self.panels.retain(|&i, _| i < count);
    }

    /// Forget every memoized render; canvases are kept and repainted on the next refresh.
    pub fn invalidate_all(&mut self) {
        for slot in self.panels.values_mut() {
            slot.last = None;
        }
    }
}
