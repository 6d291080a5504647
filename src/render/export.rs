use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::ExportConfig;
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::model::project::Project;
use crate::render::canvas::ExportImage;
use crate::render::compositor::{CompositeRenderer, RenderRequest};

/// File name of the `index`-th (0-based) exported panel.
pub fn export_file_name(index: usize) -> String {
    format!("app-screenshot-{}.png", index + 1)
}

/// Destination for exported panels.
///
/// `write_panel` is called in panel order, once per successfully rendered panel.
#[async_trait]
pub trait ExportSink: Send {
    async fn write_panel(
        &mut self,
        index: usize,
        file_name: &str,
        png: &[u8],
    ) -> StoreshotResult<()>;
}

/// Writes PNG files into a directory, creating it on first use.
#[derive(Clone, Debug)]
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for DirSink {
    async fn write_panel(
        &mut self,
        _index: usize,
        file_name: &str,
        png: &[u8],
    ) -> StoreshotResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreshotError::export(format!(
                "failed to create export dir '{}': {e}",
                self.dir.display()
            ))
        })?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, png).await.map_err(|e| {
            StoreshotError::export(format!("failed to write '{}': {e}", path.display()))
        })
    }
}

/// In-memory sink for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// `(panel index, file name, png bytes)` in write order.
    pub files: Vec<(usize, String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn write_panel(
        &mut self,
        index: usize,
        file_name: &str,
        png: &[u8],
    ) -> StoreshotResult<()> {
        self.files.push((index, file_name.to_owned(), png.to_vec()));
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedPanel {
    pub index: usize,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelFailure {
    pub index: usize,
    pub error: String,
}

/// Outcome of a batch export. Failed panels do not stop the batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub exported: Vec<ExportedPanel>,
    pub failed: Vec<PanelFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, index: usize, err: &StoreshotError) {
        tracing::warn!(panel = index + 1, error = %err, "panel export failed");
        self.failed.push(PanelFailure {
            index,
            error: err.to_string(),
        });
    }
}

/// Runs batch exports one at a time.
///
/// A second request while a batch is in flight is rejected with `Busy`. A batch running past
/// the watchdog is abandoned, and an in-flight marker older than the watchdog (left behind by a
/// dropped batch) is cleared by the next request.
#[derive(Debug)]
pub struct ExportCoordinator {
    config: ExportConfig,
    in_flight: Mutex<Option<Instant>>,
}

struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<Instant>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl ExportCoordinator {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            in_flight: Mutex::new(None),
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn begin(&self) -> StoreshotResult<InFlightGuard<'_>> {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(started) = *slot {
            let age = started.elapsed();
            if age < self.config.watchdog() {
                return Err(StoreshotError::Busy);
            }
            tracing::warn!(age_ms = age.as_millis() as u64, "clearing stale export marker");
        }
        *slot = Some(Instant::now());
        Ok(InFlightGuard {
            slot: &self.in_flight,
        })
    }

    /// Export every panel of `project` at full resolution, in order, into `sink`.
    #[tracing::instrument(skip_all, fields(project = %project.id, panels = project.preview_settings.len()))]
    pub async fn export_all<S: ExportSink + ?Sized>(
        &self,
        renderer: &mut CompositeRenderer,
        project: &Project,
        sink: &mut S,
    ) -> StoreshotResult<BatchReport> {
        let _guard = self.begin()?;
        let watchdog = self.config.watchdog();
        match tokio::time::timeout(watchdog, self.run_batch(renderer, project, sink)).await {
            Ok(report) => {
                tracing::info!(
                    exported = report.exported.len(),
                    failed = report.failed.len(),
                    "export finished"
                );
                Ok(report)
            }
            Err(_) => {
                tracing::error!(watchdog_ms = watchdog.as_millis() as u64, "export abandoned");
                Err(StoreshotError::export(format!(
                    "export did not finish within {} ms",
                    watchdog.as_millis()
                )))
            }
        }
    }

    async fn run_batch<S: ExportSink + ?Sized>(
        &self,
        renderer: &mut CompositeRenderer,
        project: &Project,
        sink: &mut S,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let n = project.preview_settings.len();
        for index in 0..n {
            match self.export_panel(renderer, project, index).await {
                Ok(img) => {
                    let file_name = export_file_name(index);
                    let written = match img.to_png() {
                        Ok(png) => sink.write_panel(index, &file_name, &png).await,
                        Err(e) => Err(e),
                    };
                    match written {
                        Ok(()) => report.exported.push(ExportedPanel {
                            index,
                            file_name,
                            width: img.width,
                            height: img.height,
                        }),
                        Err(e) => report.fail(index, &e),
                    }
                }
                Err(e) => report.fail(index, &e),
            }

            let delay = self.config.inter_panel_delay();
            if index + 1 < n && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        report
    }

    /// Render one panel at full resolution, bounded by the settle timeout.
    pub async fn export_panel(
        &self,
        renderer: &mut CompositeRenderer,
        project: &Project,
        index: usize,
    ) -> StoreshotResult<ExportImage> {
        let req = RenderRequest::for_panel(project, index, 1.0, 1.0)?;
        let settle = self.config.settle_timeout();
        tokio::time::timeout(settle, renderer.export_full_resolution(&req))
            .await
            .map_err(|_| {
                StoreshotError::export(format!(
                    "panel {} did not settle within {} ms",
                    index + 1,
                    settle.as_millis()
                ))
            })?
    }
}
