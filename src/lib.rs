//! Storeshot composes app-store screenshots: an imported screenshot drawn inside a device
//! bezel over a solid or gradient background, with an optional title and description.
//!
//! The crate is organised around two engines:
//!
//! - [`CompositeRenderer`] paints preview panels onto a [`Canvas`] and exports them at the
//!   device's full resolution, coordinated by an [`ExportCoordinator`].
//! - [`PersistenceGateway`] stores projects in a structured database, falling back to a
//!   quota-limited key-value store with recompressed images, and finally to settings only.
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod frames;
pub mod geometry;
pub mod model;
pub mod render;
pub mod storage;

pub use crate::assets::fonts::{FontLibrary, FontState};
pub use crate::config::StoreshotConfig;
pub use crate::foundation::core::{Rgba8, Rgba8Premul};
pub use crate::foundation::error::{StoreshotError, StoreshotResult};
pub use crate::frames::catalog::{FrameAssetRef, FrameModel, detect_model, frame_asset};
pub use crate::frames::loader::{DirFrameSource, FrameSource, MemoryFrameSource};
pub use crate::model::device::{DeviceDimensions, DeviceType, Orientation};
pub use crate::model::project::{MAX_PREVIEWS, Project, Screenshot};
pub use crate::model::settings::PreviewSetting;
pub use crate::render::canvas::{Canvas, ExportImage};
pub use crate::render::compositor::{CompositeRenderer, Layer, RenderReport, RenderRequest};
pub use crate::render::export::{BatchReport, DirSink, ExportCoordinator, ExportSink, MemorySink};
pub use crate::render::preview::PreviewRegistry;
pub use crate::storage::database::{DirDatabase, MemoryDatabase, ProjectDatabase};
pub use crate::storage::gateway::{PersistenceGateway, SaveOutcome, StorageTier};
pub use crate::storage::kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use crate::storage::record::{ProjectInfo, StoredProject};
pub use crate::storage::session::ProjectSession;
pub use crate::storage::transfer::{export_project_json, import_project_json};
