//! Compositing: painting panels onto canvases, memoized previews, and batch export.

pub mod canvas;
pub mod compositor;
pub mod export;
pub mod fingerprint;
pub mod layout;
pub mod preview;
pub(crate) mod raster;
