//! Project data model: devices, panel settings, screenshots, and the invariant-checked edits the
//! editor applies to a project.

pub mod device;
pub mod project;
pub mod settings;
