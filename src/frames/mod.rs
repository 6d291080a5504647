//! Device bezels: which model a screenshot came from, which image to draw for it, and where the
//! image bytes are read from.

pub mod catalog;
pub mod loader;
