//! Project persistence: a structured database with key-value fallbacks, the current-project
//! pointer, JSON project files, and the editing session built on top.

pub mod database;
pub mod gateway;
pub mod kv;
pub mod record;
pub mod session;
pub mod transfer;
