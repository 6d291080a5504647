//! Pure geometry helpers shared by the compositor: background gradients, greedy text wrapping,
//! and rounded-rect clip paths.

pub mod gradient;
pub mod shape;
pub mod wrap;
