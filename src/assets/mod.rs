//! Image and font inputs: decoding, durable data-URL encoding, recompression for constrained
//! storage, CSS color parsing, and the font library backing the text layer.

pub mod color;
pub mod compress;
pub mod decode;
pub mod fonts;
