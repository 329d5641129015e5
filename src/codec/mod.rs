//! Decoders for the compact encodings used inside a search payload.
//!
//! - [`vlq`]: variable-length hex integers and nested lists, with a small
//!   backreference window.
//! - [`roaring`]: the portable Roaring bitmap layout, base64 wrapped.

pub mod roaring;
pub mod vlq;

pub use roaring::RoaringBitmap;
pub use vlq::{RawValue, VlqHexDecoder};
