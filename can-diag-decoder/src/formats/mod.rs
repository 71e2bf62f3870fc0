//! Trace file format parsers
//!
//! Each parser yields a lazy iterator over `RawFrame` values so an arbitrarily
//! large capture can be streamed without loading it into memory.

pub mod trc;

// Re-export parser types
pub use trc::{TrcFrameIterator, TrcParser};
