//! Diagnostic protocol decoders
//!
//! Both decoders consume reassembled transport messages and dispatch on the
//! first payload byte (the service identifier).

pub mod memory_list;
pub mod uds;

pub use memory_list::{MemoryListDecoder, MemoryListService, PendingRequest, Subfunction};
pub use uds::{UdsDecoder, UdsService};
