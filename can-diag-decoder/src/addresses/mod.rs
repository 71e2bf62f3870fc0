//! Address table
//!
//! Static metadata mapping ECU memory addresses and UDS data identifiers to a
//! parameter name, width, unit and value transform.

pub mod table;

// Re-export key types for convenience
pub use table::{AddressInfo, AddressTable, TableStats, Transform, MAX_BYTE_LENGTH};
