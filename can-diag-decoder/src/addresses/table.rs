//! Two-namespace address table
//!
//! `memory` is keyed by 24-bit ECU memory address (memory-list protocol),
//! `identifiers` by 16-bit data identifier (UDS). The table is read-only while a
//! session runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Largest parameter width that fits the u64 raw value
pub const MAX_BYTE_LENGTH: usize = 8;

/// Raw integer to physical value conversion
///
/// Transforms are resolved by whoever loads the table; the decoder only calls them.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(u64) -> f64 + Send + Sync>);

impl Transform {
    /// Wrap an arbitrary conversion
    pub fn new(f: impl Fn(u64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Raw value as-is
    pub fn identity() -> Self {
        Self::new(|raw| raw as f64)
    }

    /// `factor * raw + offset`, the usual CAN signal scaling
    pub fn linear(factor: f64, offset: f64) -> Self {
        Self::new(move |raw| factor * raw as f64 + offset)
    }

    /// Apply the conversion
    pub fn apply(&self, raw: u64) -> f64 {
        (self.0)(raw)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// Metadata for one known parameter
#[derive(Debug, Clone)]
pub struct AddressInfo {
    /// Parameter name
    pub name: String,
    /// Number of consecutive bytes the value spans (1..=8)
    pub byte_length: usize,
    /// Engineering unit (e.g., "rpm", "°C", "deg")
    pub unit: String,
    /// Raw to physical conversion
    pub transform: Transform,
}

impl AddressInfo {
    /// Create a single-byte parameter with an identity transform
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            byte_length: 1,
            unit: unit.into(),
            transform: Transform::identity(),
        }
    }

    /// Builder method: set the byte length
    pub fn with_byte_length(mut self, byte_length: usize) -> Self {
        self.byte_length = byte_length;
        self
    }

    /// Builder method: set the transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// The address table
#[derive(Debug, Default, Clone)]
pub struct AddressTable {
    /// ECU memory addresses (memory-list protocol)
    memory: HashMap<u32, AddressInfo>,
    /// Data identifiers (UDS)
    identifiers: HashMap<u16, AddressInfo>,
}

impl AddressTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a memory address entry, replacing any previous one
    pub fn insert_memory(&mut self, address: u32, info: AddressInfo) {
        if let Some(old) = self.memory.insert(address, info) {
            log::debug!("Memory address 0x{:06X} redefined (was '{}')", address, old.name);
        }
    }

    /// Add a data identifier entry, replacing any previous one
    pub fn insert_identifier(&mut self, identifier: u16, info: AddressInfo) {
        if let Some(old) = self.identifiers.insert(identifier, info) {
            log::debug!("Identifier 0x{:04X} redefined (was '{}')", identifier, old.name);
        }
    }

    /// Look up a memory address
    pub fn memory(&self, address: u32) -> Option<&AddressInfo> {
        self.memory.get(&address)
    }

    /// Look up a data identifier
    pub fn identifier(&self, identifier: u16) -> Option<&AddressInfo> {
        self.identifiers.get(&identifier)
    }

    /// Get table statistics
    pub fn stats(&self) -> TableStats {
        TableStats {
            num_memory: self.memory.len(),
            num_identifiers: self.identifiers.len(),
        }
    }
}

/// Table statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Number of memory address entries
    pub num_memory: usize,
    /// Number of data identifier entries
    pub num_identifiers: usize,
}
