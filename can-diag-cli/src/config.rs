//! Configuration loading and parsing
//!
//! A single `config.toml` carries the diagnostic channel IDs and the address
//! table. Transforms are linear `factor * raw + offset` scalings.

use anyhow::{Context, Result};
use can_diag_decoder::{AddressInfo, AddressTable, DecoderConfig, DiagChannel, Transform};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Widest raw value a parameter may span
const MAX_LENGTH: usize = can_diag_decoder::addresses::MAX_BYTE_LENGTH;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub addresses: AddressesConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelsConfig {
    /// Memory-list channel, defaults to 0x7E0/0x7E8
    pub ecu: Option<DiagChannel>,
    /// UDS channel, defaults to 0x7B0/0x7B8
    pub abs_vdc: Option<DiagChannel>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilteringConfig {
    pub message_ids: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AddressesConfig {
    /// 24-bit ECU memory addresses
    #[serde(default)]
    pub ecu: Vec<AddressEntry>,
    /// 16-bit UDS data identifiers
    #[serde(default)]
    pub abs_vdc: Vec<AddressEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddressEntry {
    pub address: u32,
    pub name: String,
    #[serde(default = "default_length")]
    pub length: usize,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_length() -> usize {
    1
}

fn default_factor() -> f64 {
    1.0
}

/// Address table entries that cannot be decoded
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("'{name}': length must be at least 1")]
    ZeroLength { name: String },

    #[error("'{name}': length {length} exceeds {max} bytes")]
    TooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("'{name}': address 0x{address:X} does not fit in {bits} bits")]
    AddressOutOfRange { name: String, address: u32, bits: u32 },
}

impl AddressEntry {
    fn validate(&self, bits: u32) -> std::result::Result<(), ConfigError> {
        if self.length == 0 {
            return Err(ConfigError::ZeroLength {
                name: self.name.clone(),
            });
        }
        if self.length > MAX_LENGTH {
            return Err(ConfigError::TooLong {
                name: self.name.clone(),
                length: self.length,
                max: MAX_LENGTH,
            });
        }
        if self.address >> bits != 0 {
            return Err(ConfigError::AddressOutOfRange {
                name: self.name.clone(),
                address: self.address,
                bits,
            });
        }
        Ok(())
    }

    fn to_info(&self) -> AddressInfo {
        AddressInfo::new(self.name.clone(), self.unit.clone())
            .with_byte_length(self.length)
            .with_transform(Transform::linear(self.factor, self.offset))
    }
}

impl AppConfig {
    /// Build the address table, rejecting entries the decoder cannot use
    pub fn address_table(&self) -> std::result::Result<AddressTable, ConfigError> {
        let mut table = AddressTable::new();

        for entry in &self.addresses.ecu {
            entry.validate(24)?;
            table.insert_memory(entry.address, entry.to_info());
        }

        for entry in &self.addresses.abs_vdc {
            entry.validate(16)?;
            table.insert_identifier(entry.address as u16, entry.to_info());
        }

        Ok(table)
    }

    /// Decoder settings from the channel and filtering sections
    pub fn decoder_config(&self) -> DecoderConfig {
        let mut config = DecoderConfig::new();
        if let Some(ecu) = &self.channels.ecu {
            config.ecu = ecu.clone();
        }
        if let Some(abs_vdc) = &self.channels.abs_vdc {
            config.abs_vdc = abs_vdc.clone();
        }
        config.message_filter = self.filtering.message_ids.clone();
        config
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
