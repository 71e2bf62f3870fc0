//! CAN Diagnostic Decoder Library
//!
//! A reusable library for decoding diagnostic traffic captured from a CAN bus.
//!
//! # Architecture
//!
//! - Reassembles ISO-TP (CAN-TP) single and multi-frame messages per CAN ID
//! - Correlates memory-list read requests (0xA8) with their responses (0xE8)
//!   and decodes multi-byte parameters from an address table
//! - Decodes UDS ReadDataByIdentifier responses (0x62)
//! - Reads CANHacker `.trc` traces lazily
//!
//! The library does NOT:
//! - Talk to a live bus or send requests
//! - Generate flow control frames
//! - Evaluate transform expressions (transforms are supplied as closures)
//! - Render output
//!
//! Rendering and configuration files are in the application layer (can-diag-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use can_diag_decoder::{AddressInfo, Decoder, DecoderConfig, Transform};
//! use std::path::Path;
//!
//! let mut decoder = Decoder::new();
//! decoder.add_memory_address(
//!     0x00000E,
//!     AddressInfo::new("Engine Speed", "rpm")
//!         .with_byte_length(2)
//!         .with_transform(Transform::linear(0.25, 0.0)),
//! );
//!
//! let config = DecoderConfig::new().with_ecu_channel(0x7E0, 0x7E8);
//! let messages = decoder.decode_file(Path::new("capture.trc"), config).unwrap();
//!
//! for message in messages {
//!     match message {
//!         Ok(decoded) => {
//!             for parameter in &decoded.parameters {
//!                 println!("{:.3} {} = {}", decoded.timestamp, parameter.label(), parameter.value);
//!             }
//!         }
//!         Err(e) => eprintln!("Decode error: {}", e),
//!     }
//! }
//! ```

// Public modules
pub mod addresses;
pub mod cantp;
pub mod config;
pub mod decoder;
pub mod formats;
pub mod protocol;
pub mod types;

// Re-export main types for convenience
pub use addresses::{AddressInfo, AddressTable, TableStats, Transform};
pub use cantp::{FeedOutcome, FrameType, Reassembler};
pub use config::{DecoderConfig, DiagChannel};
pub use decoder::{DecodeSummary, Decoder, DecodingIterator, Session};
pub use formats::TrcParser;
pub use types::{
    DecodeIssue, DecodedMessage, DecodedParameter, DecoderError, IssueKind, ParameterValue,
    RawFrame, Result, Timestamp, TransportMessage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
