//! Core types for the CAN diagnostic decoder library
//!
//! This module defines the frame model, the reassembled transport message, the
//! decoded parameter records the library emits, and the error taxonomy. Decoded
//! records are immutable once produced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the decoder
///
/// Seconds relative to the start of the capture, as written by the trace tool.
pub type Timestamp = f64;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Raw CAN frame from a trace file
///
/// One per physical bus frame, before any ISO-TP interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Capture timestamp in seconds
    pub timestamp: Timestamp,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Frame data bytes (1-8 for classic CAN)
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(timestamp: Timestamp, can_id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            can_id,
            data: data.into(),
        }
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// The ISO-TP protocol control byte, if the frame carries any data
    pub fn pci(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// A complete ISO-TP unit with the transport headers stripped
///
/// Produced once per single frame or fully reassembled multi-frame message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportMessage {
    /// Timestamp of the first constituent frame
    pub timestamp: Timestamp,
    /// CAN ID the message travelled on
    pub can_id: u32,
    /// Reassembled payload, trimmed to the declared length
    pub payload: Vec<u8>,
}

impl TransportMessage {
    /// First payload byte, which is the diagnostic service identifier
    pub fn service_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse trace file: {0}")]
    LogParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Decode(#[from] DecodeIssue),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecoderError {
    /// The recoverable decode issue carried by this error, if any
    pub fn as_issue(&self) -> Option<&DecodeIssue> {
        match self {
            DecoderError::Decode(issue) => Some(issue),
            _ => None,
        }
    }
}

/// Recoverable problems found while decoding a capture
///
/// None of these stop a session: the offending frame or message is dropped and
/// decoding carries on with the next frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeIssue {
    #[error("Malformed frame on 0x{can_id:03X}: {reason}")]
    MalformedFrame { can_id: u32, reason: String },

    #[error("Consecutive frame (seq {sequence}) on 0x{can_id:03X} without a first frame")]
    OrphanContinuation { can_id: u32, sequence: u8 },

    #[error("Sequence gap on 0x{can_id:03X}: expected {expected}, got {found}")]
    SequenceGap { can_id: u32, expected: u8, found: u8 },

    #[error("Response on 0x{can_id:03X} without a pending request")]
    UnmatchedResponse { can_id: u32 },

    #[error("Response on 0x{can_id:03X} carries {received} values, request asked for {requested}")]
    CountMismatch {
        can_id: u32,
        requested: usize,
        received: usize,
    },

    #[error("Unknown service 0x{service:02X} on 0x{can_id:03X}")]
    UnknownService { can_id: u32, service: u8 },

    #[error("Negative response to service 0x{service:02X} on 0x{can_id:03X} (NRC 0x{code:02X})")]
    NegativeResponse { can_id: u32, service: u8, code: u8 },
}

impl DecodeIssue {
    pub(crate) fn malformed(can_id: u32, reason: impl Into<String>) -> Self {
        DecodeIssue::MalformedFrame {
            can_id,
            reason: reason.into(),
        }
    }

    /// Category of this issue, for counting
    pub fn kind(&self) -> IssueKind {
        match self {
            DecodeIssue::MalformedFrame { .. } => IssueKind::MalformedFrame,
            DecodeIssue::OrphanContinuation { .. } => IssueKind::OrphanContinuation,
            DecodeIssue::SequenceGap { .. } => IssueKind::SequenceGap,
            DecodeIssue::UnmatchedResponse { .. } => IssueKind::UnmatchedResponse,
            DecodeIssue::CountMismatch { .. } => IssueKind::CountMismatch,
            DecodeIssue::UnknownService { .. } => IssueKind::UnknownService,
            DecodeIssue::NegativeResponse { .. } => IssueKind::NegativeResponse,
        }
    }

    /// CAN ID of the frame or message that triggered the issue
    pub fn can_id(&self) -> u32 {
        match self {
            DecodeIssue::MalformedFrame { can_id, .. }
            | DecodeIssue::OrphanContinuation { can_id, .. }
            | DecodeIssue::SequenceGap { can_id, .. }
            | DecodeIssue::UnmatchedResponse { can_id }
            | DecodeIssue::CountMismatch { can_id, .. }
            | DecodeIssue::UnknownService { can_id, .. }
            | DecodeIssue::NegativeResponse { can_id, .. } => *can_id,
        }
    }
}

/// Decode issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    MalformedFrame,
    OrphanContinuation,
    SequenceGap,
    UnmatchedResponse,
    CountMismatch,
    UnknownService,
    NegativeResponse,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::MalformedFrame => "MalformedFrame",
            IssueKind::OrphanContinuation => "OrphanContinuation",
            IssueKind::SequenceGap => "SequenceGap",
            IssueKind::UnmatchedResponse => "UnmatchedResponse",
            IssueKind::CountMismatch => "CountMismatch",
            IssueKind::UnknownService => "UnknownService",
            IssueKind::NegativeResponse => "NegativeResponse",
        };
        f.write_str(name)
    }
}

/// Value of a decoded parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Raw integer, no table entry applied
    Raw(u64),
    /// Physical value produced by a table transform
    Physical(f64),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Raw(v) => write!(f, "0x{:02X}", v),
            ParameterValue::Physical(v) => write!(f, "{}", v),
        }
    }
}

impl ParameterValue {
    /// Convert the value to f64
    pub fn as_f64(&self) -> f64 {
        match self {
            ParameterValue::Raw(v) => *v as f64,
            ParameterValue::Physical(v) => *v,
        }
    }

    /// Raw integer, if no transform was applied
    pub fn as_raw(&self) -> Option<u64> {
        match self {
            ParameterValue::Raw(v) => Some(*v),
            ParameterValue::Physical(_) => None,
        }
    }
}

/// A decoded diagnostic parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedParameter {
    /// Memory addresses or data identifier the value was read from
    pub addresses: Vec<u32>,
    /// Decoded value
    pub value: ParameterValue,
    /// Parameter name from the address table (empty if unknown)
    pub name: String,
    /// Engineering unit (empty if unknown)
    pub unit: String,
}

impl DecodedParameter {
    /// Parameter with no table entry: raw value, no name or unit
    pub fn unknown(addresses: Vec<u32>, raw: u64) -> Self {
        Self {
            addresses,
            value: ParameterValue::Raw(raw),
            name: String::new(),
            unit: String::new(),
        }
    }

    /// True if the parameter was resolved through the address table
    pub fn is_known(&self) -> bool {
        !self.name.is_empty()
    }

    /// Display label: the table name, or the hex address list for unknown values
    pub fn label(&self) -> String {
        if self.is_known() {
            return self.name.clone();
        }
        self.addresses
            .iter()
            .map(|addr| format!("{:#08x}", addr))
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Decoded parameters of one transport message - the primary output of the decoder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// Timestamp of the transport message (first frame)
    pub timestamp: Timestamp,
    /// CAN ID of the transport message
    pub can_id: u32,
    /// Parameters in production order
    pub parameters: Vec<DecodedParameter>,
}
