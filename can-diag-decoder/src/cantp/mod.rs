//! CAN-TP (ISO-TP) message reconstruction
//!
//! Passive reassembly of single and multi-frame ISO-TP messages from a captured
//! frame stream. State is kept per CAN ID, so frames from many IDs may be
//! interleaved, but frames of one ID must arrive in capture order.
//!
//! There is no timeout: a buffer whose closing consecutive frame never shows up
//! stays allocated for the life of the reassembler. Stale buffers are retained,
//! not reclaimed.

use crate::types::{DecodeIssue, RawFrame, Timestamp, TransportMessage};
use std::collections::HashMap;

/// ISO-TP frame type, encoded in the upper nibble of the PCI byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Complete message in one frame, lower nibble = length
    Single,
    /// Start of a segmented message, 12-bit length
    First,
    /// Continuation of a segmented message, lower nibble = sequence number
    Consecutive,
    /// Receiver-side flow control, no payload
    FlowControl,
}

impl FrameType {
    /// Classify a PCI byte, `None` for reserved frame types
    pub fn from_pci(pci: u8) -> Option<Self> {
        match pci >> 4 {
            0x0 => Some(FrameType::Single),
            0x1 => Some(FrameType::First),
            0x2 => Some(FrameType::Consecutive),
            0x3 => Some(FrameType::FlowControl),
            _ => None,
        }
    }
}

/// In-progress multi-frame message for one CAN ID
#[derive(Debug)]
struct ReassemblyState {
    start_timestamp: Timestamp,
    expected_length: usize,
    accumulated: Vec<u8>,
    last_sequence: u8,
}

impl ReassemblyState {
    fn is_complete(&self) -> bool {
        self.accumulated.len() >= self.expected_length
    }

    fn into_message(mut self, can_id: u32) -> TransportMessage {
        // drop CAN padding past the declared length
        self.accumulated.truncate(self.expected_length);
        TransportMessage {
            timestamp: self.start_timestamp,
            can_id,
            payload: self.accumulated,
        }
    }
}

/// Result of feeding one frame to the reassembler
///
/// A sequence gap can be reported on the same frame that completes a message,
/// so both fields may be set at once.
#[derive(Debug, Default, PartialEq)]
pub struct FeedOutcome {
    /// Completed transport message, if this frame finished one
    pub message: Option<TransportMessage>,
    /// Recoverable problem found while handling this frame
    pub issue: Option<DecodeIssue>,
}

impl FeedOutcome {
    fn pending() -> Self {
        Self::default()
    }

    fn complete(message: TransportMessage) -> Self {
        Self {
            message: Some(message),
            issue: None,
        }
    }

    fn issue(issue: DecodeIssue) -> Self {
        Self {
            message: None,
            issue: Some(issue),
        }
    }
}

/// Per-CAN-ID ISO-TP reassembler
#[derive(Debug, Default)]
pub struct Reassembler {
    buffers: HashMap<u32, ReassemblyState>,
}

impl Reassembler {
    /// Create a reassembler with no open buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one captured frame
    pub fn feed(&mut self, frame: &RawFrame) -> FeedOutcome {
        let Some(pci) = frame.pci() else {
            return FeedOutcome::issue(DecodeIssue::malformed(frame.can_id, "empty frame"));
        };
        let low_nibble = pci & 0x0F;

        match FrameType::from_pci(pci) {
            Some(FrameType::Single) => Self::single_frame(frame, low_nibble),
            Some(FrameType::First) => self.first_frame(frame, low_nibble),
            Some(FrameType::Consecutive) => self.consecutive_frame(frame, low_nibble),
            Some(FrameType::FlowControl) => {
                log::trace!("Ignoring flow control frame on 0x{:03X}", frame.can_id);
                FeedOutcome::pending()
            }
            None => FeedOutcome::issue(DecodeIssue::malformed(
                frame.can_id,
                format!("unknown frame type 0x{:X}", pci >> 4),
            )),
        }
    }

    fn single_frame(frame: &RawFrame, length: u8) -> FeedOutcome {
        let length = length as usize;
        if 1 + length > frame.data.len() {
            return FeedOutcome::issue(DecodeIssue::malformed(
                frame.can_id,
                format!(
                    "single frame declares {} bytes but carries {}",
                    length,
                    frame.data.len() - 1
                ),
            ));
        }

        FeedOutcome::complete(TransportMessage {
            timestamp: frame.timestamp,
            can_id: frame.can_id,
            payload: frame.data[1..1 + length].to_vec(),
        })
    }

    fn first_frame(&mut self, frame: &RawFrame, length_high: u8) -> FeedOutcome {
        if frame.data.len() < 2 {
            return FeedOutcome::issue(DecodeIssue::malformed(
                frame.can_id,
                "first frame without length byte",
            ));
        }

        let expected_length = ((length_high as usize) << 8) | frame.data[1] as usize;
        if expected_length == 0 {
            return FeedOutcome::issue(DecodeIssue::malformed(
                frame.can_id,
                "escape-coded first frame length is not supported",
            ));
        }

        let state = ReassemblyState {
            start_timestamp: frame.timestamp,
            expected_length,
            accumulated: frame.data[2..].to_vec(),
            last_sequence: 0,
        };

        // Only one reassembly per ID is meaningful: a new first frame wins.
        if let Some(old) = self.buffers.remove(&frame.can_id) {
            log::debug!(
                "First frame on 0x{:03X} replaces open buffer ({}/{} bytes)",
                frame.can_id,
                old.accumulated.len(),
                old.expected_length
            );
        }

        if state.is_complete() {
            return FeedOutcome::complete(state.into_message(frame.can_id));
        }

        log::trace!(
            "Opened buffer on 0x{:03X} for {} bytes",
            frame.can_id,
            expected_length
        );
        self.buffers.insert(frame.can_id, state);
        FeedOutcome::pending()
    }

    fn consecutive_frame(&mut self, frame: &RawFrame, sequence: u8) -> FeedOutcome {
        let Some(state) = self.buffers.get_mut(&frame.can_id) else {
            // capture likely started mid-message
            return FeedOutcome::issue(DecodeIssue::OrphanContinuation {
                can_id: frame.can_id,
                sequence,
            });
        };

        let expected = (state.last_sequence + 1) & 0x0F;
        let issue = (sequence != expected).then(|| DecodeIssue::SequenceGap {
            can_id: frame.can_id,
            expected,
            found: sequence,
        });

        // Lenient: keep the bytes and resync on the observed counter.
        state.accumulated.extend_from_slice(&frame.data[1..]);
        state.last_sequence = sequence;

        let message = if state.is_complete() {
            self.buffers
                .remove(&frame.can_id)
                .map(|state| state.into_message(frame.can_id))
        } else {
            None
        };

        FeedOutcome { message, issue }
    }

    /// Number of CAN IDs with an open multi-frame buffer
    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// True if a multi-frame message is in progress on this CAN ID
    pub fn is_open(&self, can_id: u32) -> bool {
        self.buffers.contains_key(&can_id)
    }

    /// Drop all open buffers
    pub fn reset(&mut self) {
        self.buffers.clear();
    }
}
