//! Decoder configuration types
//!
//! The CAN IDs of the two diagnostic channels vary by vehicle and module, so they
//! are supplied here rather than hard-coded in the protocol decoders.

use serde::{Deserialize, Serialize};

/// Engine ECU request ID (memory-list protocol)
pub const DEFAULT_ECU_REQUEST_ID: u32 = 0x7E0;
/// Engine ECU response ID (memory-list protocol)
pub const DEFAULT_ECU_RESPONSE_ID: u32 = 0x7E8;
/// ABS/VDC module request ID (UDS)
pub const DEFAULT_ABS_VDC_REQUEST_ID: u32 = 0x7B0;
/// ABS/VDC module response ID (UDS)
pub const DEFAULT_ABS_VDC_RESPONSE_ID: u32 = 0x7B8;

/// Configuration for the decoder library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Channel carrying the memory-list protocol
    #[serde(default = "default_ecu_channel")]
    pub ecu: DiagChannel,

    /// Channel carrying UDS ReadDataByIdentifier traffic
    #[serde(default = "default_abs_vdc_channel")]
    pub abs_vdc: DiagChannel,

    /// Optional: only feed these CAN IDs to the reassembler
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,
}

fn default_ecu_channel() -> DiagChannel {
    DiagChannel::with_name(DEFAULT_ECU_REQUEST_ID, DEFAULT_ECU_RESPONSE_ID, "ecu")
}

fn default_abs_vdc_channel() -> DiagChannel {
    DiagChannel::with_name(
        DEFAULT_ABS_VDC_REQUEST_ID,
        DEFAULT_ABS_VDC_RESPONSE_ID,
        "abs_vdc",
    )
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ecu: default_ecu_channel(),
            abs_vdc: default_abs_vdc_channel(),
            message_filter: None,
        }
    }
}

/// Request/response CAN ID pair of one diagnostic channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DiagChannel {
    /// Tester -> module (request)
    pub request: u32,
    /// Module -> tester (response)
    pub response: u32,
    /// Optional name for documentation
    #[serde(default)]
    pub name: Option<String>,
}

impl DiagChannel {
    /// Create a new channel
    pub fn new(request: u32, response: u32) -> Self {
        Self {
            request,
            response,
            name: None,
        }
    }

    /// Create a new channel with a name
    pub fn with_name(request: u32, response: u32, name: impl Into<String>) -> Self {
        Self {
            request,
            response,
            name: Some(name.into()),
        }
    }

    /// True if the CAN ID is either side of this channel
    pub fn contains(&self, can_id: u32) -> bool {
        can_id == self.request || can_id == self.response
    }
}

/// Which decoder a CAN ID is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    MemoryList,
    Uds,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the memory-list (ECU) channel
    pub fn with_ecu_channel(mut self, request: u32, response: u32) -> Self {
        self.ecu = DiagChannel::with_name(request, response, "ecu");
        self
    }

    /// Builder method: set the UDS (ABS/VDC) channel
    pub fn with_abs_vdc_channel(mut self, request: u32, response: u32) -> Self {
        self.abs_vdc = DiagChannel::with_name(request, response, "abs_vdc");
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Check if a message ID should be fed to the reassembler
    pub fn should_process_message(&self, can_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&can_id),
            None => true,
        }
    }

    /// Route a transport message by CAN ID
    pub fn route(&self, can_id: u32) -> Option<Route> {
        if self.ecu.contains(can_id) {
            Some(Route::MemoryList)
        } else if self.abs_vdc.contains(can_id) {
            Some(Route::Uds)
        } else {
            None
        }
    }

    /// Reject channel layouts that would make routing ambiguous
    pub fn validate(&self) -> crate::types::Result<()> {
        let overlaps = self.abs_vdc.contains(self.ecu.request) || self.abs_vdc.contains(self.ecu.response);
        if overlaps {
            return Err(crate::types::DecoderError::InvalidConfig(format!(
                "ECU channel 0x{:X}/0x{:X} overlaps ABS/VDC channel 0x{:X}/0x{:X}",
                self.ecu.request, self.ecu.response, self.abs_vdc.request, self.abs_vdc.response
            )));
        }
        Ok(())
    }
}
