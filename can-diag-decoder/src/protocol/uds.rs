//! UDS ReadDataByIdentifier decoding (ISO 14229-1)
//!
//! Positive responses echo the 16-bit data identifier, so they decode without
//! any request correlation.

use crate::addresses::AddressTable;
use crate::types::{DecodeIssue, DecodedParameter, ParameterValue, TransportMessage};
use byteorder::{BigEndian, ByteOrder};

/// Service identifiers handled on the UDS channel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdsService {
    /// ReadDataByIdentifier request
    ReadDataByIdentifier = 0x22,
    /// ReadDataByIdentifier positive response
    ReadDataByIdentifierResponse = 0x62,
    /// Negative response, carries the rejected service and a response code
    NegativeResponse = 0x7F,
}

impl TryFrom<u8> for UdsService {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x22 => Ok(UdsService::ReadDataByIdentifier),
            0x62 => Ok(UdsService::ReadDataByIdentifierResponse),
            0x7F => Ok(UdsService::NegativeResponse),
            other => Err(other),
        }
    }
}

/// UDS decoder (stateless)
#[derive(Debug, Default)]
pub struct UdsDecoder;

impl UdsDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one transport message from the UDS channel
    ///
    /// Only positive responses produce a parameter; requests are parsed and
    /// then dropped, since the identifier travels back in the response.
    pub fn decode(
        &self,
        message: &TransportMessage,
        table: &AddressTable,
    ) -> Result<Option<DecodedParameter>, DecodeIssue> {
        let payload = &message.payload;
        let Some(service) = message.service_id() else {
            return Err(DecodeIssue::malformed(message.can_id, "empty payload"));
        };

        match UdsService::try_from(service) {
            Ok(UdsService::ReadDataByIdentifier) => {
                if payload.len() < 3 {
                    return Err(DecodeIssue::malformed(
                        message.can_id,
                        "read request without data identifier",
                    ));
                }
                log::trace!(
                    "UDS read of 0x{:04X} on 0x{:03X}",
                    BigEndian::read_u16(&payload[1..3]),
                    message.can_id
                );
                Ok(None)
            }
            Ok(UdsService::ReadDataByIdentifierResponse) => {
                if payload.len() < 5 {
                    return Err(DecodeIssue::malformed(
                        message.can_id,
                        format!("positive response of {} bytes, need 5", payload.len()),
                    ));
                }
                let identifier = BigEndian::read_u16(&payload[1..3]);
                let raw = BigEndian::read_u16(&payload[3..5]) as u64;

                let parameter = match table.identifier(identifier) {
                    Some(info) => DecodedParameter {
                        addresses: vec![identifier as u32],
                        value: ParameterValue::Physical(info.transform.apply(raw)),
                        name: info.name.clone(),
                        unit: info.unit.clone(),
                    },
                    None => DecodedParameter::unknown(vec![identifier as u32], raw),
                };
                Ok(Some(parameter))
            }
            Ok(UdsService::NegativeResponse) => {
                if payload.len() < 3 {
                    return Err(DecodeIssue::malformed(
                        message.can_id,
                        "negative response without response code",
                    ));
                }
                Err(DecodeIssue::NegativeResponse {
                    can_id: message.can_id,
                    service: payload[1],
                    code: payload[2],
                })
            }
            Err(service) => Err(DecodeIssue::UnknownService {
                can_id: message.can_id,
                service,
            }),
        }
    }
}
