//! Memory-list read protocol
//!
//! The tester sends a list of 24-bit ECU memory addresses (service 0xA8) and
//! the ECU answers with one byte per address, in request order (service 0xE8).
//! The response does not repeat the addresses, so it is correlated with the
//! most recent request seen on the channel.

use crate::addresses::{AddressTable, MAX_BYTE_LENGTH};
use crate::types::{DecodeIssue, DecodedParameter, ParameterValue, Timestamp, TransportMessage};
use byteorder::{BigEndian, ByteOrder};

/// Width of one address in a read request
const ADDRESS_SIZE: usize = 3;

/// Service identifiers on the memory-list channel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryListService {
    /// Read memory by address list (request)
    ReadRequest = 0xA8,
    /// Read memory by address list (response)
    ReadResponse = 0xE8,
}

impl TryFrom<u8> for MemoryListService {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xA8 => Ok(MemoryListService::ReadRequest),
            0xE8 => Ok(MemoryListService::ReadResponse),
            other => Err(other),
        }
    }
}

/// Second request byte. All variants share the same address-list encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subfunction {
    PlainList,
    StartContinuousRead,
    StopContinuousRead,
    Other(u8),
}

impl From<u8> for Subfunction {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Subfunction::PlainList,
            0x01 => Subfunction::StartContinuousRead,
            0x02 => Subfunction::StopContinuousRead,
            other => Subfunction::Other(other),
        }
    }
}

/// The most recent unanswered read request
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub timestamp: Timestamp,
    pub subfunction: Subfunction,
    pub addresses: Vec<u32>,
}

/// Memory-list protocol decoder
///
/// Holds the pending request of one session. Each session needs its own decoder.
#[derive(Debug, Default)]
pub struct MemoryListDecoder {
    pending: Option<PendingRequest>,
}

impl MemoryListDecoder {
    /// Create a decoder with no pending request
    pub fn new() -> Self {
        Self::default()
    }

    /// The request the next response will be matched against
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Decode one transport message from the memory-list channel
    ///
    /// Requests update the pending request and produce no parameters. A matched
    /// response produces one parameter per table entry or unknown byte. The
    /// pending request is kept after a response, since the tester may repeat it.
    pub fn decode(
        &mut self,
        message: &TransportMessage,
        table: &AddressTable,
    ) -> Result<Vec<DecodedParameter>, DecodeIssue> {
        let Some(service) = message.service_id() else {
            return Err(DecodeIssue::malformed(message.can_id, "empty payload"));
        };

        match MemoryListService::try_from(service) {
            Ok(MemoryListService::ReadRequest) => {
                let request = Self::parse_request(message)?;
                log::debug!(
                    "Memory-list request ({:?}) on 0x{:03X} for {} addresses",
                    request.subfunction,
                    message.can_id,
                    request.addresses.len()
                );
                self.pending = Some(request);
                Ok(Vec::new())
            }
            Ok(MemoryListService::ReadResponse) => {
                let pending = self.pending.as_ref().ok_or(DecodeIssue::UnmatchedResponse {
                    can_id: message.can_id,
                })?;

                let values = &message.payload[1..];
                if values.len() != pending.addresses.len() {
                    return Err(DecodeIssue::CountMismatch {
                        can_id: message.can_id,
                        requested: pending.addresses.len(),
                        received: values.len(),
                    });
                }

                Ok(Self::assemble(&pending.addresses, values, table))
            }
            Err(service) => Err(DecodeIssue::UnknownService {
                can_id: message.can_id,
                service,
            }),
        }
    }

    fn parse_request(message: &TransportMessage) -> Result<PendingRequest, DecodeIssue> {
        let payload = &message.payload;
        if payload.len() < 2 {
            return Err(DecodeIssue::malformed(
                message.can_id,
                "read request without subfunction",
            ));
        }

        let address_bytes = &payload[2..];
        if address_bytes.len() % ADDRESS_SIZE != 0 {
            return Err(DecodeIssue::malformed(
                message.can_id,
                format!(
                    "address list of {} bytes is not a multiple of {}",
                    address_bytes.len(),
                    ADDRESS_SIZE
                ),
            ));
        }

        Ok(PendingRequest {
            timestamp: message.timestamp,
            subfunction: Subfunction::from(payload[1]),
            addresses: address_bytes
                .chunks_exact(ADDRESS_SIZE)
                .map(BigEndian::read_u24)
                .collect(),
        })
    }

    /// Walk the address list, letting multi-byte entries absorb the addresses after them
    fn assemble(addresses: &[u32], values: &[u8], table: &AddressTable) -> Vec<DecodedParameter> {
        let mut parameters = Vec::new();
        let mut i = 0;

        while i < addresses.len() {
            let address = addresses[i];

            let Some(info) = table.memory(address) else {
                parameters.push(DecodedParameter::unknown(vec![address], values[i] as u64));
                i += 1;
                continue;
            };

            let width = info.byte_length;
            if width == 0 || width > MAX_BYTE_LENGTH || i + width > values.len() {
                log::warn!(
                    "'{}' at 0x{:06X} spans {} bytes but only {} remain, emitting raw byte",
                    info.name,
                    address,
                    width,
                    values.len() - i
                );
                parameters.push(DecodedParameter::unknown(vec![address], values[i] as u64));
                i += 1;
                continue;
            }

            let raw = BigEndian::read_uint(&values[i..i + width], width);
            parameters.push(DecodedParameter {
                addresses: addresses[i..i + width].to_vec(),
                value: ParameterValue::Physical(info.transform.apply(raw)),
                name: info.name.clone(),
                unit: info.unit.clone(),
            });
            i += width;
        }

        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{AddressInfo, Transform};

    const ECU_REQ: u32 = 0x7E0;
    const ECU_RES: u32 = 0x7E8;

    fn message(can_id: u32, payload: &[u8]) -> TransportMessage {
        TransportMessage {
            timestamp: 1.0,
            can_id,
            payload: payload.to_vec(),
        }
    }

    fn request_three() -> TransportMessage {
        message(
            ECU_REQ,
            &[0xA8, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x20, 0x00, 0x00, 0x30],
        )
    }

    #[test]
    fn test_request_sets_pending() {
        let mut decoder = MemoryListDecoder::new();
        let params = decoder.decode(&request_three(), &AddressTable::new()).unwrap();

        assert!(params.is_empty());
        let pending = decoder.pending().unwrap();
        assert_eq!(pending.addresses, vec![0x000010, 0x000020, 0x000030]);
        assert_eq!(pending.subfunction, Subfunction::PlainList);
        assert_eq!(pending.timestamp, 1.0);
    }

    #[test]
    fn test_24_bit_addresses() {
        let mut decoder = MemoryListDecoder::new();
        decoder
            .decode(
                &message(ECU_REQ, &[0xA8, 0x01, 0xFF, 0x8E, 0x2C]),
                &AddressTable::new(),
            )
            .unwrap();

        let pending = decoder.pending().unwrap();
        assert_eq!(pending.addresses, vec![0xFF8E2C]);
        assert_eq!(pending.subfunction, Subfunction::StartContinuousRead);
    }

    #[test]
    fn test_response_without_table_entries() {
        let mut decoder = MemoryListDecoder::new();
        let table = AddressTable::new();
        decoder.decode(&request_three(), &table).unwrap();

        let params = decoder
            .decode(&message(ECU_RES, &[0xE8, 0x10, 0x20, 0x30]), &table)
            .unwrap();

        assert_eq!(
            params,
            vec![
                DecodedParameter::unknown(vec![0x000010], 0x10),
                DecodedParameter::unknown(vec![0x000020], 0x20),
                DecodedParameter::unknown(vec![0x000030], 0x30),
            ]
        );
    }

    #[test]
    fn test_multi_byte_entry_absorbs_next_address() {
        let mut decoder = MemoryListDecoder::new();
        let mut table = AddressTable::new();
        table.insert_memory(
            0x000010,
            AddressInfo::new("Engine Speed", "rpm")
                .with_byte_length(2)
                .with_transform(Transform::linear(0.25, 0.0)),
        );
        decoder.decode(&request_three(), &table).unwrap();

        let params = decoder
            .decode(&message(ECU_RES, &[0xE8, 0x10, 0x20, 0x30]), &table)
            .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].addresses, vec![0x000010, 0x000020]);
        assert_eq!(params[0].value, ParameterValue::Physical(0x1020 as f64 * 0.25));
        assert_eq!(params[0].name, "Engine Speed");
        assert_eq!(params[0].unit, "rpm");
        assert_eq!(params[1], DecodedParameter::unknown(vec![0x000030], 0x30));
    }

    #[test]
    fn test_multi_byte_entry_past_end_falls_back_to_raw() {
        let mut decoder = MemoryListDecoder::new();
        let mut table = AddressTable::new();
        table.insert_memory(0x000030, AddressInfo::new("Wide", "").with_byte_length(2));
        decoder.decode(&request_three(), &table).unwrap();

        let params = decoder
            .decode(&message(ECU_RES, &[0xE8, 0x01, 0x02, 0x03]), &table)
            .unwrap();

        assert_eq!(params.len(), 3);
        assert_eq!(params[2], DecodedParameter::unknown(vec![0x000030], 0x03));
    }

    #[test]
    fn test_unmatched_response() {
        let mut decoder = MemoryListDecoder::new();
        let result = decoder.decode(&message(ECU_RES, &[0xE8, 0x01]), &AddressTable::new());

        assert_eq!(result, Err(DecodeIssue::UnmatchedResponse { can_id: ECU_RES }));
    }

    #[test]
    fn test_count_mismatch_keeps_pending() {
        let mut decoder = MemoryListDecoder::new();
        let table = AddressTable::new();
        decoder.decode(&request_three(), &table).unwrap();

        let result = decoder.decode(&message(ECU_RES, &[0xE8, 0x10, 0x20]), &table);
        assert_eq!(
            result,
            Err(DecodeIssue::CountMismatch {
                can_id: ECU_RES,
                requested: 3,
                received: 2
            })
        );
        assert!(decoder.pending().is_some());

        // a later full response still matches
        let params = decoder
            .decode(&message(ECU_RES, &[0xE8, 0x10, 0x20, 0x30]), &table)
            .unwrap();
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_new_request_replaces_pending() {
        let mut decoder = MemoryListDecoder::new();
        let table = AddressTable::new();
        decoder.decode(&request_three(), &table).unwrap();
        decoder
            .decode(&message(ECU_REQ, &[0xA8, 0x02, 0x00, 0x01, 0x00]), &table)
            .unwrap();

        let pending = decoder.pending().unwrap();
        assert_eq!(pending.addresses, vec![0x000100]);
        assert_eq!(pending.subfunction, Subfunction::StopContinuousRead);
    }

    #[test]
    fn test_malformed_request() {
        let mut decoder = MemoryListDecoder::new();
        let table = AddressTable::new();

        let result = decoder.decode(&message(ECU_REQ, &[0xA8, 0x00, 0x00, 0x10]), &table);
        assert!(matches!(result, Err(DecodeIssue::MalformedFrame { .. })));

        let result = decoder.decode(&message(ECU_REQ, &[0xA8]), &table);
        assert!(matches!(result, Err(DecodeIssue::MalformedFrame { .. })));

        assert!(decoder.pending().is_none());
    }

    #[test]
    fn test_unknown_service() {
        let mut decoder = MemoryListDecoder::new();
        let result = decoder.decode(&message(ECU_RES, &[0xE4, 0x00]), &AddressTable::new());

        assert_eq!(
            result,
            Err(DecodeIssue::UnknownService {
                can_id: ECU_RES,
                service: 0xE4
            })
        );
    }

    #[test]
    fn test_other_subfunction_is_accepted() {
        assert_eq!(Subfunction::from(0x10), Subfunction::Other(0x10));
    }
}
