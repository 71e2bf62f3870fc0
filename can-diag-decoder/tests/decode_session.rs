// End-to-end decoding over in-memory and on-disk traces
use can_diag_decoder::{
    AddressInfo, AddressTable, DecodeIssue, DecodedMessage, Decoder, DecoderConfig, DecoderError,
    IssueKind, ParameterValue, RawFrame, Transform,
};
use std::io::Write;

const ECU_REQ: u32 = 0x7E0;
const ECU_RES: u32 = 0x7E8;
const VDC_REQ: u32 = 0x7B0;
const VDC_RES: u32 = 0x7B8;

fn decoder() -> Decoder {
    let mut table = AddressTable::new();
    table.insert_memory(
        0x000010,
        AddressInfo::new("Engine Speed", "rpm")
            .with_byte_length(2)
            .with_transform(Transform::linear(0.25, 0.0)),
    );
    table.insert_memory(
        0x000008,
        AddressInfo::new("Coolant Temp", "°C").with_transform(Transform::linear(1.0, -40.0)),
    );
    table.insert_identifier(
        0x1010,
        AddressInfo::new("Brake Pressure", "bar")
            .with_byte_length(2)
            .with_transform(Transform::linear(0.01, 0.0)),
    );
    Decoder::with_table(table)
}

/// Request for 0x10, 0x20, 0x30 (single frame) and its response
fn ecu_exchange() -> Vec<RawFrame> {
    vec![
        RawFrame::new(0.000, ECU_REQ, vec![0x10, 0x0B, 0xA8, 0x00, 0x00, 0x00, 0x10, 0x00]),
        RawFrame::new(0.001, ECU_RES, vec![0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
        RawFrame::new(0.002, ECU_REQ, vec![0x21, 0x00, 0x20, 0x00, 0x00, 0x30, 0x00, 0x00]),
        RawFrame::new(0.010, ECU_RES, vec![0x04, 0xE8, 0x0C, 0x80, 0x30, 0x00, 0x00, 0x00]),
    ]
}

fn decode(decoder: &Decoder, frames: Vec<RawFrame>) -> Vec<can_diag_decoder::Result<DecodedMessage>> {
    decoder
        .decode_frames(frames.into_iter().map(Ok), DecoderConfig::new())
        .unwrap()
        .collect()
}

fn messages(items: &[can_diag_decoder::Result<DecodedMessage>]) -> Vec<&DecodedMessage> {
    items.iter().filter_map(|item| item.as_ref().ok()).collect()
}

fn issues(items: &[can_diag_decoder::Result<DecodedMessage>]) -> Vec<&DecodeIssue> {
    items
        .iter()
        .filter_map(|item| item.as_ref().err())
        .filter_map(DecoderError::as_issue)
        .collect()
}

#[test]
fn test_memory_list_request_response() {
    let items = decode(&decoder(), ecu_exchange());
    assert!(issues(&items).is_empty());

    let decoded = messages(&items);
    assert_eq!(decoded.len(), 1);
    let message = decoded[0];
    assert_eq!(message.can_id, ECU_RES);
    assert_eq!(message.timestamp, 0.010);
    assert_eq!(message.parameters.len(), 2);

    let rpm = &message.parameters[0];
    assert_eq!(rpm.name, "Engine Speed");
    assert_eq!(rpm.addresses, vec![0x000010, 0x000020]);
    assert_eq!(rpm.value, ParameterValue::Physical(800.0));

    let unknown = &message.parameters[1];
    assert_eq!(unknown.addresses, vec![0x000030]);
    assert_eq!(unknown.value, ParameterValue::Raw(0x30));
    assert_eq!(unknown.label(), "0x000030");
}

#[test]
fn test_uds_response() {
    let frames = vec![
        RawFrame::new(1.0, VDC_REQ, vec![0x03, 0x22, 0x10, 0x10, 0x00, 0x00, 0x00, 0x00]),
        RawFrame::new(1.1, VDC_RES, vec![0x05, 0x62, 0x10, 0x10, 0x01, 0xF4, 0x00, 0x00]),
        RawFrame::new(1.2, VDC_RES, vec![0x05, 0x62, 0x01, 0x02, 0x00, 0x2A, 0x00, 0x00]),
    ];
    let items = decode(&decoder(), frames);
    let decoded = messages(&items);

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].parameters[0].name, "Brake Pressure");
    assert_eq!(decoded[0].parameters[0].value, ParameterValue::Physical(5.0));
    assert_eq!(decoded[1].parameters[0].addresses, vec![0x0102]);
    assert_eq!(decoded[1].parameters[0].value, ParameterValue::Raw(42));
}

#[test]
fn test_count_mismatch_then_match() {
    let mut frames = ecu_exchange();
    frames.insert(
        3,
        RawFrame::new(0.005, ECU_RES, vec![0x03, 0xE8, 0x0C, 0x80, 0x00, 0x00, 0x00, 0x00]),
    );

    let items = decode(&decoder(), frames);
    assert_eq!(
        issues(&items),
        vec![&DecodeIssue::CountMismatch {
            can_id: ECU_RES,
            requested: 3,
            received: 2
        }]
    );
    assert_eq!(messages(&items).len(), 1);
}

#[test]
fn test_capture_starting_mid_message() {
    let mut frames = vec![
        RawFrame::new(0.0, ECU_RES, vec![0x22, 0x01, 0x02, 0x03]),
        RawFrame::new(0.0, ECU_RES, vec![0x02, 0xE8, 0x01]),
    ];
    frames.extend(ecu_exchange());

    let items = decode(&decoder(), frames);
    let kinds: Vec<IssueKind> = issues(&items).iter().map(|issue| issue.kind()).collect();
    assert_eq!(kinds, vec![IssueKind::OrphanContinuation, IssueKind::UnmatchedResponse]);
    assert_eq!(messages(&items).len(), 1);
}

#[test]
fn test_malformed_frames_do_not_stop_decoding() {
    let mut frames = vec![
        RawFrame::new(0.0, ECU_RES, vec![0xF0, 0x00]),
        RawFrame::new(0.0, ECU_REQ, vec![0x03, 0xA8, 0x00, 0x01]),
        RawFrame::new(0.0, VDC_RES, vec![0x02, 0x50, 0x03]),
    ];
    frames.extend(ecu_exchange());

    let decoder = decoder();
    let mut iter = decoder
        .decode_frames(frames.into_iter().map(Ok), DecoderConfig::new())
        .unwrap();
    let items: Vec<_> = iter.by_ref().collect();

    assert_eq!(messages(&items).len(), 1);
    let summary = iter.summary();
    assert_eq!(summary.issues.get(&IssueKind::MalformedFrame), Some(&2));
    assert_eq!(summary.issues.get(&IssueKind::UnknownService), Some(&1));
    assert_eq!(summary.total_issues(), 3);
    assert_eq!(summary.frames, 7);
    assert_eq!(summary.parameters, 2);
}

#[test]
fn test_fresh_sessions_are_idempotent() {
    let decoder = decoder();
    let mut frames = ecu_exchange();
    // leave a request pending and a buffer open at the end
    frames.push(RawFrame::new(0.5, ECU_REQ, vec![0x05, 0xA8, 0x00, 0x00, 0x00, 0x08]));
    frames.push(RawFrame::new(0.6, VDC_RES, vec![0x10, 0x10, 0x62]));

    let first = decode(&decoder, frames.clone());
    let second = decode(&decoder, frames);

    let first: Vec<String> = first.iter().map(|item| format!("{:?}", item)).collect();
    let second: Vec<String> = second.iter().map(|item| format!("{:?}", item)).collect();
    assert_eq!(first, second);

    // a response alone must not see the previous run's pending request
    let items = decode(
        &decoder,
        vec![RawFrame::new(0.0, ECU_RES, vec![0x02, 0xE8, 0x5A])],
    );
    assert_eq!(
        issues(&items),
        vec![&DecodeIssue::UnmatchedResponse { can_id: ECU_RES }]
    );
}

#[test]
fn test_custom_channels() {
    let frames = vec![
        RawFrame::new(0.0, 0x7E1, vec![0x05, 0xA8, 0x00, 0x00, 0x00, 0x08]),
        RawFrame::new(0.1, 0x7E9, vec![0x02, 0xE8, 0x82]),
        // default ECU ID is no longer routed
        RawFrame::new(0.2, ECU_RES, vec![0x02, 0xE8, 0x82]),
    ];

    let decoder = decoder();
    let config = DecoderConfig::new().with_ecu_channel(0x7E1, 0x7E9);
    let items: Vec<_> = decoder
        .decode_frames(frames.into_iter().map(Ok), config)
        .unwrap()
        .collect();

    assert_eq!(items.len(), 1);
    let message = items[0].as_ref().unwrap();
    assert_eq!(message.parameters[0].name, "Coolant Temp");
    assert_eq!(message.parameters[0].value, ParameterValue::Physical(90.0));
}

#[test]
fn test_decode_trc_file() {
    let mut file = tempfile::Builder::new().suffix(".trc").tempfile().unwrap();
    writeln!(file, "Time   ID     DLC Data                    Comment").unwrap();
    writeln!(file, "0.000  7B0    8   03 22 10 10 00 00 00 00").unwrap();
    writeln!(file, "0.004  7B8    8   05 62 10 10 00 64 00 00").unwrap();
    writeln!(file, "garbage").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "0.100  7E0    8   05 A8 00 00 00 08 00 00").unwrap();
    writeln!(file, "0.104  7E8    8   02 E8 5A 00 00 00 00 00").unwrap();
    file.flush().unwrap();

    let decoder = decoder();
    let items: Vec<_> = decoder
        .decode_file(file.path(), DecoderConfig::new())
        .unwrap()
        .collect();

    assert_eq!(items.len(), 3);
    let brake = items[0].as_ref().unwrap();
    assert_eq!(brake.parameters[0].value, ParameterValue::Physical(1.0));
    assert!(matches!(items[1], Err(DecoderError::LogParseError(_))));
    let coolant = items[2].as_ref().unwrap();
    assert_eq!(coolant.timestamp, 0.104);
    assert_eq!(coolant.parameters[0].value, ParameterValue::Physical(50.0));
}

#[test]
fn test_missing_trc_file() {
    let decoder = decoder();
    let result = decoder.decode_file(
        std::path::Path::new("does-not-exist.trc"),
        DecoderConfig::new(),
    );
    assert!(matches!(result, Err(DecoderError::LogParseError(_))));
}
