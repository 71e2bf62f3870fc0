//! Main decoder API
//!
//! This module provides the primary interface for the decoder library. The
//! `Decoder` owns the address table; each decode run gets a fresh `Session`
//! holding the reassembly buffers and the pending memory-list request, so no
//! state leaks from one capture to the next.

use crate::addresses::{AddressInfo, AddressTable, TableStats};
use crate::cantp::Reassembler;
use crate::config::{DecoderConfig, Route};
use crate::formats::{TrcFrameIterator, TrcParser};
use crate::protocol::{MemoryListDecoder, UdsDecoder};
use crate::types::{
    DecodeIssue, DecodedMessage, DecoderError, IssueKind, RawFrame, Result, TransportMessage,
};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Default)]
pub struct Decoder {
    /// Parameter metadata for both diagnostic channels
    table: AddressTable,
}

impl Decoder {
    /// Create a new decoder with an empty address table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder around an already loaded address table
    pub fn with_table(table: AddressTable) -> Self {
        Self { table }
    }

    /// Add a memory-list (ECU) parameter
    pub fn add_memory_address(&mut self, address: u32, info: AddressInfo) {
        self.table.insert_memory(address, info);
    }

    /// Add a UDS (ABS/VDC) parameter
    pub fn add_identifier(&mut self, identifier: u16, info: AddressInfo) {
        self.table.insert_identifier(identifier, info);
    }

    /// The address table used by every session of this decoder
    pub fn address_table(&self) -> &AddressTable {
        &self.table
    }

    /// Get statistics about the loaded address table
    pub fn table_stats(&self) -> TableStats {
        self.table.stats()
    }

    /// Start a new session for frame-by-frame decoding
    pub fn session(&self, config: DecoderConfig) -> Result<Session<'_>> {
        config.validate()?;
        Ok(Session::new(&self.table, config))
    }

    /// Decode a stream of frames lazily
    ///
    /// Recoverable decode issues come back as `Err(DecoderError::Decode(..))`
    /// items in the same stream; iteration continues after them.
    ///
    /// # Example
    /// ```
    /// use can_diag_decoder::{Decoder, DecoderConfig, RawFrame};
    ///
    /// let decoder = Decoder::new();
    /// let frames = vec![
    ///     Ok(RawFrame::new(0.0, 0x7B0, vec![0x03, 0x22, 0x10, 0x10])),
    ///     Ok(RawFrame::new(0.1, 0x7B8, vec![0x05, 0x62, 0x10, 0x10, 0x00, 0x2A])),
    /// ];
    ///
    /// let messages: Vec<_> = decoder
    ///     .decode_frames(frames, DecoderConfig::new())
    ///     .unwrap()
    ///     .collect();
    /// assert_eq!(messages.len(), 1);
    /// ```
    pub fn decode_frames<I>(
        &self,
        frames: I,
        config: DecoderConfig,
    ) -> Result<DecodingIterator<'_, I::IntoIter>>
    where
        I: IntoIterator<Item = Result<RawFrame>>,
    {
        Ok(DecodingIterator::new(frames.into_iter(), self.session(config)?))
    }

    /// Decode a trace file and return an iterator of decoded messages
    ///
    /// # Example
    /// ```no_run
    /// use can_diag_decoder::{Decoder, DecoderConfig};
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::new();
    /// let messages = decoder
    ///     .decode_file(Path::new("capture.trc"), DecoderConfig::new())
    ///     .unwrap();
    ///
    /// for message in messages {
    ///     match message {
    ///         Ok(decoded) => println!("Decoded: {:?}", decoded),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// ```
    pub fn decode_file(
        &self,
        path: &Path,
        config: DecoderConfig,
    ) -> Result<DecodingIterator<'_, TrcFrameIterator<BufReader<File>>>> {
        log::info!("Decoding trace file: {:?}", path);

        // Determine file type from extension
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("trc") => {
                log::debug!("Detected CANHacker TRC format");
                let frames = TrcParser::parse(path)?;
                self.decode_frames(frames, config)
            }
            _ => Err(DecoderError::LogParseError(format!(
                "Unsupported file format: {:?}",
                extension
            ))),
        }
    }
}

/// Counters collected over one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Raw frames seen, including filtered ones
    pub frames: usize,
    /// Completed ISO-TP messages
    pub transport_messages: usize,
    /// Transport messages that produced parameters
    pub decoded_messages: usize,
    /// Parameters emitted
    pub parameters: usize,
    /// Recoverable issues by kind
    pub issues: BTreeMap<IssueKind, usize>,
}

impl DecodeSummary {
    /// Total number of recoverable issues
    pub fn total_issues(&self) -> usize {
        self.issues.values().sum()
    }

    fn record_issue(&mut self, kind: IssueKind) {
        *self.issues.entry(kind).or_insert(0) += 1;
    }
}

/// One decoding pass over a capture
///
/// Owns the reassembly buffers and the pending memory-list request. Sessions
/// are independent: decoding the same frames in two fresh sessions gives the
/// same output.
pub struct Session<'a> {
    config: DecoderConfig,
    table: &'a AddressTable,
    reassembler: Reassembler,
    memory_list: MemoryListDecoder,
    uds: UdsDecoder,
    summary: DecodeSummary,
}

impl<'a> Session<'a> {
    /// Create a session over a borrowed address table
    pub fn new(table: &'a AddressTable, config: DecoderConfig) -> Self {
        Self {
            config,
            table,
            reassembler: Reassembler::new(),
            memory_list: MemoryListDecoder::new(),
            uds: UdsDecoder::new(),
            summary: DecodeSummary::default(),
        }
    }

    /// Process a single CAN frame
    ///
    /// Returns the outputs in order: at most one decode issue followed by at
    /// most one decoded message.
    pub fn process_frame(&mut self, frame: &RawFrame) -> Vec<Result<DecodedMessage>> {
        let mut out = Vec::new();
        self.summary.frames += 1;

        if !self.config.should_process_message(frame.can_id) {
            return out;
        }

        let outcome = self.reassembler.feed(frame);
        if let Some(issue) = outcome.issue {
            out.push(Err(self.report(issue)));
        }

        if let Some(message) = outcome.message {
            self.summary.transport_messages += 1;
            match self.dispatch(&message) {
                Ok(Some(decoded)) => {
                    self.summary.decoded_messages += 1;
                    self.summary.parameters += decoded.parameters.len();
                    out.push(Ok(decoded));
                }
                Ok(None) => {}
                Err(issue) => out.push(Err(self.report(issue))),
            }
        }

        out
    }

    /// Route a transport message to the decoder for its channel
    fn dispatch(
        &mut self,
        message: &TransportMessage,
    ) -> std::result::Result<Option<DecodedMessage>, DecodeIssue> {
        let parameters = match self.config.route(message.can_id) {
            Some(Route::MemoryList) => self.memory_list.decode(message, self.table)?,
            Some(Route::Uds) => self
                .uds
                .decode(message, self.table)?
                .into_iter()
                .collect(),
            None => {
                log::trace!(
                    "Skipping transport message on 0x{:03X} (no diagnostic channel)",
                    message.can_id
                );
                return Ok(None);
            }
        };

        if parameters.is_empty() {
            return Ok(None);
        }

        Ok(Some(DecodedMessage {
            timestamp: message.timestamp,
            can_id: message.can_id,
            parameters,
        }))
    }

    fn report(&mut self, issue: DecodeIssue) -> DecoderError {
        log::warn!("{}", issue);
        self.summary.record_issue(issue.kind());
        issue.into()
    }

    /// Counters so far
    pub fn summary(&self) -> &DecodeSummary {
        &self.summary
    }

    /// Number of multi-frame messages still waiting for data
    pub fn open_buffers(&self) -> usize {
        self.reassembler.open_buffers()
    }
}

/// Iterator that decodes CAN frames into decoded messages
///
/// Pulls one frame at a time from the underlying iterator, so the caller may
/// stop early without any cleanup.
pub struct DecodingIterator<'a, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    frame_iter: I,
    session: Session<'a>,
    pending: VecDeque<Result<DecodedMessage>>,
}

impl<'a, I> DecodingIterator<'a, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    fn new(frame_iter: I, session: Session<'a>) -> Self {
        Self {
            frame_iter,
            session,
            pending: VecDeque::new(),
        }
    }

    /// Counters of the underlying session
    pub fn summary(&self) -> &DecodeSummary {
        self.session.summary()
    }

    /// The underlying session
    pub fn session(&self) -> &Session<'a> {
        &self.session
    }
}

impl<'a, I> Iterator for DecodingIterator<'a, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    type Item = Result<DecodedMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            match self.frame_iter.next()? {
                Ok(frame) => self.pending.extend(self.session.process_frame(&frame)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
