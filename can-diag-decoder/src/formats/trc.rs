//! CANHacker `.trc` trace parser
//!
//! One frame per line, whitespace separated:
//!
//! ```text
//! Time   ID     DLC Data                    Comment
//! 12.345 7E8    8   10 0A E8 10 20 30 40 50
//! ```
//!
//! The timestamp is in seconds and the ID and data bytes are hex. Blank lines and
//! header lines starting with `Time` are skipped. Tokens after the last data
//! byte (the comment column) are ignored.

use crate::types::{DecoderError, RawFrame, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Classic CAN payload limit
const MAX_DLC: usize = 8;

/// CANHacker trace parser
pub struct TrcParser;

impl TrcParser {
    /// Open a trace file and return an iterator over its frames
    pub fn parse(path: &Path) -> Result<TrcFrameIterator<BufReader<File>>> {
        log::info!("Parsing TRC file: {:?}", path);

        if !path.exists() {
            return Err(DecoderError::LogParseError(format!(
                "TRC file not found: {:?}",
                path
            )));
        }

        let file = File::open(path).map_err(|e| {
            DecoderError::LogParseError(format!("Failed to open TRC file: {}", e))
        })?;

        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Iterate over frames from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> TrcFrameIterator<R> {
        TrcFrameIterator {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Parse one line; `Ok(None)` for lines that carry no frame
    pub fn parse_line(line: &str) -> std::result::Result<Option<RawFrame>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Time") {
            return Ok(None);
        }

        let mut fields = line.split_whitespace();
        let (Some(timestamp), Some(can_id), Some(dlc)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected timestamp, ID and DLC in {:?}", line));
        };

        let timestamp: f64 = timestamp
            .parse()
            .map_err(|_| format!("invalid timestamp {:?}", timestamp))?;
        let can_id = u32::from_str_radix(can_id, 16)
            .map_err(|_| format!("invalid CAN ID {:?}", can_id))?;
        let dlc: usize = dlc.parse().map_err(|_| format!("invalid DLC {:?}", dlc))?;
        if dlc > MAX_DLC {
            return Err(format!("DLC {} exceeds {}", dlc, MAX_DLC));
        }

        let data = fields
            .take(dlc)
            .map(|byte| u8::from_str_radix(byte, 16).map_err(|_| format!("invalid data byte {:?}", byte)))
            .collect::<std::result::Result<Vec<u8>, String>>()?;
        if data.len() != dlc {
            return Err(format!("DLC {} but only {} data bytes", dlc, data.len()));
        }

        Ok(Some(RawFrame::new(timestamp, can_id, data)))
    }
}

/// Iterator over CAN frames from a trace
pub struct TrcFrameIterator<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> Iterator for TrcFrameIterator<R> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            match TrcParser::parse_line(&line) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(reason) => {
                    return Some(Err(DecoderError::LogParseError(format!(
                        "line {}: {}",
                        self.line_number, reason
                    ))))
                }
            }
        }
    }
}
