//! Output rendering
//!
//! Writes decoded messages as plain text, long-format CSV, or JSON lines.

use anyhow::Result;
use can_diag_decoder::{DecodedMessage, DecodedParameter};
use clap::ValueEnum;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
}

/// Streams decoded messages to a writer in the chosen format
pub struct Renderer<W: Write> {
    writer: W,
    format: OutputFormat,
    header_written: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            header_written: false,
        }
    }

    /// Render one decoded message
    pub fn write_message(&mut self, message: &DecodedMessage) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(message),
            OutputFormat::Csv => self.write_csv(message),
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, message)?;
                writeln!(self.writer)?;
                Ok(())
            }
        }
    }

    fn write_text(&mut self, message: &DecodedMessage) -> Result<()> {
        for parameter in &message.parameters {
            let line = format!(
                "[{:.6}] 0x{:03X} {} = {} {}",
                message.timestamp,
                message.can_id,
                parameter.label(),
                parameter.value,
                parameter.unit
            );
            writeln!(self.writer, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn write_csv(&mut self, message: &DecodedMessage) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "timestamp,can_id,name,addresses,value,unit")?;
            self.header_written = true;
        }

        for parameter in &message.parameters {
            writeln!(
                self.writer,
                "{:.6},0x{:03X},{},{},{},{}",
                message.timestamp,
                message.can_id,
                csv_field(&parameter.name),
                address_list(parameter),
                parameter.value,
                csv_field(&parameter.unit)
            )?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn address_list(parameter: &DecodedParameter) -> String {
    parameter
        .addresses
        .iter()
        .map(|addr| format!("0x{:06X}", addr))
        .collect::<Vec<_>>()
        .join(";")
}

/// Quote a field if it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
