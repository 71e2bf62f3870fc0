//! Standalone trace decoder tool
//!
//! Decodes a CANHacker trace with the default channel layout and an empty
//! address table, printing every decoded message as raw values.
//!
//! Usage:
//!   decode_trace <capture.trc> [--limit <count>] [--verbose]

use can_diag_decoder::{DecodedMessage, Decoder, DecoderConfig};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

struct TraceStats {
    decoded_messages: usize,
    parameters: usize,
    errors: usize,
    per_address: HashMap<String, usize>,
}

impl TraceStats {
    fn new() -> Self {
        Self {
            decoded_messages: 0,
            parameters: 0,
            errors: 0,
            per_address: HashMap::new(),
        }
    }

    fn print_summary(&self) {
        println!("\n=== DECODING SUMMARY ===");
        println!("Decoded messages: {}", self.decoded_messages);
        println!("Parameters: {}", self.parameters);
        println!("Errors: {}", self.errors);

        if !self.per_address.is_empty() {
            println!("\nTop 10 Most Frequent Parameters:");
            let mut sorted: Vec<_> = self.per_address.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1));
            for (label, count) in sorted.iter().take(10) {
                println!("  {}: {} times", label, count);
            }
        }
    }
}

fn print_message(message: &DecodedMessage, verbose: bool) {
    println!(
        "[{:.6}s] 0x{:03X} {} parameters",
        message.timestamp,
        message.can_id,
        message.parameters.len()
    );

    if verbose {
        for parameter in &message.parameters {
            println!("    {}: {} {}", parameter.label(), parameter.value, parameter.unit);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <capture.trc> [--limit <count>] [--verbose]", args[0]);
        std::process::exit(1);
    }

    let trace_file = PathBuf::from(&args[1]);
    let mut limit: Option<usize> = None;
    let mut verbose = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                i += 1;
                if i < args.len() {
                    limit = Some(args[i].parse()?);
                }
            }
            "--verbose" | "-v" => verbose = true,
            other => eprintln!("Unknown argument: {}", other),
        }
        i += 1;
    }

    let decoder = Decoder::new();
    let mut messages = decoder.decode_file(&trace_file, DecoderConfig::new())?;

    let mut stats = TraceStats::new();
    for result in messages.by_ref() {
        match result {
            Ok(message) => {
                if limit.is_some_and(|max| stats.decoded_messages >= max) {
                    println!("\n... (limit reached)");
                    break;
                }
                stats.decoded_messages += 1;
                stats.parameters += message.parameters.len();
                for parameter in &message.parameters {
                    *stats.per_address.entry(parameter.label()).or_insert(0) += 1;
                }
                print_message(&message, verbose);
            }
            Err(e) => {
                stats.errors += 1;
                eprintln!("Error decoding: {}", e);
            }
        }
    }

    stats.print_summary();
    println!("Open multi-frame buffers: {}", messages.session().open_buffers());

    Ok(())
}
