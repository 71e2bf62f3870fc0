//! CAN Diagnostic Decoder CLI Application
//!
//! Command-line front end for the can-diag-decoder library. It adds:
//! - TOML configuration (channel IDs and address table)
//! - Text, CSV and JSON-lines rendering
//! - A decode summary at the end of the run

use anyhow::{Context, Result};
use can_diag_decoder::{Decoder, DecodingIterator, RawFrame, TrcParser};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod output;

use output::{OutputFormat, Renderer};

/// CAN Diag Decoder - decode diagnostic parameters from CAN captures
#[derive(Parser, Debug)]
#[command(name = "can-diag")]
#[command(about = "Decode ISO-TP diagnostic traffic (memory-list and UDS) from CANHacker traces", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the CANHacker .trc file to decode
    #[arg(short, long, value_name = "FILE")]
    trc: PathBuf,

    /// Path to configuration file (channels and address table)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Output file for decoded parameters (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum number of frames to decode (for testing)
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Diag Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", can_diag_decoder::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let table = app_config
        .address_table()
        .context("Invalid address table")?;
    let decoder = Decoder::with_table(table);
    let stats = decoder.table_stats();
    log::info!(
        "Address table: {} memory addresses, {} identifiers",
        stats.num_memory,
        stats.num_identifiers
    );

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let renderer = Renderer::new(writer, args.format);
    let decoder_config = app_config.decoder_config();

    match args.max_frames {
        Some(max) => {
            let frames = TrcParser::parse(&args.trc)?.take(max);
            run(decoder.decode_frames(frames, decoder_config)?, renderer)
        }
        None => run(decoder.decode_file(&args.trc, decoder_config)?, renderer),
    }
}

/// Render every decoded message, then log the session summary
fn run<I, W>(mut messages: DecodingIterator<'_, I>, mut renderer: Renderer<W>) -> Result<()>
where
    I: Iterator<Item = can_diag_decoder::Result<RawFrame>>,
    W: Write,
{
    for result in messages.by_ref() {
        match result {
            Ok(message) => renderer.write_message(&message)?,
            // already logged by the session
            Err(e) if e.as_issue().is_some() => {}
            Err(e) => log::error!("{}", e),
        }
    }
    renderer.finish()?;

    let summary = messages.summary();
    log::info!(
        "Decoded {} messages ({} parameters) from {} frames",
        summary.decoded_messages,
        summary.parameters,
        summary.frames
    );
    for (kind, count) in &summary.issues {
        log::info!("  {}: {}", kind, count);
    }
    let open = messages.session().open_buffers();
    if open > 0 {
        log::info!("{} multi-frame message(s) left incomplete", open);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
