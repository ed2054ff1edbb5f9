//! sm-trace - Offline ScopeMeter capture decoder
//!
//! Reads a newline-delimited JSON capture of direction-tagged byte events,
//! runs them through the protocol decoder, and prints the resulting
//! annotations.
//!
//! Capture format, one event per line:
//!
//! ```text
//! {"start":100,"end":110,"dir":"tx","value":82}
//! ```
//!
//! Positions are whatever unit the capture tool used (sample numbers,
//! microseconds); the decoder only requires them to be non-decreasing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sm_protocol::{Annotation, ByteEvent, Decoder, Variant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "sm-trace", version, about)]
struct Args {
    /// Capture file (JSON lines of byte events)
    capture: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: Output,

    /// Instrument model family
    #[arg(long, value_enum, default_value = "series90")]
    variant: VariantArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// One annotation per line: positions, category, label
    Text,
    /// One JSON object per annotation
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// ScopeMeter 90 series
    #[value(name = "series90")]
    Series90,
}

impl From<VariantArg> for Variant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Series90 => Variant::Series90,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sm_trace=info,sm_protocol=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let variant = Variant::from(args.variant);
    tracing::debug!(variant = variant.name(), "decoding capture");

    let file = File::open(&args.capture)
        .with_context(|| format!("cannot open capture {}", args.capture.display()))?;

    let mut decoder = Decoder::new(variant);
    let mut events = 0u64;
    let mut annotations = 0u64;

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("reading capture")?;
        if line.trim().is_empty() {
            continue;
        }

        let event = parse_event(&line)
            .with_context(|| format!("{}:{}", args.capture.display(), lineno + 1))?;
        events += 1;

        for ann in decoder.process(event) {
            annotations += 1;
            print_annotation(&ann, args.output)?;
        }
    }

    tracing::info!(events, annotations, "capture decoded");
    Ok(())
}

fn parse_event(line: &str) -> Result<ByteEvent> {
    let event: ByteEvent = serde_json::from_str(line).context("malformed byte event")?;
    Ok(event)
}

fn print_annotation(ann: &Annotation, output: Output) -> Result<()> {
    match output {
        Output::Text => {
            println!(
                "{:>10}..{:<10} {:<16} {}",
                ann.start,
                ann.end,
                format!("{:?}", ann.kind),
                ann.label()
            );
        }
        Output::Json => {
            println!("{}", serde_json::to_string(ann)?);
        }
    }
    Ok(())
}
