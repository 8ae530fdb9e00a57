//! Convert MARC files between ISO 2709 and MARC-XML, optionally dropping tags.
//!
//! ```text
//! marc_convert input.mrc output.xml --drop-tag LOK --drop-tag 852
//! RUST_LOG=debug marc_convert input.xml output.mrc --append
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use marc_engine::{open_reader, open_writer, tag_set, FileType, WriterMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Auto,
    Binary,
    Xml,
}

impl From<Format> for FileType {
    fn from(format: Format) -> Self {
        match format {
            Format::Auto => FileType::Auto,
            Format::Binary => FileType::Binary,
            Format::Xml => FileType::Xml,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "marc_convert",
    version,
    about = "Copy MARC records between ISO 2709 and MARC-XML files"
)]
struct Cli {
    #[arg(help = "Input file")]
    input: PathBuf,
    #[arg(help = "Output file")]
    output: PathBuf,
    #[arg(long, value_enum, default_value = "auto", help = "Input format")]
    input_format: Format,
    #[arg(long, value_enum, default_value = "auto", help = "Output format")]
    output_format: Format,
    #[arg(long, help = "Append to the output instead of overwriting it (binary only)")]
    append: bool,
    #[arg(long = "drop-tag", value_name = "TAG", help = "Remove all fields with this tag (repeatable)")]
    drop_tags: Vec<String>,
    #[arg(short, long, help = "Log at debug level unless RUST_LOG is set")]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let dropped = tag_set(cli.drop_tags.iter().map(String::as_str))
        .context("invalid --drop-tag value")?;
    let mode = if cli.append {
        WriterMode::Append
    } else {
        WriterMode::Overwrite
    };

    let mut reader = open_reader(&cli.input, cli.input_format.into())
        .with_context(|| format!("cannot open {}", cli.input.display()))?;
    let mut writer = open_writer(&cli.output, cli.output_format.into(), mode)
        .with_context(|| format!("cannot create {}", cli.output.display()))?;

    let mut removed = 0;
    while let Some(mut record) = reader
        .read()
        .with_context(|| format!("record {} of {}", reader.records_read() + 1, cli.input.display()))?
    {
        if !dropped.is_empty() {
            removed += record.filter_tags(&dropped);
        }
        writer.write(&record).with_context(|| {
            format!(
                "cannot write record {}",
                record.get_control_number().unwrap_or_default()
            )
        })?;
    }
    writer.finish()?;

    tracing::info!(
        read = reader.records_read(),
        written = writer.records_written(),
        fields_removed = removed,
        "conversion finished"
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(&cli) {
        eprintln!("marc_convert: {err:#}");
        std::process::exit(1);
    }
}
