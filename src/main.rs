use clap::builder::TypedValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vzip::archive::{pack_directory, PackOptions, DEFAULT_MAX_FRAME_SIZE, DEFAULT_OUTPUT};
use vzip::codec::CodecId;
use vzip::frames::DEFAULT_EXTENSION;
use vzip::pool::DEFAULT_WORKERS;
use vzip::PackError;

#[derive(Parser)]
#[command(name = "vzip", version, about = "Compress a directory of numbered frames into one ordered .vzip stream")]
struct Cli {
    /// Directory holding the numbered frame files
    input: PathBuf,
    /// Output stream
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Number of worker threads
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS,
          value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    workers: usize,
    /// Codec: zlib (default) or zstd
    #[arg(short, long, default_value = "zlib")]
    codec: String,
    /// Frame file extension, without the dot
    #[arg(short, long, default_value = DEFAULT_EXTENSION)]
    extension: String,
    /// Largest accepted frame, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let codec = CodecId::from_name(&cli.codec)
        .ok_or_else(|| format!("unknown codec '{}' (expected zlib or zstd)", cli.codec))?;
    let opts = PackOptions {
        codec,
        workers:        cli.workers,
        extension:      cli.extension,
        max_frame_size: cli.max_frame_size,
        output:         cli.output,
    };

    let report = pack_directory(&cli.input, &opts).map_err(|e| {
        log_failure(&e);
        e
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn log_failure(e: &PackError) {
    match e.ordinal() {
        Some(ordinal) => tracing::error!(kind = e.kind(), ordinal, "pack failed, no output written"),
        None          => tracing::error!(kind = e.kind(), "pack failed, no output written"),
    }
}
