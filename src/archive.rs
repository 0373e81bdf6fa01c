//! High-level packing API — the primary embedding surface.
//!
//! ```no_run
//! use std::path::Path;
//! use vzip::archive::{pack_directory, PackOptions};
//!
//! let report = pack_directory(Path::new("frames"), &PackOptions::default())?;
//! println!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The output is staged in a hidden temporary file next to the destination
//! and renamed into place only after the last frame was committed.  A failed
//! job removes the staging file, so it never leaves a partial stream behind.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::codec::{get_codec, output_bound, Codec, CodecId};
use crate::error::PackError;
use crate::frames::{enumerate_frames, validate_sequence, FrameDescriptor, DEFAULT_EXTENSION};
use crate::io_stream::{ByteTotals, OrderedWriter, WriteBuffer, DEFAULT_WRITE_BUFFER};
use crate::pool::{WorkerPool, DEFAULT_WORKERS};
use crate::report::Report;

/// Output file name when none is configured.
pub const DEFAULT_OUTPUT: &str = "video.vzip";
/// Largest frame accepted by default: 64 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`pack_directory`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub codec:          CodecId,
    /// Worker slots; clamped to `1..=frame count`.
    pub workers:        usize,
    /// Frame file extension, without the dot.
    pub extension:      String,
    pub max_frame_size: usize,
    pub output:         PathBuf,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            codec:          CodecId::Zlib,
            workers:        DEFAULT_WORKERS,
            extension:      DEFAULT_EXTENSION.to_owned(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            output:         PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

// ── Packing ───────────────────────────────────────────────────────────────────

/// Compress every frame of `dir` into `opts.output`.
pub fn pack_directory(dir: &Path, opts: &PackOptions) -> Result<Report, PackError> {
    let started = Instant::now();

    let frames = enumerate_frames(dir, &opts.extension)?;
    validate_sequence(&frames)?;

    let codec = get_codec(opts.codec, output_bound(opts.max_frame_size));
    info!(
        dir = %dir.display(),
        frames = frames.len(),
        workers = opts.workers,
        codec = opts.codec.name(),
        "packing frames"
    );

    let totals = write_output(&frames, codec.as_ref(), opts)?;
    let report = Report::new(totals, started.elapsed());
    info!(
        output = %opts.output.display(),
        frames = report.frames,
        bytes_in = report.bytes_in,
        bytes_out = report.bytes_out,
        "pack complete"
    );
    Ok(report)
}

/// Compress `frames` into `out` with a pool of `workers` slots.
///
/// Returns the sink and the committed totals.  On error the sink holds an
/// incomplete stream and must be discarded.
pub fn pack_frames<W: Write + Send>(
    frames:         &[FrameDescriptor],
    codec:          &dyn Codec,
    workers:        usize,
    max_frame_size: usize,
    out:            W,
) -> Result<(W, ByteTotals), PackError> {
    let writer = OrderedWriter::new(out);
    let pool = WorkerPool::new(workers.min(frames.len()).max(1))?;
    debug!(workers = pool.workers(), requested = workers, frames = frames.len(), "worker pool ready");
    pool.run(frames, codec, max_frame_size, &writer)?;
    finish_writer(writer)
}

fn finish_writer<W: Write>(writer: OrderedWriter<W>) -> Result<(W, ByteTotals), PackError> {
    writer.finish().map_err(|source| PackError::Writer { source })
}

fn write_output(
    frames: &[FrameDescriptor],
    codec:  &dyn Codec,
    opts:   &PackOptions,
) -> Result<ByteTotals, PackError> {
    let output_error = |source| PackError::Output { path: opts.output.clone(), source };

    let parent = match opts.output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staging = Builder::new()
        .prefix(".vzip-")
        .suffix(".partial")
        .tempfile_in(parent)
        .map_err(output_error)?;
    let file = staging.as_file().try_clone().map_err(output_error)?;

    let sink = WriteBuffer::new(file, DEFAULT_WRITE_BUFFER);
    let (sink, totals) = match pack_frames(frames, codec, opts.workers, opts.max_frame_size, sink) {
        Ok(done) => done,
        Err(e) => {
            warn!(staging = %staging.path().display(), "discarding incomplete output");
            return Err(e);
        }
    };

    let written = sink.bytes_written;
    let file = sink.into_inner().map_err(output_error)?;
    file.sync_all().map_err(output_error)?;
    if written != totals.stream_len() {
        return Err(output_error(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("wrote {written} bytes, expected {}", totals.stream_len()),
        )));
    }

    staging.persist(&opts.output).map_err(|e| output_error(e.error))?;
    Ok(totals)
}
