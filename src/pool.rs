//! Fixed-size worker pool.
//!
//! The pool owns exactly `P` threads and runs one *slot* on each of them via
//! [`rayon::ThreadPool::broadcast`].  Slot `s` (0-indexed) takes the frames at
//! positions `s, s+P, s+2P, …` and handles them one at a time:
//! read → compress → commit.  A slot starts its next frame only after the
//! previous commit returned, so at most `P` frames are in flight and each
//! slot reuses a single working buffer.
//!
//! The first failing frame aborts the [`OrderedWriter`]; slots blocked on
//! their turn wake up with an abort error and every other slot stops before
//! reading its next frame.

use std::fs::File;
use std::io::{Read, Write};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use crate::block::encode_block;
use crate::codec::Codec;
use crate::error::PackError;
use crate::frames::FrameDescriptor;
use crate::io_stream::OrderedWriter;

/// Worker count when none is configured.
pub const DEFAULT_WORKERS: usize = 8;

pub struct WorkerPool {
    pool:    ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, PackError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|slot| format!("vzip-worker-{slot}"))
            .build()
            .map_err(|e| PackError::Pool(e.to_string()))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compress `frames` and commit them to `writer` in order.
    ///
    /// On failure the writer is left aborted and the error of the lowest
    /// failing frame is returned.
    pub fn run<W: Write + Send>(
        &self,
        frames:         &[FrameDescriptor],
        codec:          &dyn Codec,
        max_frame_size: usize,
        writer:         &OrderedWriter<W>,
    ) -> Result<(), PackError> {
        let results = self.pool.broadcast(|ctx| {
            let _guard = AbortOnPanic(writer);
            self.drive_slot(ctx.index(), frames, codec, max_frame_size, writer)
        });
        first_failure(results)
    }

    fn drive_slot<W: Write>(
        &self,
        slot:           usize,
        frames:         &[FrameDescriptor],
        codec:          &dyn Codec,
        max_frame_size: usize,
        writer:         &OrderedWriter<W>,
    ) -> Result<(), PackError> {
        let mut buffer = Vec::new();
        for frame in frames.iter().skip(slot).step_by(self.workers) {
            if writer.is_aborted() {
                break;
            }
            if let Err(e) = process_frame(frame, &mut buffer, codec, max_frame_size, writer) {
                if !e.is_secondary() {
                    error!(ordinal = frame.ordinal, kind = e.kind(), error = %e, "frame failed, aborting job");
                }
                writer.abort();
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Aborts the writer if its slot unwinds, so the other slots stop waiting
/// and `broadcast` can return to re-raise the panic.
struct AbortOnPanic<'a, W: Write>(&'a OrderedWriter<W>);

impl<W: Write> Drop for AbortOnPanic<'_, W> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("worker slot panicked, aborting job");
            self.0.abort();
        }
    }
}

fn process_frame<W: Write>(
    frame:          &FrameDescriptor,
    buffer:         &mut Vec<u8>,
    codec:          &dyn Codec,
    max_frame_size: usize,
    writer:         &OrderedWriter<W>,
) -> Result<(), PackError> {
    read_frame(frame, max_frame_size, buffer)?;
    let block = encode_block(frame.ordinal, buffer, codec)
        .map_err(|source| PackError::Codec { ordinal: frame.ordinal, source })?;
    writer
        .commit(block)
        .map_err(|source| PackError::Commit { ordinal: frame.ordinal, source })
}

/// Read `frame` into `buffer`, replacing its contents.
pub fn read_frame(frame: &FrameDescriptor, limit: usize, buffer: &mut Vec<u8>) -> Result<(), PackError> {
    let read_error = |source| PackError::Read {
        ordinal: frame.ordinal,
        path:    frame.path.clone(),
        source,
    };
    let too_large = |size| PackError::FrameTooLarge {
        ordinal: frame.ordinal,
        path:    frame.path.clone(),
        size,
        limit,
    };

    let file = File::open(&frame.path).map_err(read_error)?;
    let size = file.metadata().map_err(read_error)?.len();
    if size > limit as u64 {
        return Err(too_large(size));
    }

    buffer.clear();
    buffer
        .try_reserve_exact(size as usize)
        .map_err(|_| PackError::Allocation { ordinal: frame.ordinal, size: size as usize })?;
    // The file may grow after the metadata call; never read past the limit.
    file.take(limit as u64 + 1).read_to_end(buffer).map_err(read_error)?;
    if buffer.len() > limit {
        return Err(too_large(buffer.len() as u64));
    }
    Ok(())
}

/// Pick the error that explains the failure: primary errors before
/// abort notifications, lowest ordinal first.
fn first_failure(results: Vec<Result<(), PackError>>) -> Result<(), PackError> {
    let mut failures: Vec<PackError> = results.into_iter().filter_map(Result::err).collect();
    failures.sort_by_key(|e| (e.is_secondary(), e.ordinal().unwrap_or(u64::MAX)));
    match failures.into_iter().next() {
        Some(e) => Err(e),
        None    => Ok(()),
    }
}
