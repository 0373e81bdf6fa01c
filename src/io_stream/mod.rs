//! Ordered output stream — writer and reader.
//!
//! # Writer
//! [`OrderedWriter`] accepts compressed frames from any number of worker
//! threads, in whatever order they finish, and appends them to one sink in
//! strict ordinal order.  It owns two pieces of shared state:
//!
//! - the *turn*: the next expected ordinal, guarded by a mutex and paired
//!   with a condition variable that is signalled every time it moves;
//! - the *sink*: the output handle and the byte totals, guarded by a second
//!   mutex.
//!
//! A committing thread waits on the turn without touching the sink lock,
//! claims the turn, appends its record under the sink lock, and then moves
//! the turn forward and wakes every waiter.  Only the thread holding the
//! current turn ever takes the sink lock, so records cannot interleave.
//!
//! A turn that never advances blocks its waiters forever.  [`OrderedWriter::abort`]
//! is the way out: it wakes every waiter with [`CommitError::Aborted`].
//!
//! # Reader
//! [`RecordReader`] walks a finished stream record by record.

use std::io::{self, Read, Write};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::block::{CompressedBlock, RecordHeader, RECORD_HEADER_SIZE};
use crate::frames::FIRST_ORDINAL;

/// Default write batching: 1 MiB.
pub const DEFAULT_WRITE_BUFFER: usize = 1024 * 1024;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("commit of frame {ordinal} abandoned: the job was aborted")]
    Aborted { ordinal: u64 },
    #[error("frame {ordinal} was already committed (next expected is {next})")]
    AlreadyCommitted { ordinal: u64, next: u64 },
    #[error("frame {ordinal}: {len}-byte payload does not fit the 4-byte length prefix")]
    RecordTooLarge { ordinal: u64, len: usize },
    #[error("output write failed: {0}")]
    Io(#[from] io::Error),
    #[error("ordered writer lock poisoned")]
    Poisoned,
}

// ── Totals ───────────────────────────────────────────────────────────────────

/// Byte counts accumulated by committed frames.
///
/// `bytes_out` counts compressed payload only; the stream on disk is
/// `bytes_out + 4 * frames` bytes long.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ByteTotals {
    pub frames:    u64,
    pub bytes_in:  u64,
    pub bytes_out: u64,
}

impl ByteTotals {
    pub fn stream_len(&self) -> u64 {
        self.bytes_out + self.frames * RECORD_HEADER_SIZE as u64
    }
}

// ── OrderedWriter ────────────────────────────────────────────────────────────

struct Turn {
    next:    u64,
    /// Set while the holder of `next` is appending its record.
    claimed: bool,
    aborted: bool,
}

struct Sink<W> {
    out:    W,
    totals: ByteTotals,
}

pub struct OrderedWriter<W: Write> {
    turn:         Mutex<Turn>,
    turn_changed: Condvar,
    sink:         Mutex<Sink<W>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, CommitError> {
    mutex.lock().map_err(|_| CommitError::Poisoned)
}

impl<W: Write> OrderedWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            turn: Mutex::new(Turn { next: FIRST_ORDINAL, claimed: false, aborted: false }),
            turn_changed: Condvar::new(),
            sink: Mutex::new(Sink { out, totals: ByteTotals::default() }),
        }
    }

    /// Append `block` once every lower ordinal has been appended.
    ///
    /// Blocks the calling thread until it is `block.ordinal`'s turn.  A write
    /// failure aborts the writer, so no later frame can be appended after a
    /// torn record.
    pub fn commit(&self, block: CompressedBlock) -> Result<(), CommitError> {
        self.wait_for_turn(block.ordinal)?;
        if let Err(e) = self.append(&block) {
            self.abort();
            return Err(e);
        }
        debug!(ordinal = block.ordinal, raw = block.raw_len, compressed = block.len(), "frame committed");
        self.advance(block.ordinal)
    }

    /// Block until `ordinal` is next, then claim the turn.
    pub fn wait_for_turn(&self, ordinal: u64) -> Result<(), CommitError> {
        let mut turn = lock(&self.turn)?;
        loop {
            if turn.aborted {
                return Err(CommitError::Aborted { ordinal });
            }
            if ordinal < turn.next || (ordinal == turn.next && turn.claimed) {
                return Err(CommitError::AlreadyCommitted { ordinal, next: turn.next });
            }
            if ordinal == turn.next {
                turn.claimed = true;
                return Ok(());
            }
            turn = self.turn_changed.wait(turn).map_err(|_| CommitError::Poisoned)?;
        }
    }

    fn append(&self, block: &CompressedBlock) -> Result<(), CommitError> {
        let header = RecordHeader::for_payload(block.len())
            .ok_or(CommitError::RecordTooLarge { ordinal: block.ordinal, len: block.len() })?;
        let mut sink = lock(&self.sink)?;
        header.write(&mut sink.out)?;
        sink.out.write_all(&block.bytes)?;
        sink.totals.frames    += 1;
        sink.totals.bytes_in  += block.raw_len as u64;
        sink.totals.bytes_out += block.len() as u64;
        Ok(())
    }

    /// Release the turn held by `ordinal` and wake every waiter.
    pub fn advance(&self, ordinal: u64) -> Result<(), CommitError> {
        let mut turn = lock(&self.turn)?;
        turn.next    = ordinal + 1;
        turn.claimed = false;
        drop(turn);
        self.turn_changed.notify_all();
        Ok(())
    }

    /// Fail every current and future commit with [`CommitError::Aborted`].
    pub fn abort(&self) {
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        turn.aborted = true;
        drop(turn);
        self.turn_changed.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner).aborted
    }

    pub fn next_expected(&self) -> u64 {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner).next
    }

    pub fn totals(&self) -> ByteTotals {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).totals
    }

    /// Hand back the sink and the final totals.
    pub fn finish(self) -> Result<(W, ByteTotals), CommitError> {
        let sink = self.sink.into_inner().map_err(|_| CommitError::Poisoned)?;
        Ok((sink.out, sink.totals))
    }
}

// ── Write buffer ─────────────────────────────────────────────────────────────

/// Buffered writer with a configurable flush threshold.
///
/// Batches each record's prefix and payload into large writes.  Unlike
/// `std::io::BufWriter` it exposes `bytes_written`, which the caller checks
/// against the committed totals.
pub struct WriteBuffer<W: Write> {
    inner:     W,
    buf:       Vec<u8>,
    capacity:  usize,
    pub bytes_written: u64,
}

impl<W: Write> WriteBuffer<W> {
    pub fn new(inner: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
            bytes_written: 0,
        }
    }

    /// Flush everything and return the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn flush_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<W: Write> Write for WriteBuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Large payloads bypass the buffer.
        if buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
            self.inner.write_all(buf)?;
        } else {
            self.buf.extend_from_slice(buf);
            self.flush_if_full()?;
        }
        self.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Iterates the compressed payloads of a `.vzip` stream, in order.
pub struct RecordReader<R: Read> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next payload, or `None` at a clean end of stream.
    pub fn next_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; RECORD_HEADER_SIZE];
        let mut filled = 0;
        while filled < prefix.len() {
            match self.inner.read(&mut prefix[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated record length prefix",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let header = RecordHeader::read(&prefix[..])?;
        // The prefix is untrusted: grow with the bytes actually present.
        let mut payload = Vec::new();
        (&mut self.inner).take(u64::from(header.length)).read_to_end(&mut payload)?;
        if payload.len() as u64 != u64::from(header.length) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated record: {} of {} payload bytes", payload.len(), header.length),
            ));
        }
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Split a complete stream into its payloads.
pub fn read_records(stream: &[u8]) -> io::Result<Vec<Vec<u8>>> {
    RecordReader::new(stream).collect()
}
