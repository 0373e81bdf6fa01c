//! End-of-job summary: byte totals, compression ratio and elapsed time.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::io_stream::ByteTotals;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub frames:    u64,
    pub bytes_in:  u64,
    pub bytes_out: u64,
    /// `None` when no input bytes were read.
    pub ratio:     Option<f64>,
    pub elapsed_secs: f64,
}

impl Report {
    pub fn new(totals: ByteTotals, elapsed: Duration) -> Self {
        Self {
            frames:    totals.frames,
            bytes_in:  totals.bytes_in,
            bytes_out: totals.bytes_out,
            ratio:     compression_ratio(totals.bytes_in, totals.bytes_out),
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Space saved, in percent: `100 * (in - out) / in`.
///
/// Negative when the output grew.  `None` for `bytes_in == 0`.
pub fn compression_ratio(bytes_in: u64, bytes_out: u64) -> Option<f64> {
    if bytes_in == 0 {
        return None;
    }
    Some(100.0 * (bytes_in as f64 - bytes_out as f64) / bytes_in as f64)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ratio {
            Some(ratio) => writeln!(f, "Compression rate: {ratio:.2}%")?,
            None        => writeln!(f, "Compression rate: n/a")?,
        }
        write!(f, "Time: {:.2} seconds", self.elapsed_secs)
    }
}
