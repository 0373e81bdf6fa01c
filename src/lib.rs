pub mod codec;
pub mod frames;
pub mod block;
pub mod io_stream;
pub mod pool;
pub mod report;
pub mod error;
pub mod archive;

pub use codec::{CodecId, get_codec};
pub use frames::{FrameDescriptor, enumerate_frames, validate_sequence};
pub use io_stream::{OrderedWriter, RecordReader, ByteTotals};
pub use pool::WorkerPool;
pub use report::Report;
pub use error::PackError;
pub use archive::{PackOptions, pack_directory};
