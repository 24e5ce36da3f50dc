//! Accepts uploaded bytes, materializes them on disk, and hands off to
//! `TaskStore`/`Scheduler` (spec §4.6).

pub mod error;
pub mod ingestor;
pub mod source;

pub use error::{IngestError, IngestResult};
pub use ingestor::{
    BatchItemOutcome, Ingestor, AUDIO_EXTENSIONS, DEFAULT_MAX_AUDIO_BYTES, DEFAULT_MAX_VIDEO_BYTES,
};
pub use source::{stream_to_file, ByteSource};
