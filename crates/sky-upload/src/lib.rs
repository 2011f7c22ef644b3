//! The upload engine: size classification, erasure-coding and encryption of
//! large-file chunks, write-quorum dispatch to providers, and bookkeeping
//! for resumable upload sessions.

pub mod dispatch;
pub mod error;
pub mod large;
pub mod session;
pub mod skyfile;
pub mod small;

pub use dispatch::write_sector_to_quorum;
pub use error::UploadResult;
pub use large::{chunk_roots_locally, upload_chunk};
pub use session::{CommittedChunk, SessionRegistry, UploadSession};
pub use skyfile::{upload_skyfile, PathBinder, SubfileInput, UploadOutcome, UploadParams};
pub use small::{build_sector_with_metadata, build_small_file_sector};
