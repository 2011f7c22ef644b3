//! The download-by-root primitive and the skyfile download state machine:
//! fetching a base sector, decoding its fanout, racing workers for each
//! chunk's pieces, and reassembling the requested byte range in order.

pub mod byroot;
pub mod chunk;
pub mod error;
pub mod resolve;
pub mod skyfile;

pub use byroot::download_by_root;
pub use chunk::fetch_and_reconstruct_chunk;
pub use error::DownloadResult;
pub use resolve::{resolve_to_file_skylink, RegistryLinkResolver};
pub use skyfile::{download_payload_range, download_skyfile, fetch_base_sector, SkyfileBaseSector, SkyfileContents};
