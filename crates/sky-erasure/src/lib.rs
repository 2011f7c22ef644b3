//! Chunk erasure coding and sector Merkle trees.

pub mod merkle;
pub mod rs;

pub use merkle::{sector_root, verify_sector};
pub use rs::{ErasureError, RsCoder};
