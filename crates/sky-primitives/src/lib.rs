//! Shared identifiers, error taxonomy and budget types used across the
//! storage core's crates.

pub mod blocklist;
pub mod budget;
pub mod error;
pub mod hash;
pub mod identity;

pub use blocklist::{Blocklist, NoBlocklist};
pub use budget::{Cost, RequestBudget};
pub use error::{SkyError, SkyResult};
pub use hash::{sha256, Hash};
pub use identity::{PrivateKey, PublicKey};

/// The fixed sector size every provider stores and addresses by Merkle root.
pub const SECTOR_SIZE: usize = 4 * 1024 * 1024;

/// Byte length of a segment within a sector's Merkle tree.
pub const SEGMENT_SIZE: usize = 64;

/// Maximum bytes a registry entry's `data` field may hold.
pub const REGISTRY_DATA_SIZE: usize = 113;

/// Idle timeout after which an unreferenced resumable upload session is reaped.
pub const PRUNE_IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20 * 60);
