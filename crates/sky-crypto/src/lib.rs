//! Encryption envelope and key derivation for skyfiles.
//!
//! `kdf` derives the per-chunk/per-piece sector keys from a file's master
//! key; `envelope` wraps/unwraps that master key under a named skykey for
//! the base sector's preamble; `stream_cipher` does the actual sector
//! encryption with a segment-addressable counter-mode cipher so that range
//! downloads never need to decrypt a whole sector.

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod stream_cipher;

pub use envelope::{decrypt_preamble, encrypt_preamble, PREAMBLE_LEN};
pub use error::CryptoError;
pub use kdf::{FanoutKey, FileKey, SectorKey, Skykey};
pub use stream_cipher::{decrypt_in_place, encrypt_sector_in_place, CIPHER_OVERHEAD};
