use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

use crate::kdf::SectorKey;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Sector encryption reserves no trailing tag: integrity comes from the
/// sector's Merkle root, not from AEAD authentication, which is what makes
/// segment-aligned partial decryption possible.
pub const CIPHER_OVERHEAD: usize = 0;

/// Each `SectorKey` is used to encrypt exactly one sector, so a fixed
/// all-zero IV never repeats a (key, counter) pair.
const ZERO_IV: [u8; 16] = [0u8; 16];

/// Encrypts an entire sector in place under its derived key.
pub fn encrypt_sector_in_place(key: &SectorKey, sector: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), &ZERO_IV.into());
    cipher.apply_keystream(sector);
}

/// Decrypts `sector[byte_offset..]` in place, seeking the counter so that
/// segments fully inside a requested range can be decrypted without
/// touching the bytes before `byte_offset`.
///
/// `byte_offset` must fall on a [`sky_primitives::SEGMENT_SIZE`] boundary.
pub fn decrypt_in_place(key: &SectorKey, sector: &mut [u8], byte_offset: usize) {
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), &ZERO_IV.into());
    cipher
        .try_seek(byte_offset as u64)
        .expect("byte_offset is within a single sector's u32 address space");
    cipher.apply_keystream(sector);
}
