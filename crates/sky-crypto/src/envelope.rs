use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::kdf::{FileKey, Skykey};

/// Length of the base sector's encrypted preamble: the first 64 bytes of
/// every encrypted base sector. Layout: `skykey_id(4) || nonce(12) ||
/// aes_256_gcm(file_key)(48)`.
pub const PREAMBLE_LEN: usize = 64;

const NONCE_LEN: usize = 12;

/// Wraps a file's master key under a skykey, producing the base sector's
/// 64-byte encrypted preamble.
pub fn encrypt_preamble(
    skykey: &Skykey,
    file_key: &FileKey,
    nonce: [u8; NONCE_LEN],
) -> [u8; PREAMBLE_LEN] {
    let cipher = Aes256Gcm::new_from_slice(skykey.as_bytes()).expect("key is 32 bytes");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), file_key.as_bytes().as_slice())
        .expect("32-byte plaintext always fits a GCM buffer");

    let mut preamble = [0u8; PREAMBLE_LEN];
    preamble[..4].copy_from_slice(&skykey.id());
    preamble[4..16].copy_from_slice(&nonce);
    preamble[16..].copy_from_slice(&ciphertext);
    preamble
}

/// Resolves the skykey by id match and returns the derived per-file key.
pub fn decrypt_preamble(
    preamble: &[u8; PREAMBLE_LEN],
    known_skykeys: &[Skykey],
) -> Result<FileKey, CryptoError> {
    let id: [u8; 4] = preamble[..4].try_into().expect("slice is 4 bytes");
    let nonce: [u8; NONCE_LEN] = preamble[4..16].try_into().expect("slice is 12 bytes");
    let ciphertext = &preamble[16..];

    let skykey = known_skykeys
        .iter()
        .find(|k| k.id() == id)
        .ok_or(CryptoError::UnknownSkykey)?;

    let cipher = Aes256Gcm::new_from_slice(skykey.as_bytes()).expect("key is 32 bytes");
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| CryptoError::PreambleAuthFailed)?;

    let bytes: [u8; 32] = plaintext
        .try_into()
        .map_err(|_| CryptoError::PreambleAuthFailed)?;
    Ok(FileKey::new(bytes))
}
