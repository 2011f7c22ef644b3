use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// The 32-byte master key stored in a skyfile's layout.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey([u8; 32]);

impl FileKey {
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `fanout_key = KDF(master_key, "fanout")`.
    #[must_use]
    pub fn derive_fanout_key(&self) -> FanoutKey {
        FanoutKey(expand(&self.0, b"fanout"))
    }
}

/// A symmetric key bound by name/id, used to wrap a file's master key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Skykey {
    #[zeroize(skip)]
    id: [u8; 4],
    #[zeroize(skip)]
    name: String,
    key: [u8; 32],
}

impl Skykey {
    #[must_use]
    pub fn new(name: impl Into<String>, key: [u8; 32]) -> Self {
        let name = name.into();
        let id = derive_skykey_id(&key, &name);
        Self { id, name, key }
    }

    #[must_use]
    pub fn id(&self) -> [u8; 4] {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Derives a stable, short identifier for a skykey so preambles can name
/// which key was used without leaking key material.
fn derive_skykey_id(key: &[u8; 32], name: &str) -> [u8; 4] {
    let digest = expand_variable(key, name.as_bytes(), 4);
    let mut id = [0u8; 4];
    id.copy_from_slice(&digest);
    id
}

/// Derives the per-(chunk, piece) [`SectorKey`] for one erasure-coded sector.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FanoutKey([u8; 32]);

impl FanoutKey {
    #[must_use]
    pub fn derive_sector_key(&self, chunk_index: u64, piece_index: u8) -> SectorKey {
        let mut info = [0u8; 9];
        info[..8].copy_from_slice(&chunk_index.to_le_bytes());
        info[8] = piece_index;
        SectorKey(expand(&self.0, &info))
    }
}

/// The per-(chunk, piece) key that encrypts one erasure-coded sector.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SectorKey([u8; 32]);

impl SectorKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn expand(ikm: &[u8; 32], info: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&expand_variable(ikm, info, 32));
    out
}

fn expand_variable(ikm: &[u8], info: &[u8], len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = vec![0u8; len];
    hk.expand(info, &mut out)
        .map_err(|_| CryptoError::DerivationFailed)
        .expect("len is within HKDF-SHA256's 255*32 byte limit");
    out
}
