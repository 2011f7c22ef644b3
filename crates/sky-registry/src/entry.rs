use sky_primitives::{sha256, Hash, PrivateKey, PublicKey, SkyError, REGISTRY_DATA_SIZE};

use crate::error::RegistryResult;

/// Wire length of everything but the variable-length `data` field:
/// `data_key(32) || revision(8) || data_len(1) || type(1) || signature(64)`.
const FIXED_LEN: usize = 32 + 8 + 1 + 1 + 64;

/// Whether an entry is the canonical value for its key or a secondary one
/// (e.g. a previous revision kept around for history). Only affects the
/// final tiebreak in the conflict-resolution total order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryType {
    Primary,
    NonPrimary,
}

impl EntryType {
    fn to_byte(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::NonPrimary => 1,
        }
    }

    fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Primary
        } else {
            Self::NonPrimary
        }
    }
}

/// A signed, revision-numbered key-value record. `data_key` plus the owning
/// [`PublicKey`] form the registry key; `data` is opaque to the registry
/// itself (the core interprets it, e.g. as an encoded [`sky_format::Skylink`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    pub data_key: Hash,
    pub data: Vec<u8>,
    pub revision: u64,
    pub entry_type: EntryType,
    pub signature: [u8; 64],
}

impl RegistryEntry {
    /// Signs and builds a new entry. Fails if `data` exceeds [`REGISTRY_DATA_SIZE`].
    pub fn sign(
        signer: &PrivateKey,
        data_key: Hash,
        data: Vec<u8>,
        revision: u64,
        entry_type: EntryType,
    ) -> RegistryResult<Self> {
        if data.len() > REGISTRY_DATA_SIZE {
            return Err(SkyError::DataTooLarge {
                context: "RegistryEntry::sign",
            });
        }
        let preimage_hash = signing_hash(data_key, &data, revision, entry_type);
        let signature = signer.sign(preimage_hash.as_bytes());
        Ok(Self {
            data_key,
            data,
            revision,
            entry_type,
            signature,
        })
    }

    /// Verifies the signature under `owner`.
    #[must_use]
    pub fn verify(&self, owner: &PublicKey) -> bool {
        let preimage_hash = signing_hash(self.data_key, &self.data, self.revision, self.entry_type);
        owner.verify(preimage_hash.as_bytes(), &self.signature)
    }

    /// `hash(public_key || data_key || signature)`, the proof-of-work
    /// tiebreak value. Lower wins.
    #[must_use]
    pub fn work(&self, owner: PublicKey) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(32 + 32 + 64);
        preimage.extend_from_slice(owner.as_slice());
        preimage.extend_from_slice(self.data_key.as_bytes());
        preimage.extend_from_slice(&self.signature);
        sha256(&preimage).as_work()
    }

    /// `data_key(32) || revision(8, LE) || data_len(1) || data || type(1) || signature(64)`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_LEN + self.data.len());
        out.extend_from_slice(self.data_key.as_bytes());
        out.extend_from_slice(&self.revision.to_le_bytes());
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        out.push(self.entry_type.to_byte());
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> RegistryResult<Self> {
        if bytes.len() < FIXED_LEN {
            return Err(SkyError::InvalidPath {
                context: "RegistryEntry::decode",
            });
        }
        let mut data_key_bytes = [0u8; 32];
        data_key_bytes.copy_from_slice(&bytes[0..32]);
        let data_key = Hash::new(data_key_bytes);

        let mut revision_bytes = [0u8; 8];
        revision_bytes.copy_from_slice(&bytes[32..40]);
        let revision = u64::from_le_bytes(revision_bytes);

        let data_len = bytes[40] as usize;
        if data_len > REGISTRY_DATA_SIZE || bytes.len() != FIXED_LEN + data_len {
            return Err(SkyError::DataTooLarge {
                context: "RegistryEntry::decode",
            });
        }
        let data = bytes[41..41 + data_len].to_vec();
        let entry_type = EntryType::from_byte(bytes[41 + data_len]);

        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[42 + data_len..42 + data_len + 64]);

        Ok(Self {
            data_key,
            data,
            revision,
            entry_type,
            signature,
        })
    }

    /// Whether `self` beats `other` on the same `(owner, data_key)` under the
    /// registry's total order: higher revision, then lower proof-of-work,
    /// then primary over non-primary.
    #[must_use]
    pub fn dominates(&self, other: &Self, owner: PublicKey) -> bool {
        if self.revision != other.revision {
            return self.revision > other.revision;
        }
        let self_work = self.work(owner);
        let other_work = other.work(owner);
        if self_work != other_work {
            return self_work < other_work;
        }
        self.entry_type == EntryType::Primary && other.entry_type != EntryType::Primary
    }
}

fn signing_hash(data_key: Hash, data: &[u8], revision: u64, entry_type: EntryType) -> Hash {
    let mut preimage = Vec::with_capacity(32 + data.len() + 8 + 1);
    preimage.extend_from_slice(data_key.as_bytes());
    preimage.extend_from_slice(data);
    preimage.extend_from_slice(&revision.to_le_bytes());
    preimage.push(entry_type.to_byte());
    sha256(&preimage)
}
