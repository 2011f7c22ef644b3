use sky_primitives::SECTOR_SIZE;

use crate::error::{FormatError, FormatResult};

/// Fixed byte length of the layout header at the front of every base sector.
pub const LAYOUT_LEN: usize = 99;

const VERSION_OFFSET: usize = 0;
const FILE_SIZE_OFFSET: usize = 1;
const METADATA_SIZE_OFFSET: usize = 9;
const FANOUT_SIZE_OFFSET: usize = 13;
const FANOUT_DATA_PIECES_OFFSET: usize = 17;
const FANOUT_PARITY_PIECES_OFFSET: usize = 18;
const CIPHER_TYPE_OFFSET: usize = 19;
const KEY_DATA_OFFSET: usize = 20;
const KEY_DATA_LEN: usize = 64;
const RESERVED_OFFSET: usize = 84;
const RESERVED_LEN: usize = 15;

const LAYOUT_VERSION: u8 = 1;

/// How a base sector's body is keyed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CipherType {
    /// Not encrypted; `key_data` is unused.
    Plain,
    /// AES-256-CTR, keyed by the per-(chunk, piece) sector key in `key_data`.
    Aes256Ctr,
}

impl CipherType {
    fn to_byte(self) -> u8 {
        match self {
            CipherType::Plain => 0,
            CipherType::Aes256Ctr => 1,
        }
    }

    fn from_byte(b: u8) -> FormatResult<Self> {
        match b {
            0 => Ok(CipherType::Plain),
            1 => Ok(CipherType::Aes256Ctr),
            other => Err(FormatError::UnknownCipherType(other)),
        }
    }
}

/// The fixed-size header that opens every base sector: file size, the sizes
/// of the fanout and metadata sections that follow it, the fanout's erasure
/// parameters, and the cipher under which the rest of the sector is keyed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Layout {
    pub file_size: u64,
    pub metadata_size: u32,
    pub fanout_size: u32,
    pub fanout_data_pieces: u8,
    pub fanout_parity_pieces: u8,
    pub cipher_type: CipherType,
    /// 64 bytes of key material: the encrypted-preamble ciphertext when
    /// `cipher_type` is set, otherwise all zero.
    pub key_data: [u8; KEY_DATA_LEN],
}

impl Layout {
    /// How many piece roots each fanout chunk row actually stores.
    ///
    /// Normally `data + parity`, one per erasure-coded piece. When there's
    /// exactly one data piece and no parity, the chunk was never actually
    /// split by the erasure coder (`RsCoder` degenerates to identity in that
    /// case), so the single piece's root is written once instead of being
    /// duplicated.
    #[must_use]
    pub fn fanout_pieces_stored(&self) -> usize {
        if self.fanout_data_pieces == 1 && self.fanout_parity_pieces == 0 {
            1
        } else {
            self.fanout_data_pieces as usize + self.fanout_parity_pieces as usize
        }
    }

    pub fn encode(&self) -> FormatResult<[u8; LAYOUT_LEN]> {
        let total = u64::from(self.metadata_size) + u64::from(self.fanout_size) + LAYOUT_LEN as u64;
        if total > SECTOR_SIZE as u64 {
            return Err(FormatError::MetadataTooBig);
        }

        let mut out = [0u8; LAYOUT_LEN];
        out[VERSION_OFFSET] = LAYOUT_VERSION;
        out[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 8].copy_from_slice(&self.file_size.to_le_bytes());
        out[METADATA_SIZE_OFFSET..METADATA_SIZE_OFFSET + 4]
            .copy_from_slice(&self.metadata_size.to_le_bytes());
        out[FANOUT_SIZE_OFFSET..FANOUT_SIZE_OFFSET + 4]
            .copy_from_slice(&self.fanout_size.to_le_bytes());
        out[FANOUT_DATA_PIECES_OFFSET] = self.fanout_data_pieces;
        out[FANOUT_PARITY_PIECES_OFFSET] = self.fanout_parity_pieces;
        out[CIPHER_TYPE_OFFSET] = self.cipher_type.to_byte();
        out[KEY_DATA_OFFSET..KEY_DATA_OFFSET + KEY_DATA_LEN].copy_from_slice(&self.key_data);
        // out[RESERVED_OFFSET..] stays zero.
        let _ = RESERVED_LEN;

        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> FormatResult<Self> {
        if bytes.len() != LAYOUT_LEN {
            return Err(FormatError::MetadataTooBig);
        }
        let version = bytes[VERSION_OFFSET];
        if version != LAYOUT_VERSION {
            return Err(FormatError::UnknownLayoutVersion(version));
        }

        let file_size = u64::from_le_bytes(
            bytes[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 8]
                .try_into()
                .expect("slice is 8 bytes"),
        );
        let metadata_size = u32::from_le_bytes(
            bytes[METADATA_SIZE_OFFSET..METADATA_SIZE_OFFSET + 4]
                .try_into()
                .expect("slice is 4 bytes"),
        );
        let fanout_size = u32::from_le_bytes(
            bytes[FANOUT_SIZE_OFFSET..FANOUT_SIZE_OFFSET + 4]
                .try_into()
                .expect("slice is 4 bytes"),
        );
        let fanout_data_pieces = bytes[FANOUT_DATA_PIECES_OFFSET];
        let fanout_parity_pieces = bytes[FANOUT_PARITY_PIECES_OFFSET];
        let cipher_type = CipherType::from_byte(bytes[CIPHER_TYPE_OFFSET])?;

        let mut key_data = [0u8; KEY_DATA_LEN];
        key_data.copy_from_slice(&bytes[KEY_DATA_OFFSET..KEY_DATA_OFFSET + KEY_DATA_LEN]);

        let total = u64::from(metadata_size) + u64::from(fanout_size) + LAYOUT_LEN as u64;
        if total > SECTOR_SIZE as u64 {
            return Err(FormatError::MetadataTooBig);
        }

        Ok(Self {
            file_size,
            metadata_size,
            fanout_size,
            fanout_data_pieces,
            fanout_parity_pieces,
            cipher_type,
            key_data,
        })
    }
}
