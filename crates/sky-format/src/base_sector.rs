use sky_crypto::{
    decrypt_in_place, decrypt_preamble, encrypt_sector_in_place, CryptoError, FileKey, Skykey, PREAMBLE_LEN,
};
use sky_primitives::SECTOR_SIZE;

use crate::error::{FormatError, FormatResult};
use crate::layout::{CipherType, Layout, LAYOUT_LEN};

/// A parsed base sector: the fixed header plus views into the fanout,
/// metadata and inline-payload regions that follow it.
pub struct BaseSector {
    pub layout: Layout,
    pub fanout_bytes: Vec<u8>,
    pub metadata_bytes: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Assembles a full `SECTOR_SIZE` base sector from its sections. `payload` is
/// the small-file content or skyfile body that fits directly after the
/// fanout and metadata; zero-filled for large files, whose content lives in
/// fanout chunks instead.
pub fn encode_base_sector(
    layout: &Layout,
    fanout_bytes: &[u8],
    metadata_bytes: &[u8],
    payload: &[u8],
) -> FormatResult<Vec<u8>> {
    if layout.fanout_size as usize != fanout_bytes.len() {
        return Err(FormatError::MisalignedFanout);
    }
    if layout.metadata_size as usize != metadata_bytes.len() {
        return Err(FormatError::MetadataTooBig);
    }

    let header_len = LAYOUT_LEN + fanout_bytes.len() + metadata_bytes.len();
    if header_len + payload.len() > SECTOR_SIZE {
        return Err(FormatError::MetadataTooBig);
    }

    let mut sector = vec![0u8; SECTOR_SIZE];

    sector[..LAYOUT_LEN].copy_from_slice(&layout.encode()?);
    sector[LAYOUT_LEN..LAYOUT_LEN + fanout_bytes.len()].copy_from_slice(fanout_bytes);
    let metadata_start = LAYOUT_LEN + fanout_bytes.len();
    sector[metadata_start..metadata_start + metadata_bytes.len()].copy_from_slice(metadata_bytes);
    let payload_start = metadata_start + metadata_bytes.len();
    sector[payload_start..payload_start + payload.len()].copy_from_slice(payload);

    Ok(sector)
}

pub fn parse_base_sector(sector: &[u8]) -> FormatResult<BaseSector> {
    if sector.len() != SECTOR_SIZE {
        return Err(FormatError::MetadataTooBig);
    }

    let layout = Layout::decode(&sector[..LAYOUT_LEN])?;

    let fanout_start = LAYOUT_LEN;
    let fanout_end = fanout_start + layout.fanout_size as usize;
    let metadata_end = fanout_end + layout.metadata_size as usize;
    if metadata_end > SECTOR_SIZE {
        return Err(FormatError::MetadataTooBig);
    }

    Ok(BaseSector {
        fanout_bytes: sector[fanout_start..fanout_end].to_vec(),
        metadata_bytes: sector[fanout_end..metadata_end].to_vec(),
        payload: sector[metadata_end..].to_vec(),
        layout,
    })
}

#[must_use]
pub fn is_encrypted_base_sector(sector: &[u8]) -> bool {
    if sector.len() < LAYOUT_LEN {
        return false;
    }
    matches!(
        Layout::decode(&sector[..LAYOUT_LEN]),
        Ok(l) if l.cipher_type != CipherType::Plain
    )
}

/// Decrypts an encrypted base sector's body in place, returning the file's
/// master key on success so the caller can derive further fanout-chunk
/// sector keys. Returns `None` for an already-plain sector.
///
/// The layout header stays in the clear (it must, to locate the cipher type
/// and the preamble that names the key); everything from byte [`LAYOUT_LEN`]
/// onward is encrypted under the sector key derived from the file key
/// wrapped in `layout.key_data`.
pub fn decrypt_base_sector(
    sector: &mut [u8],
    known_skykeys: &[Skykey],
) -> Result<Option<FileKey>, CryptoError> {
    let layout = Layout::decode(&sector[..LAYOUT_LEN]).map_err(|_| CryptoError::PreambleAuthFailed)?;
    if layout.cipher_type == CipherType::Plain {
        return Ok(None);
    }

    let preamble: [u8; PREAMBLE_LEN] = layout.key_data;
    let file_key = decrypt_preamble(&preamble, known_skykeys)?;
    let sector_key = file_key.derive_fanout_key().derive_sector_key(0, 0);

    decrypt_in_place(&sector_key, &mut sector[LAYOUT_LEN..], 0);
    Ok(Some(file_key))
}

/// Encrypts an assembled base sector's body in place under `file_key`.
///
/// The caller must have already encoded the layout header with
/// `cipher_type: Aes256Ctr` and `key_data` set to the preamble wrapping
/// `file_key`; this only keys the body, mirroring [`decrypt_base_sector`].
pub fn encrypt_base_sector(sector: &mut [u8], file_key: &FileKey) {
    let sector_key = file_key.derive_fanout_key().derive_sector_key(0, 0);
    encrypt_sector_in_place(&sector_key, &mut sector[LAYOUT_LEN..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_crypto::{encrypt_preamble, encrypt_sector_in_place, FileKey, Skykey};

    fn plain_layout(fanout_size: u32, metadata_size: u32) -> Layout {
        Layout {
            file_size: 0,
            metadata_size,
            fanout_size,
            fanout_data_pieces: 1,
            fanout_parity_pieces: 0,
            cipher_type: CipherType::Plain,
            key_data: [0u8; 64],
        }
    }

    #[test]
    fn encode_then_parse_round_trips_sections() {
        let fanout = vec![1u8; 64];
        let metadata = vec![2u8; 32];
        let payload = vec![3u8; 128];
        let layout = plain_layout(fanout.len() as u32, metadata.len() as u32);

        let sector = encode_base_sector(&layout, &fanout, &metadata, &payload).unwrap();
        assert_eq!(sector.len(), SECTOR_SIZE);

        let parsed = parse_base_sector(sector.as_slice()).unwrap();
        assert_eq!(parsed.fanout_bytes, fanout);
        assert_eq!(parsed.metadata_bytes, metadata);
        assert_eq!(&parsed.payload[..payload.len()], payload.as_slice());
    }

    #[test]
    fn oversized_sections_are_rejected() {
        let layout = plain_layout(0, 0);
        let payload = vec![0u8; SECTOR_SIZE + 1 - LAYOUT_LEN];
        assert!(encode_base_sector(&layout, &[], &[], &payload).is_err());
    }

    #[test]
    fn plain_sector_is_not_flagged_encrypted() {
        let layout = plain_layout(0, 0);
        let sector = encode_base_sector(&layout, &[], &[], &[]).unwrap();
        assert!(!is_encrypted_base_sector(sector.as_slice()));
    }

    #[test]
    fn encrypted_sector_round_trips_through_decrypt() {
        let skykey = Skykey::new("default", [1u8; 32]);
        let file_key = FileKey::new([2u8; 32]);
        let preamble = encrypt_preamble(&skykey, &file_key, [0u8; 12]);

        let mut layout = plain_layout(0, 16);
        layout.cipher_type = CipherType::Aes256Ctr;
        layout.key_data = preamble;

        let metadata = vec![9u8; 16];
        let mut sector = encode_base_sector(&layout, &[], &metadata, &[]).unwrap();

        let sector_key = file_key.derive_fanout_key().derive_sector_key(0, 0);
        encrypt_sector_in_place(&sector_key, &mut sector[LAYOUT_LEN..]);

        assert!(is_encrypted_base_sector(sector.as_slice()));

        let recovered = decrypt_base_sector(&mut sector[..], std::slice::from_ref(&skykey))
            .unwrap()
            .expect("sector was encrypted");
        assert_eq!(recovered.as_bytes(), file_key.as_bytes());
        let parsed = parse_base_sector(sector.as_slice()).unwrap();
        assert_eq!(parsed.metadata_bytes, metadata);
    }

    #[test]
    fn plain_sector_decrypt_returns_none() {
        let layout = plain_layout(0, 0);
        let mut sector = encode_base_sector(&layout, &[], &[], &[]).unwrap();
        assert!(decrypt_base_sector(&mut sector[..], &[]).unwrap().is_none());
    }

    #[test]
    fn encrypt_base_sector_round_trips_through_decrypt() {
        let skykey = Skykey::new("default", [4u8; 32]);
        let file_key = FileKey::new([5u8; 32]);
        let preamble = encrypt_preamble(&skykey, &file_key, [0u8; 12]);

        let mut layout = plain_layout(0, 13);
        layout.cipher_type = CipherType::Aes256Ctr;
        layout.key_data = preamble;

        let metadata = b"hello, world!".to_vec();
        let payload = vec![6u8; 50];
        let mut sector = encode_base_sector(&layout, &[], &metadata, &payload).unwrap();

        encrypt_base_sector(&mut sector, &file_key);
        assert!(is_encrypted_base_sector(&sector));

        let recovered = decrypt_base_sector(&mut sector, std::slice::from_ref(&skykey))
            .unwrap()
            .expect("sector was encrypted");
        assert_eq!(recovered.as_bytes(), file_key.as_bytes());

        let parsed = parse_base_sector(&sector).unwrap();
        assert_eq!(parsed.metadata_bytes, metadata);
        assert_eq!(&parsed.payload[..payload.len()], payload.as_slice());
    }
}
