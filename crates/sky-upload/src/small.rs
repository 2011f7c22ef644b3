use rand::rngs::OsRng;
use rand::RngCore;
use sky_crypto::{encrypt_preamble, FileKey, Skykey};
use sky_format::{encode_base_sector, encrypt_base_sector, sniff_content_type, CipherType, Layout, Metadata};
use sky_primitives::SkyError;

use crate::error::UploadResult;

/// Assembles a small file's base sector: no fanout, the whole file packed
/// inline after the metadata, encrypted in place when `skykey` is bound.
pub fn build_small_file_sector(filename: &str, content: &[u8], skykey: Option<&Skykey>) -> UploadResult<Vec<u8>> {
    let content_type = sniff_content_type(content);
    let metadata = Metadata::single_file_with_subfile(filename, content_type, content.len() as u64);
    build_sector_with_metadata(metadata, content, skykey)
}

/// Same assembly as [`build_small_file_sector`], but for a caller that has
/// already built the metadata (a directory upload's subfile table, with its
/// offsets, content types, and default-path fields already resolved).
pub fn build_sector_with_metadata(metadata: Metadata, content: &[u8], skykey: Option<&Skykey>) -> UploadResult<Vec<u8>> {
    let metadata_bytes = metadata.encode().map_err(|_| SkyError::MetadataTooBig {
        context: "build_sector_with_metadata",
    })?;

    let mut layout = Layout {
        file_size: content.len() as u64,
        metadata_size: metadata_bytes.len() as u32,
        fanout_size: 0,
        fanout_data_pieces: 1,
        fanout_parity_pieces: 0,
        cipher_type: CipherType::Plain,
        key_data: [0u8; 64],
    };

    let file_key = skykey.map(|_| {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        FileKey::new(bytes)
    });

    if let (Some(skykey), Some(file_key)) = (skykey, file_key.as_ref()) {
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        layout.cipher_type = CipherType::Aes256Ctr;
        layout.key_data = encrypt_preamble(skykey, file_key, nonce);
    }

    let mut sector = encode_base_sector(&layout, &[], &metadata_bytes, content).map_err(|_| SkyError::MetadataTooBig {
        context: "build_sector_with_metadata",
    })?;

    if let Some(file_key) = &file_key {
        encrypt_base_sector(&mut sector, file_key);
    }

    Ok(sector)
}

#[cfg(test)]
mod tests {
    use sky_format::{is_encrypted_base_sector, parse_base_sector};

    use super::*;

    #[test]
    fn plain_small_file_round_trips_through_parse() {
        let content = b"hello, skynet".to_vec();
        let sector = build_small_file_sector("hello.txt", &content, None).unwrap();
        assert!(!is_encrypted_base_sector(&sector));

        let parsed = parse_base_sector(&sector).unwrap();
        assert_eq!(parsed.layout.file_size, content.len() as u64);
        assert_eq!(&parsed.payload[..content.len()], content.as_slice());

        let metadata = Metadata::decode(&parsed.metadata_bytes).unwrap();
        assert_eq!(metadata.filename, "hello.txt");
        let subfile = metadata.for_path("hello.txt").unwrap();
        assert_eq!(subfile.content_type, "application/octet-stream");
    }

    #[test]
    fn keyed_small_file_is_flagged_encrypted() {
        let skykey = Skykey::new("default", [3u8; 32]);
        let content = vec![1u8; 100];
        let sector = build_small_file_sector("a.bin", &content, Some(&skykey)).unwrap();
        assert!(is_encrypted_base_sector(&sector));
    }
}
