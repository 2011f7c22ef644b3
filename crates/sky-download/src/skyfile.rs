use futures_util::stream::FuturesOrdered;
use futures_util::StreamExt;
use sky_crypto::{FileKey, Skykey};
use sky_erasure::RsCoder;
use sky_format::{decrypt_base_sector, is_encrypted_base_sector, parse_base_sector, Fanout, Layout, Metadata};
use sky_primitives::{Blocklist, Hash, RequestBudget, SkyError, SECTOR_SIZE};
use sky_worker::WorkerPool;
use tokio_util::sync::CancellationToken;

use crate::byroot::download_by_root;
use crate::chunk::fetch_and_reconstruct_chunk;
use crate::error::DownloadResult;
use crate::resolve::{resolve_to_file_skylink, RegistryLinkResolver};

/// A base sector's parsed header plus however much of its payload already
/// resolved: inline bytes for small files, or a fanout table to walk for
/// large ones.
pub struct SkyfileBaseSector {
    pub layout: Layout,
    pub metadata: Metadata,
    pub fanout: Option<Fanout>,
    pub inline_payload: Vec<u8>,
    pub file_key: Option<FileKey>,
}

/// The resolved bytes of one download, alongside the metadata needed to
/// interpret them (content type, subfile table).
pub struct SkyfileContents {
    pub metadata: Metadata,
    pub bytes: Vec<u8>,
}

/// Downloads and parses the base sector addressed by `root`, decrypting it
/// first if `known_skykeys` names the key it was wrapped under.
pub async fn fetch_base_sector(
    pool: &WorkerPool,
    blocklist: &dyn Blocklist,
    root: Hash,
    known_skykeys: &[Skykey],
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<SkyfileBaseSector> {
    let mut sector = download_by_root(pool, blocklist, root, 0, SECTOR_SIZE as u32, budget, cancel).await?;

    let file_key = if is_encrypted_base_sector(&sector) {
        decrypt_base_sector(&mut sector, known_skykeys).map_err(|_| SkyError::DecryptionFailed {
            context: "fetch_base_sector",
        })?
    } else {
        None
    };

    let parsed = parse_base_sector(&sector).map_err(|_| SkyError::InvalidSkylink {
        context: "fetch_base_sector",
    })?;
    let metadata = Metadata::decode(&parsed.metadata_bytes).map_err(|_| SkyError::InvalidSkylink {
        context: "fetch_base_sector",
    })?;

    let fanout = if parsed.layout.fanout_size == 0 {
        None
    } else {
        Some(
            Fanout::decode(&parsed.fanout_bytes, parsed.layout.fanout_pieces_stored()).map_err(|_| {
                SkyError::InvalidSkylink {
                    context: "fetch_base_sector",
                }
            })?,
        )
    };

    Ok(SkyfileBaseSector {
        layout: parsed.layout,
        metadata,
        fanout,
        inline_payload: parsed.payload,
        file_key,
    })
}

/// Resolves `[offset, offset + length)` of a base sector's logical payload,
/// fetching only the fanout chunks that intersect the range.
///
/// Chunks are dispatched concurrently but trimmed and concatenated in
/// order: fetches may complete out of order, bytes never are.
pub async fn download_payload_range(
    pool: &WorkerPool,
    blocklist: &dyn Blocklist,
    base: &SkyfileBaseSector,
    offset: u64,
    length: u64,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }

    let Some(fanout) = base.fanout.as_ref() else {
        let start = offset as usize;
        let end = start + length as usize;
        if end > base.inline_payload.len() {
            return Err(SkyError::InvalidPath {
                context: "download_payload_range",
            });
        }
        return Ok(base.inline_payload[start..end].to_vec());
    };

    let coder = RsCoder::new(
        base.layout.fanout_data_pieces as usize,
        base.layout.fanout_parity_pieces as usize,
    )
    .map_err(|_| SkyError::InvalidSkylink {
        context: "download_payload_range",
    })?;
    let chunk_len = coder.data_pieces() as u64 * SECTOR_SIZE as u64;
    let fanout_key = base.file_key.as_ref().map(FileKey::derive_fanout_key);

    let first_chunk = offset / chunk_len;
    let last_chunk = (offset + length - 1) / chunk_len;

    let mut pending = FuturesOrdered::new();
    for chunk_index in first_chunk..=last_chunk {
        let piece_roots = fanout.chunk(chunk_index as usize).ok_or(SkyError::InvalidSkylink {
            context: "download_payload_range",
        })?;
        let fanout_key = fanout_key.clone();
        pending.push_back(async move {
            fetch_and_reconstruct_chunk(
                pool,
                blocklist,
                fanout_key.as_ref(),
                &coder,
                chunk_index,
                piece_roots,
                budget,
                cancel,
            )
            .await
        });
    }

    let mut out = Vec::with_capacity(length as usize);
    let mut chunk_index = first_chunk;
    while let Some(result) = pending.next().await {
        let chunk_bytes = result?;
        let chunk_start = chunk_index * chunk_len;
        let range_start = offset.max(chunk_start) - chunk_start;
        let range_end = (offset + length).min(chunk_start + chunk_len) - chunk_start;
        out.extend_from_slice(&chunk_bytes[range_start as usize..range_end as usize]);
        chunk_index += 1;
    }

    Ok(out)
}

/// Downloads a skylink end to end: follows registry redirects, fetches and
/// decrypts the base sector, and resolves the skylink's encoded byte range.
///
/// `path` selects a subfile when the skyfile is a directory (root-relative,
/// `/` or `""` for the directory's default path); it's ignored for
/// single-file skyfiles and for an explicit byte-range skylink, which
/// already names its own range.
pub async fn download_skyfile(
    pool: &WorkerPool,
    blocklist: &dyn Blocklist,
    registry: Option<&dyn RegistryLinkResolver>,
    skylink: sky_format::Skylink,
    path: &str,
    known_skykeys: &[Skykey],
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<SkyfileContents> {
    let file_link = resolve_to_file_skylink(registry, skylink, budget, cancel).await?;
    let base = fetch_base_sector(
        pool,
        blocklist,
        file_link.merkle_root(),
        known_skykeys,
        budget,
        cancel,
    )
    .await?;

    // The canonical whole-file skylink always addresses the full base
    // sector (offset 0, SECTOR_SIZE bytes). For a small file the sector's
    // trailing bytes past the actual content are zero padding; for a large
    // file the fanout may span many chunks well past one sector. Either
    // way a whole-file download trims to the layout's recorded `file_size`
    // (or, for a directory, to `path`'s resolved subfile) rather than the
    // one-sector bound. Explicit byte-range skylinks are honored exactly.
    let (range_offset, range_length) = if file_link.offset() == 0 && file_link.fetch_size() == SECTOR_SIZE as u64 {
        if base.metadata.is_multi_file() {
            let subfile = base.metadata.for_path(path).map_err(|_| SkyError::InvalidPath {
                context: "download_skyfile",
            })?;
            (subfile.offset, subfile.len)
        } else {
            (0, base.layout.file_size)
        }
    } else {
        (file_link.offset(), file_link.fetch_size())
    };

    let bytes = download_payload_range(pool, blocklist, &base, range_offset, range_length, budget, cancel).await?;
    Ok(SkyfileContents {
        metadata: base.metadata,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sky_format::{encode_base_sector, CipherType, LAYOUT_LEN};
    use sky_primitives::{NoBlocklist, PublicKey};
    use sky_provider::client::memory::MemoryProvider;
    use sky_provider::{PriceTable, ProviderClient};

    use super::*;

    fn price() -> PriceTable {
        PriceTable {
            read_cost_per_byte: 1,
            write_cost_per_byte: 1,
            read_base_cost: 0,
            write_base_cost: 0,
            registry_read_cost: 0,
            registry_write_cost: 0,
        }
    }

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

    #[tokio::test]
    async fn small_file_downloads_the_inline_payload() {
        let provider = Arc::new(MemoryProvider::new(PublicKey::new([1u8; 32]), price()));
        let metadata = Metadata::single_file("hello.txt").encode().unwrap();
        let payload = b"hello, skynet".to_vec();
        let mut layout = plain_layout(0, metadata.len() as u32);
        layout.file_size = payload.len() as u64;
        let sector = encode_base_sector(&layout, &[], &metadata, &payload).unwrap();
        let root = provider.write_sector(&sector).await.unwrap();

        let pool = WorkerPool::new(vec![provider], 4);
        let contents = download_skyfile(
            &pool,
            &NoBlocklist,
            None,
            sky_format::Skylink::whole_sector(1, root).unwrap(),
            "/",
            &[],
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(contents.bytes, payload);
        assert_eq!(contents.metadata.filename, "hello.txt");
    }

    #[tokio::test]
    async fn directory_download_resolves_the_default_path_fallback() {
        use sky_format::SubfileMetadata;

        let provider = Arc::new(MemoryProvider::new(PublicKey::new([1u8; 32]), price()));
        let index = b"<h1>hi</h1>".to_vec();
        let about = b"about".to_vec();
        let mut payload = index.clone();
        payload.extend_from_slice(&about);

        let mut metadata = Metadata::single_file("site");
        metadata.subfiles.insert(
            "index.html".to_string(),
            SubfileMetadata {
                filename: "index.html".to_string(),
                content_type: "text/html".to_string(),
                offset: 0,
                len: index.len() as u64,
            },
        );
        metadata.subfiles.insert(
            "about.html".to_string(),
            SubfileMetadata {
                filename: "about.html".to_string(),
                content_type: "text/html".to_string(),
                offset: index.len() as u64,
                len: about.len() as u64,
            },
        );
        let metadata_bytes = metadata.encode().unwrap();

        let mut layout = plain_layout(0, metadata_bytes.len() as u32);
        layout.file_size = payload.len() as u64;
        let sector = encode_base_sector(&layout, &[], &metadata_bytes, &payload).unwrap();
        let root = provider.write_sector(&sector).await.unwrap();

        let pool = WorkerPool::new(vec![provider], 4);
        let contents = download_skyfile(
            &pool,
            &NoBlocklist,
            None,
            sky_format::Skylink::whole_sector(1, root).unwrap(),
            "/",
            &[],
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(contents.bytes, index);
    }

    #[tokio::test]
    async fn large_file_range_reassembles_across_a_chunk_boundary() {
        let provider = Arc::new(MemoryProvider::new(PublicKey::new([1u8; 32]), price()));

        let mut fanout = Fanout::new(1);
        let mut chunk_bytes = Vec::new();
        for fill in [7u8, 9u8] {
            let sector = vec![fill; SECTOR_SIZE];
            let root = provider.write_sector(&sector).await.unwrap();
            fanout.push_chunk(vec![root]).unwrap();
            chunk_bytes.push(sector);
        }
        let fanout_bytes = fanout.encode();

        let metadata = Metadata::single_file("movie.mkv").encode().unwrap();
        let mut layout = plain_layout(fanout_bytes.len() as u32, metadata.len() as u32);
        layout.file_size = 2 * SECTOR_SIZE as u64;
        let base_sector = encode_base_sector(&layout, &fanout_bytes, &metadata, &[]).unwrap();
        let base_root = provider.write_sector(&base_sector).await.unwrap();

        let pool = WorkerPool::new(vec![provider], 4);
        let base = fetch_base_sector(
            &pool,
            &NoBlocklist,
            base_root,
            &[],
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // Range spanning the boundary between the two chunks.
        let start = SECTOR_SIZE as u64 - 4;
        let len = 8u64;
        let bytes = download_payload_range(
            &pool,
            &NoBlocklist,
            &base,
            start,
            len,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let mut expected = chunk_bytes[0][SECTOR_SIZE - 4..].to_vec();
        expected.extend_from_slice(&chunk_bytes[1][..4]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn layout_len_constant_matches_header_offset() {
        assert_eq!(LAYOUT_LEN, 99);
    }
}
