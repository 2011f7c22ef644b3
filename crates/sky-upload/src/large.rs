use std::sync::Arc;

use futures_util::future::try_join_all;
use sky_crypto::{encrypt_sector_in_place, FanoutKey};
use sky_erasure::{sector_root, RsCoder};
use sky_primitives::{Blocklist, Hash, RequestBudget, SECTOR_SIZE};
use sky_provider::ProviderClient;
use tokio_util::sync::CancellationToken;

use crate::dispatch::write_sector_to_quorum;
use crate::error::UploadResult;

/// Erasure-codes one fanout chunk's plaintext into `data + parity` pieces,
/// encrypts each under its derived sector key, and dispatches every piece to
/// a write quorum concurrently. Returns one root per piece, in piece order,
/// ready to append as a fanout chunk row.
///
/// `chunk_plaintext` must be exactly `coder.data_pieces() * SECTOR_SIZE`
/// bytes; the caller zero-pads a short final chunk to this size before
/// calling.
#[allow(clippy::too_many_arguments)]
pub async fn upload_chunk(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    coder: &RsCoder,
    fanout_key: Option<&FanoutKey>,
    chunk_index: u64,
    chunk_plaintext: &[u8],
    redundancy: usize,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<Vec<Hash>> {
    let pieces = coder
        .encode(chunk_plaintext, SECTOR_SIZE)
        .expect("chunk_plaintext is pre-padded to data_pieces * SECTOR_SIZE");

    let uploads = pieces.into_iter().enumerate().map(|(piece_index, mut piece)| {
        let fanout_key = fanout_key.cloned();
        async move {
            if let Some(fanout_key) = &fanout_key {
                let sector_key = fanout_key.derive_sector_key(chunk_index, piece_index as u8);
                encrypt_sector_in_place(&sector_key, &mut piece);
            }
            write_sector_to_quorum(providers, blocklist, &piece, redundancy, budget, cancel).await
        }
    });

    try_join_all(uploads).await
}

/// Same erasure-code-and-encrypt pipeline as [`upload_chunk`], but computes
/// each piece's root locally instead of dispatching it to providers. Used by
/// the dry-run upload path, which must report the skylink a real upload would
/// produce without writing anything.
pub fn chunk_roots_locally(
    coder: &RsCoder,
    fanout_key: Option<&FanoutKey>,
    chunk_index: u64,
    chunk_plaintext: &[u8],
) -> Vec<Hash> {
    let pieces = coder
        .encode(chunk_plaintext, SECTOR_SIZE)
        .expect("chunk_plaintext is pre-padded to data_pieces * SECTOR_SIZE");

    pieces
        .into_iter()
        .enumerate()
        .map(|(piece_index, mut piece)| {
            if let Some(fanout_key) = fanout_key {
                let sector_key = fanout_key.derive_sector_key(chunk_index, piece_index as u8);
                encrypt_sector_in_place(&sector_key, &mut piece);
            }
            sector_root(&piece)
        })
        .collect()
}
