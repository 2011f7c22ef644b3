use sky_crypto::{decrypt_in_place, FanoutKey};
use sky_erasure::{verify_sector, RsCoder};
use sky_primitives::{Blocklist, Hash, RequestBudget, SkyError, SECTOR_SIZE};
use sky_worker::WorkerPool;
use tokio_util::sync::CancellationToken;

use crate::byroot::download_by_root;
use crate::error::DownloadResult;

/// Fetches every piece of fanout chunk `chunk_index`, verifies each against
/// its fanout root, decrypts with the derived sector key, and reassembles
/// the chunk's plaintext via erasure recovery.
///
/// `piece_roots` holds one root per piece (`data_pieces + parity_pieces`
/// entries, or exactly one when the chunk uses a plain cipher with
/// `data_pieces == 1`).
#[allow(clippy::too_many_arguments)]
pub async fn fetch_and_reconstruct_chunk(
    pool: &WorkerPool,
    blocklist: &dyn Blocklist,
    fanout_key: Option<&FanoutKey>,
    coder: &RsCoder,
    chunk_index: u64,
    piece_roots: &[Hash],
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<Vec<u8>> {
    let data_pieces = coder.data_pieces();
    let piece_count = piece_roots.len().max(data_pieces);

    let mut pieces: Vec<Option<Vec<u8>>> = vec![None; piece_count];
    let mut fetched = 0usize;

    for (piece_index, root) in piece_roots.iter().enumerate() {
        if fetched >= data_pieces {
            break;
        }
        if root.is_zero() {
            continue;
        }

        let mut sector = download_by_root(
            pool,
            blocklist,
            *root,
            0,
            SECTOR_SIZE as u32,
            budget,
            cancel,
        )
        .await?;

        if !verify_sector(&sector, root) {
            return Err(SkyError::MerkleProofInvalid {
                context: "fetch_and_reconstruct_chunk",
            });
        }

        if let Some(fanout_key) = fanout_key {
            let sector_key = fanout_key.derive_sector_key(chunk_index, piece_index as u8);
            decrypt_in_place(&sector_key, &mut sector, 0);
        }

        pieces[piece_index] = Some(sector);
        fetched += 1;
    }

    if fetched < data_pieces {
        return Err(SkyError::NotEnoughWorkers {
            context: "fetch_and_reconstruct_chunk",
        });
    }

    coder
        .reconstruct(&mut pieces, SECTOR_SIZE)
        .map_err(|_| SkyError::NotEnoughWorkers {
            context: "fetch_and_reconstruct_chunk",
        })?;

    let mut chunk = Vec::with_capacity(data_pieces * SECTOR_SIZE);
    for piece in pieces.into_iter().take(data_pieces) {
        chunk.extend(piece.expect("reconstruct fills every data slot"));
    }
    Ok(chunk)
}
