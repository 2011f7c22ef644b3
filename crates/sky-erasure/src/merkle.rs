use sky_primitives::{sha256, Hash, SEGMENT_SIZE};

/// Computes the Merkle root of a sector over [`SEGMENT_SIZE`]-byte segments.
///
/// `sector.len()` must be a multiple of `SEGMENT_SIZE`; a partial range
/// fetched for streaming is never fed here directly, only a full sector is.
#[must_use]
pub fn sector_root(sector: &[u8]) -> Hash {
    assert!(
        sector.len() % SEGMENT_SIZE == 0,
        "sector length must be a multiple of SEGMENT_SIZE"
    );

    let mut level: Vec<Hash> = sector.chunks_exact(SEGMENT_SIZE).map(leaf_hash).collect();
    if level.is_empty() {
        return Hash::ZERO;
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let combined = match pair {
                [left, right] => node_hash(left, right),
                [only] => node_hash(only, only),
                _ => unreachable!("chunks(2) yields at most two elements"),
            };
            next.push(combined);
        }
        level = next;
    }

    level[0]
}

/// Verifies that `sector` hashes to `expected_root`, the check that guards
/// every downloaded sector before it's handed to the erasure decoder.
#[must_use]
pub fn verify_sector(sector: &[u8], expected_root: &Hash) -> bool {
    &sector_root(sector) == expected_root
}

fn leaf_hash(segment: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(1 + segment.len());
    buf.push(0x00); // leaf domain tag
    buf.extend_from_slice(segment);
    sha256(&buf)
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(1 + 64);
    buf.push(0x01); // internal-node domain tag
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    sha256(&buf)
}
