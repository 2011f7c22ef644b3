use sky_primitives::Hash;

use crate::error::{FormatError, FormatResult};

/// Per-chunk table of piece Merkle roots following the layout header in a
/// base sector. Chunk `i` holds `data_pieces + parity_pieces` roots, one per
/// erasure-coded piece, in piece order.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Fanout {
    pieces_per_chunk: usize,
    chunks: Vec<Vec<Hash>>,
}

impl Fanout {
    #[must_use]
    pub fn new(pieces_per_chunk: usize) -> Self {
        Self {
            pieces_per_chunk,
            chunks: Vec::new(),
        }
    }

    pub fn push_chunk(&mut self, roots: Vec<Hash>) -> FormatResult<()> {
        if roots.len() != self.pieces_per_chunk {
            return Err(FormatError::MisalignedFanout);
        }
        self.chunks.push(roots);
        Ok(())
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn chunk(&self, index: usize) -> Option<&[Hash]> {
        self.chunks.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn pieces_per_chunk(&self) -> usize {
        self.pieces_per_chunk
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.chunks.len() * self.pieces_per_chunk * Hash::LEN
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for chunk in &self.chunks {
            for root in chunk {
                out.extend_from_slice(root.as_bytes());
            }
        }
        out
    }

    /// Decodes a fanout table of `pieces_per_chunk` roots each.
    ///
    /// A chunk whose roots are all-zero is rejected unless it is the final
    /// chunk: the last data chunk of a file may be short, padded with
    /// zero-filled pieces when `data_pieces` exceeds the pieces actually
    /// needed, and those padding pieces legitimately hash to nothing
    /// meaningful — but an all-zero *first* or *middle* chunk means the
    /// fanout was truncated or corrupted.
    pub fn decode(bytes: &[u8], pieces_per_chunk: usize) -> FormatResult<Self> {
        let stride = pieces_per_chunk * Hash::LEN;
        if stride == 0 || bytes.len() % stride != 0 {
            return Err(FormatError::MisalignedFanout);
        }

        let chunk_count = bytes.len() / stride;
        let mut chunks = Vec::with_capacity(chunk_count);

        for (index, chunk_bytes) in bytes.chunks_exact(stride).enumerate() {
            let mut roots = Vec::with_capacity(pieces_per_chunk);
            for root_bytes in chunk_bytes.chunks_exact(Hash::LEN) {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(root_bytes);
                roots.push(Hash::new(raw));
            }

            let all_zero = roots.iter().all(Hash::is_zero);
            if all_zero && index + 1 != chunk_count {
                return Err(FormatError::EmptyFanoutChunk(index));
            }

            chunks.push(roots);
        }

        Ok(Self {
            pieces_per_chunk,
            chunks,
        })
    }
}
