use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErasureError {
    #[error("chunk does not divide evenly into data_pieces")]
    Misaligned,
    #[error("fewer than data_pieces distinct pieces are available to reconstruct")]
    NotEnoughPieces,
    #[error("reed-solomon coder rejected the parameters: {0}")]
    Coder(String),
}

/// Erasure-codes a single fanout chunk into `data + parity` sector-sized
/// pieces.
///
/// The `data == 1` case is handled without invoking the Reed-Solomon
/// library at all: a single data piece carries the whole chunk and parity
/// is necessarily zero, so encode/reconstruct degenerate to identity.
#[derive(Clone, Copy)]
pub struct RsCoder {
    data: usize,
    parity: usize,
}

impl RsCoder {
    pub fn new(data: usize, parity: usize) -> Result<Self, ErasureError> {
        if data == 0 {
            return Err(ErasureError::Coder("data_pieces must be >= 1".into()));
        }
        Ok(Self { data, parity })
    }

    #[must_use]
    pub fn data_pieces(&self) -> usize {
        self.data
    }

    #[must_use]
    pub fn parity_pieces(&self) -> usize {
        self.parity
    }

    /// Splits `chunk` into `data` equal-sized pieces of `piece_size` bytes
    /// (the caller zero-pads the last source chunk to a multiple of
    /// `piece_size` beforehand) and computes `parity` additional pieces.
    pub fn encode(&self, chunk: &[u8], piece_size: usize) -> Result<Vec<Vec<u8>>, ErasureError> {
        if chunk.len() != self.data * piece_size {
            return Err(ErasureError::Misaligned);
        }

        let mut shards: Vec<Vec<u8>> = chunk
            .chunks_exact(piece_size)
            .map(<[u8]>::to_vec)
            .collect();
        shards.extend(std::iter::repeat(vec![0u8; piece_size]).take(self.parity));

        if self.parity > 0 {
            let rs = ReedSolomon::new(self.data, self.parity)
                .map_err(|e| ErasureError::Coder(e.to_string()))?;
            rs.encode(&mut shards)
                .map_err(|e| ErasureError::Coder(e.to_string()))?;
        }

        Ok(shards)
    }

    /// Reconstructs missing pieces in place given at least `data` present
    /// entries. `pieces[i] = None` marks a piece that wasn't fetched, was
    /// dropped, or failed integrity verification.
    pub fn reconstruct(
        &self,
        pieces: &mut [Option<Vec<u8>>],
        piece_size: usize,
    ) -> Result<(), ErasureError> {
        let present = pieces.iter().filter(|p| p.is_some()).count();
        if present < self.data {
            return Err(ErasureError::NotEnoughPieces);
        }

        if self.parity == 0 {
            // data == 1 (or parity disabled): every present piece is already
            // a full copy of the chunk's data; nothing to reconstruct.
            return Ok(());
        }

        let rs = ReedSolomon::new(self.data, self.parity)
            .map_err(|e| ErasureError::Coder(e.to_string()))?;

        // reed-solomon-erasure wants Option<Vec<u8>> slots of piece_size.
        for slot in pieces.iter_mut() {
            if let Some(bytes) = slot {
                if bytes.len() != piece_size {
                    return Err(ErasureError::Misaligned);
                }
            }
        }

        rs.reconstruct(pieces)
            .map_err(|e| ErasureError::Coder(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_drop_up_to_parity_recovers() {
        let coder = RsCoder::new(4, 2).unwrap();
        let piece_size = 16;
        let chunk: Vec<u8> = (0..(4 * piece_size) as u8).collect();

        let shards = coder.encode(&chunk, piece_size).unwrap();
        assert_eq!(shards.len(), 6);

        let mut pieces: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        pieces[0] = None;
        pieces[5] = None; // drop up to `parity` pieces

        coder.reconstruct(&mut pieces, piece_size).unwrap();

        let recovered: Vec<u8> = pieces[..4]
            .iter()
            .flat_map(|p| p.clone().unwrap())
            .collect();
        assert_eq!(recovered, chunk);
    }

    #[test]
    fn dropping_more_than_parity_fails() {
        let coder = RsCoder::new(4, 2).unwrap();
        let piece_size = 16;
        let chunk: Vec<u8> = (0..(4 * piece_size) as u8).collect();
        let shards = coder.encode(&chunk, piece_size).unwrap();

        let mut pieces: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        pieces[0] = None;
        pieces[1] = None;
        pieces[2] = None; // only 3 of 6 remain, need 4

        assert!(coder.reconstruct(&mut pieces, piece_size).is_err());
    }

    #[test]
    fn single_data_piece_plain_cipher_is_identity() {
        let coder = RsCoder::new(1, 0).unwrap();
        let piece_size = 32;
        let chunk = vec![0xABu8; piece_size];

        let shards = coder.encode(&chunk, piece_size).unwrap();
        assert_eq!(shards, vec![chunk.clone()]);

        let mut pieces = vec![Some(chunk.clone())];
        coder.reconstruct(&mut pieces, piece_size).unwrap();
        assert_eq!(pieces[0].as_deref(), Some(chunk.as_slice()));
    }
}
