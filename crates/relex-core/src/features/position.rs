use candle_core::{Device, Tensor};
use rand::Rng;

use crate::error::{RelexError, Result};
use crate::features::edge::LEARNED_MAX_NORM;
use crate::table::EmbeddingTable;

/// Learned embedding of a signed relative token offset.
///
/// Offset `x` maps to row `x + max_abs_offset`; valid offsets are
/// `-max_abs_offset <= x < max_abs_offset`.
#[derive(Debug)]
pub struct PositionEmbedder {
    table: EmbeddingTable,
    max_abs_offset: usize,
}

impl PositionEmbedder {
    pub fn new<R: Rng + ?Sized>(
        max_abs_offset: usize,
        dim: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let table = EmbeddingTable::random(max_abs_offset * 2, dim, rng, device)?
            .with_name("position")
            .with_max_norm(LEARNED_MAX_NORM);
        Ok(Self {
            table,
            max_abs_offset,
        })
    }

    /// Table row for `offset`.
    pub fn index_of(&self, offset: i64) -> Result<usize> {
        let bound = self.max_abs_offset as i64;
        if offset < -bound || offset >= bound {
            return Err(RelexError::IndexOutOfRange {
                offset,
                bound: self.max_abs_offset,
            });
        }
        Ok((offset + bound) as usize)
    }

    pub fn embed(&self, offset: i64) -> Result<Tensor> {
        self.table.embed(self.index_of(offset)?)
    }

    pub fn max_abs_offset(&self) -> usize {
        self.max_abs_offset
    }

    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn embedder(max_abs_offset: usize) -> PositionEmbedder {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        PositionEmbedder::new(max_abs_offset, 4, &mut rng, &Device::Cpu).unwrap()
    }

    #[test]
    fn every_in_range_offset_resolves() {
        let emb = embedder(5);
        for x in -5i64..5 {
            let index = emb.index_of(x).unwrap();
            assert_eq!(index as i64, x + 5);
            assert!(index < 10);
            assert_eq!(emb.embed(x).unwrap().dims(), &[4]);
        }
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let emb = embedder(5);
        assert!(matches!(
            emb.embed(5).unwrap_err(),
            RelexError::IndexOutOfRange {
                offset: 5,
                bound: 5
            }
        ));
        assert!(matches!(
            emb.embed(-6).unwrap_err(),
            RelexError::IndexOutOfRange { offset: -6, .. }
        ));
    }

    #[test]
    fn table_has_twice_the_bound_rows() {
        let emb = embedder(30);
        assert_eq!(emb.table().rows(), 60);
        assert_eq!(emb.table().max_norm(), Some(2.0));
    }
}
