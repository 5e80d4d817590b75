use candle_core::{Device, Tensor};
use rand::Rng;

use crate::error::Result;
use crate::example::EdgeDirection;
use crate::table::EmbeddingTable;

/// Width of an edge-direction embedding.
pub const EDGE_DIRECTION_DIM: usize = 2;

/// Row norm bound for the low-cardinality learned tables.
pub const LEARNED_MAX_NORM: f64 = 2.0;

/// Two-entry learned table for edge directions.
#[derive(Debug)]
pub struct EdgeDirectionEmbedder {
    table: EmbeddingTable,
}

impl EdgeDirectionEmbedder {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, device: &Device) -> Result<Self> {
        let table = EmbeddingTable::random(2, EDGE_DIRECTION_DIM, rng, device)?
            .with_name("edge_direction")
            .with_max_norm(LEARNED_MAX_NORM);
        Ok(Self { table })
    }

    pub fn embed(&self, direction: EdgeDirection) -> Result<Tensor> {
        self.table.embed(direction.index())
    }

    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}
