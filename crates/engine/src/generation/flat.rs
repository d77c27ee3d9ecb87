use crate::world::block::BlockId;
use crate::world::position::BlockPos;

/// One horizontal band of a flat world: every `y <= top` (and above the
/// previous band) is `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatLayer {
    pub top: i64,
    pub block: BlockId,
}

/// Layered flat terrain. Everything above the last layer is air.
#[derive(Debug, Clone)]
pub struct FlatGenerator {
    layers: Vec<FlatLayer>,
}

impl FlatGenerator {
    /// Layers may be given in any order; they are sorted by `top`.
    pub fn new(mut layers: Vec<FlatLayer>) -> Self {
        layers.sort_by_key(|layer| layer.top);
        Self { layers }
    }

    /// Bedrock at y=0, stone y=1..=3, dirt at y=4.
    pub fn standard(bedrock: BlockId, stone: BlockId, dirt: BlockId) -> Self {
        Self::new(vec![
            FlatLayer { top: 0, block: bedrock },
            FlatLayer { top: 3, block: stone },
            FlatLayer { top: 4, block: dirt },
        ])
    }

    pub fn block_at(&self, pos: BlockPos) -> BlockId {
        if pos.y < 0 {
            return BlockId::AIR;
        }
        self.layers
            .iter()
            .find(|layer| pos.y <= layer.top)
            .map(|layer| layer.block)
            .unwrap_or(BlockId::AIR)
    }

    /// Highest solid y, or `None` for a world with no layers.
    pub fn surface_height(&self) -> Option<i64> {
        self.layers.last().map(|layer| layer.top)
    }

    pub fn layers(&self) -> &[FlatLayer] {
        &self.layers
    }
}
