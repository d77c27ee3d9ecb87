/// Opaque block identifier. The engine stores these without interpreting them.
/// A block registry owned by the host assigns meaning to specific IDs
/// (e.g. 1 = stone, 3 = grass).
///
/// The only semantic the engine enforces is that `BlockId::AIR` (0) is the
/// "empty" block: meshing emits faces between solid and air voxels only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u8);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_solid(self) -> bool {
        self.0 != 0
    }
}
