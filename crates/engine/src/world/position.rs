use super::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};

/// Largest chunk coordinate magnitude the world addresses. Half the `i32`
/// range, so neighbor and view-radius arithmetic around any addressable
/// chunk cannot overflow.
pub const CHUNK_COORD_LIMIT: i32 = i32::MAX / 2;

fn clamp_chunk_coord(coord: i64) -> i32 {
    let limit = CHUNK_COORD_LIMIT as i64;
    coord.clamp(-limit, limit) as i32
}

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    ///
    /// Floors toward negative infinity, so `x = -1` lands in chunk `-1`.
    /// Positions past [`CHUNK_COORD_LIMIT`] saturate to the outermost column;
    /// [`local`](Self::local) rejects them, so they never hold blocks.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: clamp_chunk_coord(self.x.div_euclid(CHUNK_WIDTH as i64)),
            z: clamp_chunk_coord(self.z.div_euclid(CHUNK_DEPTH as i64)),
        }
    }

    /// Whether the horizontal coordinates fall inside the addressable grid.
    pub fn in_horizontal_range(&self) -> bool {
        let limit = CHUNK_COORD_LIMIT as i64;
        (-limit..=limit).contains(&self.x.div_euclid(CHUNK_WIDTH as i64))
            && (-limit..=limit).contains(&self.z.div_euclid(CHUNK_DEPTH as i64))
    }

    /// Position within the owning chunk, or `None` when `y` lies outside
    /// the world's vertical extent or `x`/`z` outside the addressable grid.
    pub fn local(&self) -> Option<LocalBlockPos> {
        if self.y < 0 || self.y >= CHUNK_HEIGHT as i64 || !self.in_horizontal_range() {
            return None;
        }
        Some(LocalBlockPos {
            x: self.x.rem_euclid(CHUNK_WIDTH as i64) as u8,
            y: self.y as u8,
            z: self.z.rem_euclid(CHUNK_DEPTH as i64) as u8,
        })
    }

    /// The six cardinal neighbors.
    pub const fn neighbors(&self) -> [BlockPos; 6] {
        [
            Self::new(self.x + 1, self.y, self.z),
            Self::new(self.x - 1, self.y, self.z),
            Self::new(self.x, self.y + 1, self.z),
            Self::new(self.x, self.y - 1, self.z),
            Self::new(self.x, self.y, self.z + 1),
            Self::new(self.x, self.y, self.z - 1),
        ]
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i64) -> BlockPos {
        BlockPos::new(
            self.x as i64 * CHUNK_WIDTH as i64,
            y,
            self.z as i64 * CHUNK_DEPTH as i64,
        )
    }

    /// World position of a voxel inside this chunk.
    pub const fn world_pos(&self, local: LocalBlockPos) -> BlockPos {
        let origin = self.block_origin(local.y as i64);
        BlockPos::new(origin.x + local.x as i64, origin.y, origin.z + local.z as i64)
    }

    /// The four horizontal neighbors, in `[+x, -x, +z, -z]` order.
    pub const fn neighbors(&self) -> [ChunkPos; 4] {
        [
            Self::new(self.x + 1, self.z),
            Self::new(self.x - 1, self.z),
            Self::new(self.x, self.z + 1),
            Self::new(self.x, self.z - 1),
        ]
    }

    pub const fn distance_squared(&self, other: ChunkPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

/// Block position local to a chunk (x, z in 0..16, y in 0..256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Whether this voxel touches a horizontal chunk border.
    pub const fn on_border(&self) -> bool {
        self.x == 0
            || self.x as usize == CHUNK_WIDTH - 1
            || self.z == 0
            || self.z as usize == CHUNK_DEPTH - 1
    }
}
