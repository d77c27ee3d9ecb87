use super::block::BlockId;
use super::position::{ChunkPos, LocalBlockPos};
use crate::generation::WorldGenerator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of blocks along the chunk's x axis.
pub const CHUNK_WIDTH: usize = 16;
/// Number of blocks along the chunk's y axis (the whole world height).
pub const CHUNK_HEIGHT: usize = 256;
/// Number of blocks along the chunk's z axis.
pub const CHUNK_DEPTH: usize = 16;
/// Total block count in one chunk.
pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_HEIGHT * CHUNK_DEPTH;

static NEXT_CHUNK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one chunk *instance*. A chunk evicted and later recreated at
/// the same coordinate gets a fresh id, which lets the mesh pipeline tell
/// results computed from the old instance apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(u64);

impl ChunkId {
    fn next() -> Self {
        Self(NEXT_CHUNK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// The last chunk revision a mesher produced an artifact for.
///
/// Shared between a chunk and every snapshot taken of it; mesh workers
/// advance it without touching the chunk itself.
#[derive(Debug, Clone, Default)]
pub struct MeshedRevision(Arc<AtomicU64>);

impl MeshedRevision {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Record that `revision` has been meshed. Never moves backwards, so a
    /// slow worker finishing an older job cannot make a chunk look dirty again.
    pub fn advance_to(&self, revision: u64) {
        self.0.fetch_max(revision, Ordering::AcqRel);
    }
}

/// A 16x256x16 column of blocks.
///
/// Stored as a flat array in x-major / y-mid / z-minor order, which is also
/// the order the chunk codec writes voxels in. The array sits behind an `Arc`
/// so snapshots for off-thread meshing are a refcount bump; the next write
/// after a snapshot copies the buffer.
///
/// Dirty tracking: `revision` increases on every mutation, and the chunk is
/// dirty while the shared meshed revision lags behind it. A new chunk starts
/// at revision 1 with nothing meshed, i.e. dirty.
pub struct Chunk {
    pos: ChunkPos,
    id: ChunkId,
    blocks: Arc<Vec<BlockId>>,
    revision: u64,
    meshed: MeshedRevision,
}

impl Chunk {
    pub fn new_filled(pos: ChunkPos, block: BlockId) -> Self {
        Self::from_blocks(pos, vec![block; CHUNK_VOLUME])
    }

    pub fn new_empty(pos: ChunkPos) -> Self {
        Self::new_filled(pos, BlockId::AIR)
    }

    /// Build a chunk by sampling `generator` at every voxel.
    pub fn generated(pos: ChunkPos, generator: &WorldGenerator) -> Self {
        let blocks = Self::local_positions()
            .map(|local| generator.block_at(pos.world_pos(local)))
            .collect();
        Self::from_blocks(pos, blocks)
    }

    fn from_blocks(pos: ChunkPos, blocks: Vec<BlockId>) -> Self {
        debug_assert_eq!(blocks.len(), CHUNK_VOLUME);
        Self {
            pos,
            id: ChunkId::next(),
            blocks: Arc::new(blocks),
            revision: 1,
            meshed: MeshedRevision::default(),
        }
    }

    /// Every local position in storage order (x-major, y-mid, z-minor).
    pub fn local_positions() -> impl Iterator<Item = LocalBlockPos> {
        (0..CHUNK_WIDTH).flat_map(|x| {
            (0..CHUNK_HEIGHT).flat_map(move |y| {
                (0..CHUNK_DEPTH).map(move |z| LocalBlockPos::new(x as u8, y as u8, z as u8))
            })
        })
    }

    /// Flat index of a local position.
    ///
    /// # Panics
    /// Out-of-range coordinates are a caller bug and panic immediately.
    #[inline]
    pub fn index(x: usize, y: usize, z: usize) -> usize {
        assert!(
            x < CHUNK_WIDTH && y < CHUNK_HEIGHT && z < CHUNK_DEPTH,
            "local voxel ({x}, {y}, {z}) outside chunk bounds"
        );
        (x * CHUNK_HEIGHT + y) * CHUNK_DEPTH + z
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn get(&self, pos: LocalBlockPos) -> BlockId {
        self.blocks[Self::index(pos.x as usize, pos.y as usize, pos.z as usize)]
    }

    /// Write one voxel and mark the chunk dirty.
    #[inline]
    pub fn set(&mut self, pos: LocalBlockPos, block: BlockId) {
        let idx = Self::index(pos.x as usize, pos.y as usize, pos.z as usize);
        Arc::make_mut(&mut self.blocks)[idx] = block;
        self.revision += 1;
    }

    /// Raw voxel data in storage order.
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub(crate) fn shared_blocks(&self) -> Arc<Vec<BlockId>> {
        Arc::clone(&self.blocks)
    }

    pub(crate) fn meshed_revision(&self) -> MeshedRevision {
        self.meshed.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.meshed.get() < self.revision
    }

    /// Mark the current contents as meshed (used by synchronous meshing).
    pub fn mark_clean(&self) {
        self.meshed.advance_to(self.revision);
    }

    /// Invalidate the current mesh without touching voxels, after a
    /// neighbor's border changed.
    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("id", &self.id)
            .field("revision", &self.revision)
            .field("meshed", &self.meshed.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_dirty_until_marked_clean() {
        let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
        assert!(chunk.is_dirty());
        chunk.mark_clean();
        assert!(!chunk.is_dirty());

        chunk.set(LocalBlockPos::new(1, 2, 3), BlockId(4));
        assert!(chunk.is_dirty());
        assert_eq!(chunk.get(LocalBlockPos::new(1, 2, 3)), BlockId(4));
    }

    #[test]
    fn storage_order_is_x_major_z_minor() {
        assert_eq!(Chunk::index(0, 0, 1), 1);
        assert_eq!(Chunk::index(0, 1, 0), CHUNK_DEPTH);
        assert_eq!(Chunk::index(1, 0, 0), CHUNK_HEIGHT * CHUNK_DEPTH);

        let first: Vec<_> = Chunk::local_positions().take(2).collect();
        assert_eq!(first, vec![LocalBlockPos::new(0, 0, 0), LocalBlockPos::new(0, 0, 1)]);
        assert_eq!(Chunk::local_positions().count(), CHUNK_VOLUME);
    }

    #[test]
    #[should_panic(expected = "outside chunk bounds")]
    fn out_of_range_local_access_panics() {
        let chunk = Chunk::new_empty(ChunkPos::new(0, 0));
        chunk.get(LocalBlockPos::new(16, 0, 0));
    }

    #[test]
    fn writes_after_snapshot_do_not_leak_into_it() {
        let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
        let shared = chunk.shared_blocks();
        chunk.set(LocalBlockPos::new(0, 0, 0), BlockId(1));
        assert_eq!(shared[0], BlockId::AIR);
        assert_eq!(chunk.blocks()[0], BlockId(1));
    }

    #[test]
    fn meshed_revision_never_moves_backwards() {
        let meshed = MeshedRevision::default();
        meshed.advance_to(5);
        meshed.advance_to(3);
        assert_eq!(meshed.get(), 5);
    }

    #[test]
    fn neighbor_bump_redirties_without_touching_voxels() {
        let mut chunk = Chunk::new_filled(ChunkPos::new(0, 0), BlockId(2));
        chunk.mark_clean();
        let before = chunk.shared_blocks();

        chunk.bump_revision();
        assert!(chunk.is_dirty());
        assert_eq!(chunk.revision(), 2);
        assert!(Arc::ptr_eq(&before, &chunk.shared_blocks()));
    }

    #[test]
    fn every_instance_gets_a_fresh_id() {
        let a = Chunk::new_empty(ChunkPos::new(0, 0));
        let b = Chunk::new_empty(ChunkPos::new(0, 0));
        assert_ne!(a.id(), b.id());
    }
}
