pub mod block;
pub mod chunk;
pub mod position;

use crate::generation::WorldGenerator;
use crate::meshing::ChunkSnapshot;
use block::BlockId;
use chunk::Chunk;
use dashmap::mapref::one::Ref;
use dashmap::{DashMap, DashSet};
use position::{BlockPos, ChunkPos};

/// The resident block world: chunk columns keyed by coordinate.
///
/// Mutation happens from the simulation context only. Mesh workers never see
/// the `World`; they receive [`ChunkSnapshot`]s taken from it.
pub struct World {
    chunks: DashMap<ChunkPos, Chunk>,
    /// Chunks whose mesh no longer matches their (or a neighbor's) contents.
    dirty: DashSet<ChunkPos>,
    generator: WorldGenerator,
}

impl World {
    pub fn new(generator: WorldGenerator) -> Self {
        Self {
            chunks: DashMap::new(),
            dirty: DashSet::new(),
            generator,
        }
    }

    pub fn generator(&self) -> &WorldGenerator {
        &self.generator
    }

    /// Read a block at an absolute position. Returns AIR for non-resident
    /// chunks and for positions above or below the world.
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        let Some(local) = pos.local() else {
            return BlockId::AIR;
        };
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get(local),
            None => BlockId::AIR,
        }
    }

    /// Write a block at an absolute position, creating the owning chunk from
    /// the generator if it is not resident.
    ///
    /// Returns the chunks whose meshes are now stale: the owner, plus any
    /// resident horizontal neighbor when the voxel sits on a chunk border.
    /// Those neighbors get a revision bump, so a mesh built from their old
    /// surroundings no longer counts as current. Writes outside the world and
    /// writes that do not change the stored id return an empty list.
    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> Vec<ChunkPos> {
        let Some(local) = pos.local() else {
            return Vec::new();
        };
        let chunk_pos = pos.chunk();
        if !self.chunks.contains_key(&chunk_pos) {
            self.insert_chunk(Chunk::generated(chunk_pos, &self.generator));
        }
        {
            let Some(mut chunk) = self.chunks.get_mut(&chunk_pos) else {
                return Vec::new();
            };
            if chunk.get(local) == block {
                return Vec::new();
            }
            chunk.set(local, block);
        }

        let mut touched = vec![chunk_pos];
        if local.on_border() {
            let max_x = (chunk::CHUNK_WIDTH - 1) as u8;
            let max_z = (chunk::CHUNK_DEPTH - 1) as u8;
            let [east, west, south, north] = chunk_pos.neighbors();
            let candidates = [
                (local.x == max_x, east),
                (local.x == 0, west),
                (local.z == max_z, south),
                (local.z == 0, north),
            ];
            for (adjacent, neighbor) in candidates {
                if adjacent && self.bump_neighbor(neighbor) {
                    touched.push(neighbor);
                }
            }
        }
        for pos in &touched {
            self.dirty.insert(*pos);
        }
        touched
    }

    /// Bump a resident neighbor's revision after its surroundings changed.
    fn bump_neighbor(&self, pos: ChunkPos) -> bool {
        match self.chunks.get_mut(&pos) {
            Some(mut chunk) => {
                chunk.bump_revision();
                true
            }
            None => false,
        }
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Return the chunk at `pos`, generating it first if absent.
    pub fn load_chunk(&self, pos: ChunkPos) -> Ref<'_, ChunkPos, Chunk> {
        if let Some(chunk) = self.chunks.get(&pos) {
            return chunk;
        }
        self.insert_chunk(Chunk::generated(pos, &self.generator));
        self.chunks
            .entry(pos)
            .or_insert_with(|| Chunk::generated(pos, &self.generator))
            .downgrade()
    }

    /// Insert a chunk produced elsewhere (store or generator). The chunk and
    /// its resident neighbors are queued for remeshing, since the shared
    /// borders changed. Returns any chunk previously stored at that coordinate.
    pub fn insert_chunk(&self, chunk: Chunk) -> Option<Chunk> {
        let pos = chunk.pos();
        let previous = self.chunks.insert(pos, chunk);
        self.dirty.insert(pos);
        self.bump_neighbors_of(pos);
        previous
    }

    /// Drop a chunk from memory without persisting it. Resident neighbors are
    /// queued for remeshing: their faces along the shared border are exposed now.
    pub fn remove_chunk(&self, pos: ChunkPos) -> Option<Chunk> {
        self.dirty.remove(&pos);
        let removed = self.chunks.remove(&pos).map(|(_, chunk)| chunk);
        if removed.is_some() {
            self.bump_neighbors_of(pos);
        }
        removed
    }

    fn bump_neighbors_of(&self, pos: ChunkPos) {
        for neighbor in pos.neighbors() {
            if self.bump_neighbor(neighbor) {
                self.dirty.insert(neighbor);
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Get a reference to a single chunk by position, if present.
    pub fn get_chunk(&self, pos: &ChunkPos) -> Option<Ref<'_, ChunkPos, Chunk>> {
        self.chunks.get(pos)
    }

    /// Iterate over all chunks. Each entry derefs to `(ChunkPos, Chunk)`.
    pub fn iter_chunks(&self) -> dashmap::iter::Iter<'_, ChunkPos, Chunk> {
        self.chunks.iter()
    }

    /// Drain and return all chunk positions queued for remeshing since the
    /// last call.
    pub fn take_dirty_chunks(&self) -> Vec<ChunkPos> {
        let mut dirty: Vec<ChunkPos> = self.dirty.iter().map(|entry| *entry).collect();
        for pos in &dirty {
            self.dirty.remove(pos);
        }
        dirty.retain(|pos| self.chunks.contains_key(pos));
        dirty
    }

    /// Number of chunks currently queued for remeshing.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Capture an immutable view of a chunk and its four horizontal
    /// neighbors for meshing on another thread.
    pub fn snapshot(&self, pos: ChunkPos) -> Option<ChunkSnapshot> {
        let (id, revision, blocks, meshed) = {
            let chunk = self.chunks.get(&pos)?;
            (
                chunk.id(),
                chunk.revision(),
                chunk.shared_blocks(),
                chunk.meshed_revision(),
            )
        };
        let neighbors = pos
            .neighbors()
            .map(|n| self.chunks.get(&n).map(|chunk| chunk.shared_blocks()));
        Some(ChunkSnapshot::new(pos, id, revision, blocks, neighbors, meshed))
    }
}

/// Read-only access to a [`World`] owned by the streaming cache.
///
/// Reads, snapshots and draining the remesh queue are allowed; creating
/// chunks and writing blocks are not, so every resident chunk stays under
/// the cache's residency and persistence bookkeeping.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    world: &'a World,
}

impl<'a> WorldView<'a> {
    pub(crate) fn new(world: &'a World) -> Self {
        Self { world }
    }

    pub fn generator(&self) -> &'a WorldGenerator {
        self.world.generator()
    }

    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        self.world.get_block(pos)
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.world.has_chunk(pos)
    }

    pub fn get_chunk(&self, pos: &ChunkPos) -> Option<Ref<'a, ChunkPos, Chunk>> {
        self.world.get_chunk(pos)
    }

    pub fn iter_chunks(&self) -> dashmap::iter::Iter<'a, ChunkPos, Chunk> {
        self.world.iter_chunks()
    }

    pub fn chunk_count(&self) -> usize {
        self.world.chunk_count()
    }

    pub fn dirty_count(&self) -> usize {
        self.world.dirty_count()
    }

    pub fn take_dirty_chunks(&self) -> Vec<ChunkPos> {
        self.world.take_dirty_chunks()
    }

    pub fn snapshot(&self, pos: ChunkPos) -> Option<ChunkSnapshot> {
        self.world.snapshot(pos)
    }
}
