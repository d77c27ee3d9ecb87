//! Surface meshing.
//!
//! Meshers never touch the [`World`](crate::world::World). They work on a
//! [`ChunkSnapshot`]: an immutable, copy-on-write view of one chunk plus its
//! four horizontal neighbors, cheap enough to take every time a chunk goes
//! dirty and safe to hand to another thread.

pub mod greedy;
pub mod pipeline;

pub use greedy::{greedy_quads, mesh_snapshot};
pub use pipeline::{Enqueued, MeshCache, MeshCacheConfig, MeshFn, MeshStats};

use std::sync::Arc;

use crate::world::block::BlockId;
use crate::world::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, Chunk, ChunkId, MeshedRevision};
use crate::world::position::ChunkPos;

/// Immutable view of a chunk at one revision, with its neighbors' voxels for
/// sampling across borders.
#[derive(Clone)]
pub struct ChunkSnapshot {
    pos: ChunkPos,
    id: ChunkId,
    revision: u64,
    blocks: Arc<Vec<BlockId>>,
    /// `[+x, -x, +z, -z]`, `None` where the neighbor is not resident.
    neighbors: [Option<Arc<Vec<BlockId>>>; 4],
    meshed: MeshedRevision,
}

impl ChunkSnapshot {
    pub(crate) fn new(
        pos: ChunkPos,
        id: ChunkId,
        revision: u64,
        blocks: Arc<Vec<BlockId>>,
        neighbors: [Option<Arc<Vec<BlockId>>>; 4],
        meshed: MeshedRevision,
    ) -> Self {
        Self {
            pos,
            id,
            revision,
            blocks,
            neighbors,
            meshed,
        }
    }

    /// Snapshot a chunk on its own; every neighbor samples as air.
    pub fn isolated(chunk: &Chunk) -> Self {
        Self::new(
            chunk.pos(),
            chunk.id(),
            chunk.revision(),
            chunk.shared_blocks(),
            [None, None, None, None],
            chunk.meshed_revision(),
        )
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

    /// Whether the neighbor in `slot` (`[+x, -x, +z, -z]`) was resident when
    /// the snapshot was taken.
    pub fn has_neighbor(&self, slot: usize) -> bool {
        self.neighbors.get(slot).is_some_and(Option::is_some)
    }

    /// Sample a voxel in chunk-local coordinates that may step one chunk
    /// outside horizontally. Missing neighbors and heights outside the world
    /// read as air.
    pub fn sample(&self, x: i32, y: i32, z: i32) -> BlockId {
        const W: i32 = CHUNK_WIDTH as i32;
        const D: i32 = CHUNK_DEPTH as i32;
        if y < 0 || y >= CHUNK_HEIGHT as i32 {
            return BlockId::AIR;
        }
        let in_x = (0..W).contains(&x);
        let in_z = (0..D).contains(&z);
        let (source, lx, lz) = match (in_x, in_z) {
            (true, true) => (Some(&self.blocks), x, z),
            (false, true) if x >= W => (self.neighbors[0].as_ref(), x - W, z),
            (false, true) => (self.neighbors[1].as_ref(), x + W, z),
            (true, false) if z >= D => (self.neighbors[2].as_ref(), x, z - D),
            (true, false) => (self.neighbors[3].as_ref(), x, z + D),
            (false, false) => (None, 0, 0),
        };
        match source {
            Some(blocks) if (0..W).contains(&lx) && (0..D).contains(&lz) => {
                blocks[Chunk::index(lx as usize, y as usize, lz as usize)]
            }
            _ => BlockId::AIR,
        }
    }

    /// Record this snapshot's revision as meshed on the source chunk.
    pub(crate) fn mark_meshed(&self) {
        self.meshed.advance_to(self.revision);
    }
}

impl std::fmt::Debug for ChunkSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSnapshot")
            .field("pos", &self.pos)
            .field("id", &self.id)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// Direction a face points in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Axis index the face is perpendicular to (0 = x, 1 = y, 2 = z).
    pub const fn axis(self) -> usize {
        match self {
            Face::PosX | Face::NegX => 0,
            Face::PosY | Face::NegY => 1,
            Face::PosZ | Face::NegZ => 2,
        }
    }

    pub const fn is_positive(self) -> bool {
        matches!(self, Face::PosX | Face::PosY | Face::PosZ)
    }

    pub const fn normal(self) -> [i32; 3] {
        let sign = if self.is_positive() { 1 } else { -1 };
        let mut normal = [0; 3];
        normal[self.axis()] = sign;
        normal
    }
}

/// One merged rectangle of same-id faces.
///
/// `origin` is the lattice corner in chunk-local coordinates, already on the
/// face plane. `width` runs along axis `(axis + 1) % 3`, `height` along
/// `(axis + 2) % 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quad {
    pub face: Face,
    pub origin: [i32; 3],
    pub width: u32,
    pub height: u32,
    pub block: BlockId,
}

impl Quad {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    /// Texture array layer; the block id.
    pub layer: u32,
}

/// Renderable triangle list for one chunk.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub texture: Arc<str>,
}

impl Mesh {
    pub fn empty(texture: Arc<str>) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            texture,
        }
    }

    /// Four vertices and six indices per quad. Positive faces wind
    /// `[0, 1, 2, 0, 2, 3]`, negative faces the reverse, so all faces are
    /// counter-clockwise seen from outside the solid.
    pub fn from_quads(quads: &[Quad], texture: Arc<str>) -> Self {
        let mut vertices = Vec::with_capacity(quads.len() * 4);
        let mut indices = Vec::with_capacity(quads.len() * 6);
        for quad in quads {
            let axis = quad.face.axis();
            let u = (axis + 1) % 3;
            let v = (axis + 2) % 3;

            let origin = quad.origin.map(|c| c as f32);
            let mut du = [0f32; 3];
            du[u] = quad.width as f32;
            let mut dv = [0f32; 3];
            dv[v] = quad.height as f32;

            let corners = [
                origin,
                add(origin, du),
                add(add(origin, du), dv),
                add(origin, dv),
            ];
            const UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

            let base = vertices.len() as u32;
            for (position, uv) in corners.into_iter().zip(UVS) {
                vertices.push(Vertex {
                    position,
                    uv,
                    layer: quad.block.0 as u32,
                });
            }
            let order: [u32; 6] = if quad.face.is_positive() {
                [0, 1, 2, 0, 2, 3]
            } else {
                [0, 2, 1, 0, 3, 2]
            };
            indices.extend(order.iter().map(|i| base + i));
        }
        Self {
            vertices,
            indices,
            texture,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// A finished mesh and the chunk instance and revision it was built from.
///
/// Vertex positions are chunk-local (`0..16` horizontally, `0..256` up). The
/// renderer places the mesh by adding [`MeshArtifact::translation`].
#[derive(Debug, Clone)]
pub struct MeshArtifact {
    pub pos: ChunkPos,
    pub id: ChunkId,
    pub revision: u64,
    pub mesh: Mesh,
}

impl MeshArtifact {
    /// World-space offset of the chunk's local origin.
    pub fn translation(&self) -> [f32; 3] {
        let origin = self.pos.block_origin(0);
        [origin.x as f32, 0.0, origin.z as f32]
    }

    /// A vertex position moved into world space.
    pub fn world_position(&self, local: [f32; 3]) -> [f32; 3] {
        add(local, self.translation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::LocalBlockPos;

    #[test]
    fn sample_crosses_into_neighbors() {
        let center = Chunk::new_empty(ChunkPos::new(0, 0));
        let east = Chunk::new_filled(ChunkPos::new(1, 0), BlockId(3));
        let snapshot = ChunkSnapshot::new(
            center.pos(),
            center.id(),
            center.revision(),
            center.shared_blocks(),
            [Some(east.shared_blocks()), None, None, None],
            center.meshed_revision(),
        );
        assert_eq!(snapshot.sample(16, 10, 4), BlockId(3));
        assert_eq!(snapshot.sample(-1, 10, 4), BlockId::AIR);
        assert_eq!(snapshot.sample(16, 256, 4), BlockId::AIR);
        assert_eq!(snapshot.sample(16, -1, 4), BlockId::AIR);
        assert_eq!(snapshot.sample(16, 10, 16), BlockId::AIR);
    }

    #[test]
    fn mark_meshed_cleans_the_source_chunk() {
        let mut chunk = Chunk::new_empty(ChunkPos::new(2, -3));
        chunk.set(LocalBlockPos::new(1, 1, 1), BlockId(1));
        let snapshot = ChunkSnapshot::isolated(&chunk);
        assert!(chunk.is_dirty());
        snapshot.mark_meshed();
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn positive_faces_wind_counter_clockwise() {
        let quad = Quad {
            face: Face::PosX,
            origin: [1, 0, 0],
            width: 1,
            height: 1,
            block: BlockId(1),
        };
        let mesh = Mesh::from_quads(&[quad], Arc::from("t"));
        let p: Vec<[f32; 3]> = mesh.indices[..3]
            .iter()
            .map(|&i| mesh.vertices[i as usize].position)
            .collect();
        let e1 = [p[1][0] - p[0][0], p[1][1] - p[0][1], p[1][2] - p[0][2]];
        let e2 = [p[2][0] - p[0][0], p[2][1] - p[0][1], p[2][2] - p[0][2]];
        let nx = e1[1] * e2[2] - e1[2] * e2[1];
        assert!(nx > 0.0);
    }

    #[test]
    fn face_normals() {
        assert_eq!(Face::NegY.normal(), [0, -1, 0]);
        assert_eq!(Face::PosZ.normal(), [0, 0, 1]);
    }

    #[test]
    fn artifact_translation_places_local_vertices_in_the_world() {
        let quad = Quad {
            face: Face::PosY,
            origin: [3, 10, 15],
            width: 1,
            height: 1,
            block: BlockId(1),
        };
        let artifact = MeshArtifact {
            pos: ChunkPos::new(-2, 5),
            id: Chunk::new_empty(ChunkPos::new(-2, 5)).id(),
            revision: 1,
            mesh: Mesh::from_quads(&[quad], Arc::from("t")),
        };
        assert_eq!(artifact.translation(), [-32.0, 0.0, 80.0]);

        let local = artifact.mesh.vertices[0].position;
        assert_eq!(local, [3.0, 10.0, 15.0]);
        assert_eq!(artifact.world_position(local), [-29.0, 10.0, 95.0]);
    }
}
