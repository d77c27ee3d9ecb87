//! Greedy mesher output and mesh cache behavior.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkstream_engine::generation::{FlatGenerator, WorldGenerator};
use chunkstream_engine::meshing::{
    ChunkSnapshot, Enqueued, Face, Mesh, MeshCache, MeshCacheConfig, Quad, greedy_quads,
    mesh_snapshot,
};
use chunkstream_engine::world::World;
use chunkstream_engine::world::block::BlockId;
use chunkstream_engine::world::chunk::Chunk;
use chunkstream_engine::world::position::{BlockPos, ChunkPos, LocalBlockPos};

const STONE: BlockId = BlockId(1);
const DIRT: BlockId = BlockId(2);
/// Chunks containing this block at (0, 0, 0) make `exploding_mesher` panic.
const POISON: BlockId = BlockId(13);

fn empty_world() -> World {
    World::new(WorldGenerator::Flat(FlatGenerator::new(Vec::new())))
}

fn single_voxel(x: u8, y: u8, z: u8) -> Chunk {
    let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
    chunk.set(LocalBlockPos::new(x, y, z), STONE);
    chunk
}

fn config(workers: usize) -> MeshCacheConfig {
    MeshCacheConfig {
        workers,
        idle_wait: Duration::from_millis(5),
        texture: Arc::from("terrain"),
    }
}

fn exploding_mesher(snapshot: &ChunkSnapshot, texture: &Arc<str>) -> Mesh {
    if snapshot.sample(0, 0, 0) == POISON {
        panic!("poisoned chunk");
    }
    mesh_snapshot(snapshot, texture)
}

fn slow_mesher(snapshot: &ChunkSnapshot, texture: &Arc<str>) -> Mesh {
    std::thread::sleep(Duration::from_millis(100));
    mesh_snapshot(snapshot, texture)
}

/// Poll until `pred` holds or two seconds pass.
fn wait_for(mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    pred()
}

// ---------------------------------------------------------------------------
// Greedy mesher
// ---------------------------------------------------------------------------

#[test]
fn isolated_voxel_yields_six_unit_quads() {
    let chunk = single_voxel(4, 10, 7);
    let quads = greedy_quads(&ChunkSnapshot::isolated(&chunk));
    assert_eq!(quads.len(), 6);
    for face in Face::ALL {
        let quad = quads.iter().find(|q| q.face == face).unwrap();
        assert_eq!((quad.width, quad.height), (1, 1));
        assert_eq!(quad.block, STONE);
    }

    let plus_x = quads.iter().find(|q| q.face == Face::PosX).unwrap();
    assert_eq!(plus_x.origin, [5, 10, 7]);
    let minus_y = quads.iter().find(|q| q.face == Face::NegY).unwrap();
    assert_eq!(minus_y.origin, [4, 10, 7]);
}

#[test]
fn row_merges_its_long_sides() {
    let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
    for x in 0..16 {
        chunk.set(LocalBlockPos::new(x, 20, 9), STONE);
    }
    let quads = greedy_quads(&ChunkSnapshot::isolated(&chunk));
    assert_eq!(quads.len(), 6);
    for quad in &quads {
        let long = quad.width.max(quad.height);
        let short = quad.width.min(quad.height);
        match quad.face {
            Face::PosX | Face::NegX => assert_eq!((long, short), (1, 1)),
            _ => assert_eq!((long, short), (16, 1), "{:?}", quad.face),
        }
    }
}

#[test]
fn every_exposed_face_is_covered_exactly_once() {
    let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
    // An L-shaped wall of two materials.
    for y in 0..4 {
        for x in 2..8 {
            chunk.set(LocalBlockPos::new(x, y, 3), STONE);
        }
        for z in 4..9 {
            chunk.set(LocalBlockPos::new(2, y, z), DIRT);
        }
    }
    let snapshot = ChunkSnapshot::isolated(&chunk);
    let quads = greedy_quads(&snapshot);

    let mut covered = std::collections::HashMap::new();
    for quad in &quads {
        let axis = quad.face.axis();
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for du in 0..quad.width as i32 {
            for dv in 0..quad.height as i32 {
                let mut cell = quad.origin;
                cell[u] += du;
                cell[v] += dv;
                *covered.entry((quad.face, cell)).or_insert(0) += 1;
            }
        }
    }
    assert!(covered.values().all(|&n| n == 1));

    let mut expected = 0;
    for x in 0..16i32 {
        for y in 0..8i32 {
            for z in 0..16i32 {
                if snapshot.sample(x, y, z).is_air() {
                    continue;
                }
                for face in Face::ALL {
                    let n = face.normal();
                    if snapshot.sample(x + n[0], y + n[1], z + n[2]).is_air() {
                        expected += 1;
                    }
                }
            }
        }
    }
    assert_eq!(covered.len(), expected);
}

#[test]
fn differing_ids_are_not_merged() {
    let mut chunk = Chunk::new_empty(ChunkPos::new(0, 0));
    chunk.set(LocalBlockPos::new(0, 0, 0), STONE);
    chunk.set(LocalBlockPos::new(1, 0, 0), DIRT);
    let quads = greedy_quads(&ChunkSnapshot::isolated(&chunk));
    let tops: Vec<&Quad> = quads.iter().filter(|q| q.face == Face::PosY).collect();
    assert_eq!(tops.len(), 2);
    assert!(tops.iter().any(|q| q.block == STONE));
    assert!(tops.iter().any(|q| q.block == DIRT));
}

#[test]
fn empty_chunk_gives_an_empty_mesh() {
    let chunk = Chunk::new_empty(ChunkPos::new(3, 3));
    let mesh = mesh_snapshot(&ChunkSnapshot::isolated(&chunk), &Arc::from("terrain"));
    assert!(mesh.is_empty());
    assert!(mesh.vertices.is_empty());
    assert_eq!(&*mesh.texture, "terrain");
}

#[test]
fn faces_against_a_resident_neighbor_are_culled() {
    let world = empty_world();
    world.set_block(BlockPos::new(15, 5, 5), STONE);
    world.set_block(BlockPos::new(16, 5, 5), STONE);

    let quads = greedy_quads(&world.snapshot(ChunkPos::new(0, 0)).unwrap());
    assert!(!quads.iter().any(|q| q.face == Face::PosX));
    assert_eq!(quads.len(), 5);

    // Without the neighbor the seam face shows up.
    world.remove_chunk(ChunkPos::new(1, 0));
    let quads = greedy_quads(&world.snapshot(ChunkPos::new(0, 0)).unwrap());
    assert!(quads.iter().any(|q| q.face == Face::PosX && q.origin == [16, 5, 5]));
}

#[test]
fn mesh_buffers_match_quads() {
    let chunk = single_voxel(0, 0, 0);
    let mesh = mesh_snapshot(&ChunkSnapshot::isolated(&chunk), &Arc::from("t"));
    assert_eq!(mesh.quad_count(), 6);
    assert_eq!(mesh.vertices.len(), 24);
    assert_eq!(mesh.indices.len(), 36);
    assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    assert!(mesh.vertices.iter().all(|v| v.layer == STONE.0 as u32));
    for vertex in &mesh.vertices {
        for c in vertex.position {
            assert!(c == 0.0 || c == 1.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Mesh cache
// ---------------------------------------------------------------------------

#[test]
fn duplicate_enqueue_meshes_once_and_collects_once() {
    let cache = MeshCache::start(config(2));
    let chunk = single_voxel(1, 1, 1);
    let snapshot = ChunkSnapshot::isolated(&chunk);

    assert_eq!(cache.enqueue(snapshot.clone()), Enqueued::Queued);
    assert_ne!(cache.enqueue(snapshot.clone()), Enqueued::Queued);

    assert!(wait_for(|| cache.stats().published == 1));
    assert_eq!(cache.enqueue(snapshot), Enqueued::AlreadyReady);

    let artifact = cache.try_collect(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(artifact.id, chunk.id());
    assert_eq!(artifact.revision, chunk.revision());
    assert_eq!(artifact.mesh.quad_count(), 6);
    assert!(cache.try_collect(ChunkPos::new(0, 0)).is_none());
    assert_eq!(cache.stats().queued, 1);
    assert!(!chunk.is_dirty());
    cache.shutdown();
}

#[test]
fn newer_revision_wins() {
    let cache = MeshCache::with_mesher(config(2), slow_mesher);
    let mut chunk = single_voxel(1, 1, 1);
    assert_eq!(cache.enqueue(ChunkSnapshot::isolated(&chunk)), Enqueued::Queued);
    chunk.set(LocalBlockPos::new(8, 8, 8), DIRT);
    assert_eq!(cache.enqueue(ChunkSnapshot::isolated(&chunk)), Enqueued::Queued);

    assert!(wait_for(|| {
        let stats = cache.stats();
        stats.published + stats.discarded == 2
    }));
    let artifact = cache.try_collect(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(artifact.revision, chunk.revision());
    assert_eq!(artifact.mesh.quad_count(), 12);
    assert!(!chunk.is_dirty());
}

#[test]
fn invalidated_results_are_never_published() {
    let cache = MeshCache::with_mesher(config(1), slow_mesher);
    let chunk = single_voxel(2, 2, 2);
    cache.enqueue(ChunkSnapshot::isolated(&chunk));
    cache.invalidate(ChunkPos::new(0, 0));
    assert!(!cache.is_pending(ChunkPos::new(0, 0)));

    assert!(wait_for(|| cache.stats().discarded == 1));
    assert!(cache.try_collect(ChunkPos::new(0, 0)).is_none());
    assert_eq!(cache.stats().published, 0);
    assert!(chunk.is_dirty());
}

#[test]
fn evicted_and_reloaded_chunk_is_a_different_instance() {
    let cache = MeshCache::with_mesher(config(1), slow_mesher);
    let old = single_voxel(2, 2, 2);
    cache.enqueue(ChunkSnapshot::isolated(&old));

    // Same coordinate and revision, new instance: not deduplicated.
    let reloaded = single_voxel(2, 2, 2);
    assert_eq!(old.revision(), reloaded.revision());
    assert_eq!(cache.enqueue(ChunkSnapshot::isolated(&reloaded)), Enqueued::Queued);

    assert!(wait_for(|| cache.stats().published >= 1 && cache.pending_count() == 0));
    let artifact = cache.try_collect(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(artifact.id, reloaded.id());
}

#[test]
fn panicking_job_is_counted_and_workers_survive() {
    let cache = MeshCache::with_mesher(config(1), exploding_mesher);
    let mut poisoned = Chunk::new_empty(ChunkPos::new(5, 5));
    poisoned.set(LocalBlockPos::new(0, 0, 0), POISON);
    let snapshot = ChunkSnapshot::isolated(&poisoned);

    assert_eq!(cache.enqueue(snapshot.clone()), Enqueued::Queued);
    assert!(wait_for(|| cache.stats().failed == 1));
    assert!(cache.try_collect(ChunkPos::new(5, 5)).is_none());
    assert!(poisoned.is_dirty());

    // The failed stamp was cleared, so the chunk can be retried.
    assert!(wait_for(|| !cache.is_pending(ChunkPos::new(5, 5))));
    assert_eq!(cache.enqueue(snapshot), Enqueued::Queued);

    let healthy = single_voxel(3, 3, 3);
    cache.enqueue(ChunkSnapshot::isolated(&healthy));
    assert!(wait_for(|| cache.stats().published == 1));
    assert!(cache.try_collect(ChunkPos::new(0, 0)).is_some());
    assert_eq!(cache.worker_count(), 1);
}

#[test]
fn world_snapshots_feed_the_cache() {
    let world = empty_world();
    world.set_block(BlockPos::new(-1, 3, -1), STONE);
    world.set_block(BlockPos::new(0, 3, -1), STONE);

    let cache = MeshCache::start(config(2));
    for pos in world.take_dirty_chunks() {
        let snapshot = world.snapshot(pos).unwrap();
        assert_eq!(cache.enqueue(snapshot), Enqueued::Queued);
    }
    assert!(wait_for(|| cache.ready_count() == 2));

    let west = cache.try_collect(ChunkPos::new(-1, -1)).unwrap();
    let east = cache.try_collect(ChunkPos::new(0, -1)).unwrap();
    // The shared face between the two voxels is culled on both sides.
    assert_eq!(west.mesh.quad_count(), 5);
    assert_eq!(east.mesh.quad_count(), 5);
    assert!(!world.get_chunk(&ChunkPos::new(-1, -1)).unwrap().is_dirty());
}

#[test]
fn neighbor_edit_after_publish_remeshes_the_seam() {
    let world = empty_world();
    world.set_block(BlockPos::new(0, 5, 5), STONE);
    world.set_block(BlockPos::new(-1, 5, 5), STONE);
    let center = ChunkPos::new(0, 0);
    let west = ChunkPos::new(-1, 0);

    let cache = MeshCache::start(config(2));
    for pos in world.take_dirty_chunks() {
        cache.enqueue(world.snapshot(pos).unwrap());
    }
    assert!(wait_for(|| cache.stats().published == 2));

    // Both artifacts are published but not yet collected.
    let touched = world.set_block(BlockPos::new(-1, 5, 5), BlockId::AIR);
    assert_eq!(touched, vec![west, center]);
    assert!(world.get_chunk(&center).unwrap().is_dirty());

    let snapshot = world.snapshot(center).unwrap();
    let expected = greedy_quads(&snapshot).len();
    assert_eq!(expected, 6);
    assert_eq!(cache.enqueue(snapshot), Enqueued::Queued);
    assert!(wait_for(|| cache.stats().published == 3));

    let artifact = cache.try_collect(center).unwrap();
    assert_eq!(artifact.revision, world.get_chunk(&center).unwrap().revision());
    assert_eq!(artifact.mesh.quad_count(), expected);
    assert!(!world.get_chunk(&center).unwrap().is_dirty());
    cache.shutdown();
}

#[test]
fn shutdown_with_queued_work_returns() {
    let cache = MeshCache::with_mesher(config(1), slow_mesher);
    for x in 0..5 {
        let chunk = Chunk::new_filled(ChunkPos::new(x, 0), STONE);
        cache.enqueue(ChunkSnapshot::isolated(&chunk));
    }
    let started = Instant::now();
    cache.shutdown();
    assert!(started.elapsed() < Duration::from_secs(2));
}
