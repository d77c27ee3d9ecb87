//! Benchmark: synchronous greedy meshing vs the background mesh workers.
//!
//! Generates a square region of zoned terrain, meshes every chunk on the
//! calling thread, then feeds the same snapshots through a `MeshCache` and
//! waits for all results.
//! Run with: `cargo run --release -p chunkstream-host --example bench_meshing`

use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkstream_engine::generation::{ZoneTable, ZonedGenerator};
use chunkstream_engine::meshing::{MeshCache, MeshCacheConfig, mesh_snapshot};
use chunkstream_engine::world::World;
use chunkstream_engine::world::position::ChunkPos;

use chunkstream_host::block::BlockRegistry;

fn main() {
    let side: i32 = 12;
    let chunks = (side * side) as usize;
    let registry = BlockRegistry::standard();
    let generator = ZonedGenerator::new(ZoneTable::standard(), registry.zone_palette(), 42);

    println!("=== chunkstream: meshing benchmark ===\n");
    println!("  {} chunks ({}x{} grid), zoned terrain, seed 42\n", chunks, side, side);

    let world = World::new(generator.into());
    let t0 = Instant::now();
    let positions: Vec<ChunkPos> = (0..side)
        .flat_map(|x| (0..side).map(move |z| ChunkPos::new(x, z)))
        .collect();
    for pos in &positions {
        world.load_chunk(*pos);
    }
    println!("  Generation: {:>8.2?}", t0.elapsed());

    let snapshots: Vec<_> = positions.iter().filter_map(|pos| world.snapshot(*pos)).collect();
    let texture: Arc<str> = Arc::from("terrain");

    // --- Synchronous ---
    let t0 = Instant::now();
    let sync_quads: Vec<usize> = snapshots
        .iter()
        .map(|snapshot| mesh_snapshot(snapshot, &texture).quad_count())
        .collect();
    let dt_sync = t0.elapsed();
    let total: usize = sync_quads.iter().sum();
    println!("  Synchronous: {:>7} quads in {:>8.2?}", total, dt_sync);

    // --- Workers ---
    let config = MeshCacheConfig {
        idle_wait: Duration::from_millis(1),
        ..MeshCacheConfig::default()
    };
    let workers = config.workers;
    let cache = MeshCache::start(config);

    let t0 = Instant::now();
    for snapshot in snapshots {
        cache.enqueue(snapshot);
    }
    let mut worker_quads = vec![None; positions.len()];
    let mut remaining = positions.len();
    while remaining > 0 {
        for (slot, pos) in positions.iter().enumerate() {
            if worker_quads[slot].is_some() {
                continue;
            }
            if let Some(artifact) = cache.try_collect(*pos) {
                worker_quads[slot] = Some(artifact.mesh.quad_count());
                remaining -= 1;
            }
        }
        std::thread::yield_now();
    }
    let dt_workers = t0.elapsed();
    let stats = cache.stats();
    cache.shutdown();

    println!(
        "  {} workers:  {:>7} meshes in {:>8.2?} ({} failed)",
        workers, stats.published, dt_workers, stats.failed
    );

    let speedup = dt_sync.as_secs_f64() / dt_workers.as_secs_f64();
    println!("\n  Speedup: {:.2}x", speedup);

    // --- Verify identical ---
    let mismatches = sync_quads
        .iter()
        .zip(&worker_quads)
        .filter(|(sync, worker)| Some(**sync) != **worker)
        .count();

    if mismatches == 0 {
        println!("  Verification: PASS (identical quad counts for all {} chunks)", chunks);
    } else {
        println!("  Verification: FAIL ({} chunks differ)", mismatches);
    }
}
