//! Chunk streaming around a moving observer.
//!
//! [`WorldManager`] keeps the chunks near the observer resident, loads missing
//! ones from a [`ChunkStore`] (or the generator when nothing was saved), and
//! evicts the rest in least-recently-used order, persisting each chunk before
//! it is dropped.

use std::collections::HashSet;
use std::time::Instant;

use indexmap::IndexSet;
use rayon::prelude::*;
use thiserror::Error;

use crate::generation::WorldGenerator;
use crate::meshing::ChunkSnapshot;
use crate::storage::{ChunkStore, StoreError};
use crate::world::{World, WorldView};
use crate::world::block::BlockId;
use crate::world::chunk::{CHUNK_WIDTH, Chunk};
use crate::world::position::{BlockPos, ChunkPos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Maximum resident chunk count after a successful update.
    pub capacity: usize,
    /// Load radius in blocks while the observer is at or above `surface_level`.
    pub surface_radius: u32,
    /// Load radius in blocks while the observer is below `surface_level`.
    pub underground_radius: u32,
    pub surface_level: i64,
    /// Extra chunk rings kept around the needed set; chunks there leave only
    /// under capacity pressure.
    pub retain_margin: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            surface_radius: 96,
            underground_radius: 48,
            surface_level: 64,
            retain_margin: 0,
        }
    }
}

impl StreamingConfig {
    /// The largest needed set either radius can produce.
    pub fn max_needed(&self) -> usize {
        let radius = chunk_radius(self.surface_radius.max(self.underground_radius));
        needed_chunks(ChunkPos::new(0, 0), radius).len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk capacity {capacity} is below the {needed} chunks a full view radius needs")]
    CapacityTooSmall { capacity: usize, needed: usize },
}

/// What one streaming update did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub center: ChunkPos,
    pub chunk_radius: u32,
    pub needed: usize,
    /// Chunks restored from the store.
    pub loaded: Vec<ChunkPos>,
    /// Chunks built by the generator.
    pub generated: Vec<ChunkPos>,
    /// Chunks persisted and dropped.
    pub evicted: Vec<ChunkPos>,
    pub resident: usize,
}

/// Some evicted chunks could not be persisted. They are still resident and
/// will be retried on the next update; everything else in `report` happened.
#[derive(Debug, Error)]
#[error("failed to persist {} chunk(s) during eviction", .failures.len())]
pub struct EvictionError {
    pub failures: Vec<(ChunkPos, StoreError)>,
    pub report: UpdateReport,
}

#[derive(Debug, Error)]
#[error("failed to persist {} chunk(s), {saved} saved", .failures.len())]
pub struct FlushError {
    pub saved: usize,
    pub failures: Vec<(ChunkPos, StoreError)>,
}

/// Block radius to chunk radius, rounding up.
pub fn chunk_radius(block_radius: u32) -> u32 {
    block_radius.div_ceil(CHUNK_WIDTH as u32)
}

/// Every chunk within `chunk_radius` of `center` (circular test), nearest
/// first.
pub fn needed_chunks(center: ChunkPos, chunk_radius: u32) -> Vec<ChunkPos> {
    let r = chunk_radius as i32;
    let limit = (chunk_radius as i64) * (chunk_radius as i64);
    let mut needed: Vec<ChunkPos> = (-r..=r)
        .flat_map(|dx| (-r..=r).map(move |dz| ChunkPos::new(center.x + dx, center.z + dz)))
        .filter(|pos| pos.distance_squared(center) <= limit)
        .collect();
    needed.sort_by_key(|pos| pos.distance_squared(center));
    needed
}

/// Streaming cache over a [`World`].
pub struct WorldManager<S: ChunkStore> {
    world: World,
    store: S,
    config: StreamingConfig,
    /// Resident chunks, least recently used first.
    lru: IndexSet<ChunkPos>,
}

impl<S: ChunkStore> WorldManager<S> {
    pub fn new(
        generator: WorldGenerator,
        store: S,
        config: StreamingConfig,
    ) -> Result<Self, ConfigError> {
        let needed = config.max_needed();
        if config.capacity < needed {
            return Err(ConfigError::CapacityTooSmall {
                capacity: config.capacity,
                needed,
            });
        }
        Ok(Self {
            world: World::new(generator),
            store,
            config,
            lru: IndexSet::new(),
        })
    }

    /// Read access to the resident world. Writes go through
    /// [`WorldManager::set_block`] so residency and persistence stay in step.
    pub fn world(&self) -> WorldView<'_> {
        WorldView::new(&self.world)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Resident chunk coordinates, least recently used first.
    pub fn resident(&self) -> Vec<ChunkPos> {
        self.lru.iter().copied().collect()
    }

    pub fn resident_count(&self) -> usize {
        self.lru.len()
    }

    pub fn is_resident(&self, pos: ChunkPos) -> bool {
        self.lru.contains(&pos)
    }

    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        self.world.get_block(pos)
    }

    /// Write a block, streaming its chunk in first (from the store if it was
    /// saved) so an edit never lands on a regenerated copy. Returns the chunks
    /// that need remeshing.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockId) -> Vec<ChunkPos> {
        if pos.local().is_none() {
            return Vec::new();
        }
        self.ensure_resident(pos.chunk());
        self.world.set_block(pos, block)
    }

    /// Where an observer dropped into column `(x, z)` should stand: one block
    /// above the highest non-air block of the surface band, or just above the
    /// band's floor when the column is empty there. Streams the column in.
    pub fn surface_spawn_position(&mut self, x: i64, z: i64) -> BlockPos {
        let range = self.world.generator().surface_range();
        let (min, max) = (*range.start(), *range.end());
        let column = BlockPos::new(x, min, z);
        if column.in_horizontal_range() {
            self.ensure_resident(column.chunk());
        }
        (min..=max)
            .rev()
            .map(|y| BlockPos::new(x, y, z))
            .find(|pos| !self.world.get_block(*pos).is_air())
            .map_or(BlockPos::new(x, min + 1, z), |ground| {
                BlockPos::new(x, ground.y + 1, z)
            })
    }

    /// Load (or generate) `pos` if it is not resident and mark it used.
    fn ensure_resident(&mut self, pos: ChunkPos) {
        if !self.world.has_chunk(pos) {
            let (chunk, _) = fetch(&self.store, self.world.generator(), pos);
            self.world.insert_chunk(chunk);
        }
        self.touch(pos);
    }

    pub fn snapshot(&self, pos: ChunkPos) -> Option<ChunkSnapshot> {
        self.world.snapshot(pos)
    }

    fn touch(&mut self, pos: ChunkPos) {
        self.lru.shift_remove(&pos);
        self.lru.insert(pos);
    }

    /// Bring the chunks around `observer` in and push surplus chunks out.
    pub fn update_loaded_chunks(&mut self, observer: BlockPos) -> Result<UpdateReport, EvictionError> {
        let started = Instant::now();
        let block_radius = if observer.y < self.config.surface_level {
            self.config.underground_radius
        } else {
            self.config.surface_radius
        };
        let radius = chunk_radius(block_radius);
        let center = observer.chunk();
        let needed = needed_chunks(center, radius);

        let mut report = UpdateReport {
            center,
            chunk_radius: radius,
            needed: needed.len(),
            ..UpdateReport::default()
        };

        // Load what is missing, in parallel.
        let missing: Vec<ChunkPos> = needed
            .iter()
            .copied()
            .filter(|pos| !self.world.has_chunk(*pos))
            .collect();
        let store = &self.store;
        let generator = self.world.generator();
        let fetched: Vec<(Chunk, bool)> = missing
            .par_iter()
            .map(|&pos| fetch(store, generator, pos))
            .collect();
        for (chunk, from_store) in fetched {
            let pos = chunk.pos();
            if from_store {
                report.loaded.push(pos);
            } else {
                report.generated.push(pos);
            }
            self.world.insert_chunk(chunk);
        }

        // Farthest first, so the nearest chunks end up most recently used.
        for pos in needed.iter().rev() {
            self.touch(*pos);
        }

        let removals = self.removal_set(center, radius, &needed);
        let mut failures = Vec::new();
        for pos in removals {
            match self.persist(pos) {
                Ok(()) => {
                    self.world.remove_chunk(pos);
                    self.lru.shift_remove(&pos);
                    report.evicted.push(pos);
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to persist chunk ({}, {}) on eviction, keeping it resident: {}",
                        pos.x,
                        pos.z,
                        e
                    );
                    failures.push((pos, e));
                }
            }
        }
        report.resident = self.lru.len();

        tracing::debug!(
            "Streaming update at ({}, {}) r={}: {} loaded, {} generated, {} evicted, {} resident ({:.2?})",
            center.x,
            center.z,
            radius,
            report.loaded.len(),
            report.generated.len(),
            report.evicted.len(),
            report.resident,
            started.elapsed(),
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(EvictionError { failures, report })
        }
    }

    /// Chunks outside the retain radius, then least recently used non-needed
    /// chunks while over capacity.
    fn removal_set(&self, center: ChunkPos, radius: u32, needed: &[ChunkPos]) -> Vec<ChunkPos> {
        let retain = (radius + self.config.retain_margin) as i64;
        let mut removals: Vec<ChunkPos> = self
            .lru
            .iter()
            .copied()
            .filter(|pos| pos.distance_squared(center) > retain * retain)
            .collect();

        let mut remaining = self.lru.len() - removals.len();
        if remaining > self.config.capacity {
            let needed: HashSet<ChunkPos> = needed.iter().copied().collect();
            let marked: HashSet<ChunkPos> = removals.iter().copied().collect();
            for pos in &self.lru {
                if remaining <= self.config.capacity {
                    break;
                }
                if needed.contains(pos) || marked.contains(pos) {
                    continue;
                }
                removals.push(*pos);
                remaining -= 1;
            }
        }
        removals
    }

    fn persist(&self, pos: ChunkPos) -> Result<(), StoreError> {
        let Some(chunk) = self.world.get_chunk(&pos) else {
            return Ok(());
        };
        self.store.save(&chunk)
    }

    /// Persist every resident chunk. Used at shutdown.
    pub fn flush_all(&self) -> Result<usize, FlushError> {
        let started = Instant::now();
        let mut saved = 0;
        let mut failures = Vec::new();
        for pos in &self.lru {
            match self.persist(*pos) {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::error!("Failed to persist chunk ({}, {}): {}", pos.x, pos.z, e);
                    failures.push((*pos, e));
                }
            }
        }
        tracing::info!("Flushed {} chunks ({:.2?})", saved, started.elapsed());
        if failures.is_empty() {
            Ok(saved)
        } else {
            Err(FlushError { saved, failures })
        }
    }
}

/// Load `pos` from the store, falling back to the generator. The flag is
/// true when the chunk came from the store.
fn fetch<S: ChunkStore>(store: &S, generator: &WorldGenerator, pos: ChunkPos) -> (Chunk, bool) {
    match store.load(pos, generator) {
        Ok(Some(chunk)) => (chunk, true),
        Ok(None) => (Chunk::generated(pos, generator), false),
        Err(e) => {
            tracing::warn!(
                "Could not load chunk ({}, {}) from store, regenerating: {}",
                pos.x,
                pos.z,
                e
            );
            (Chunk::generated(pos, generator), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_rounds_up_to_whole_chunks() {
        assert_eq!(chunk_radius(0), 0);
        assert_eq!(chunk_radius(1), 1);
        assert_eq!(chunk_radius(16), 1);
        assert_eq!(chunk_radius(17), 2);
    }

    #[test]
    fn needed_set_is_circular_and_nearest_first() {
        let center = ChunkPos::new(3, -2);
        let needed = needed_chunks(center, 2);
        assert_eq!(needed.len(), 13);
        assert_eq!(needed[0], center);
        assert!(!needed.contains(&ChunkPos::new(5, 0)));
        assert!(needed.contains(&ChunkPos::new(5, -2)));
        let distances: Vec<i64> = needed.iter().map(|p| p.distance_squared(center)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_radius_needs_only_the_center() {
        assert_eq!(needed_chunks(ChunkPos::new(0, 0), 0), vec![ChunkPos::new(0, 0)]);
    }

    #[test]
    fn max_needed_uses_the_larger_radius() {
        let config = StreamingConfig {
            surface_radius: 16,
            underground_radius: 32,
            ..StreamingConfig::default()
        };
        assert_eq!(config.max_needed(), 13);
    }
}
