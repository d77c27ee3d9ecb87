//! The per-tick loop that ties streaming, meshing and persistence together.
//!
//! Each tick:
//! 1. stream chunks around the observer (evicted chunks are persisted),
//! 2. drop mesh state for evicted chunks,
//! 3. snapshot dirty chunks and hand them to the mesh cache,
//! 4. collect whatever meshes the workers have finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use chunkstream_engine::generation::{WorldGenerator, ZoneTable, ZonedGenerator};
use chunkstream_engine::meshing::{Enqueued, MeshArtifact, MeshCache};
use chunkstream_engine::storage::{ChunkStore, FsChunkStore};
use chunkstream_engine::streaming::{UpdateReport, WorldManager};
use chunkstream_engine::world::block::BlockId;
use chunkstream_engine::world::position::{BlockPos, ChunkPos};

use crate::block::BlockRegistry;
use crate::config::{GeneratorKind, HostConfig, WorldSection};
use crate::metrics::{Metrics, MetricsSnapshot};

/// Build the configured terrain generator with block ids from `registry`.
pub fn build_generator(world: &WorldSection, registry: &BlockRegistry) -> WorldGenerator {
    match world.generator {
        GeneratorKind::Flat => registry.flat_generator().into(),
        GeneratorKind::Zoned => {
            ZonedGenerator::new(ZoneTable::standard(), registry.zone_palette(), world.seed).into()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub streaming: UpdateReport,
    /// Chunks that could not be persisted this tick and stayed resident.
    pub persist_failures: usize,
    pub enqueued: usize,
    pub collected: usize,
    pub duration: Duration,
}

pub struct Session<S: ChunkStore = FsChunkStore> {
    manager: WorldManager<S>,
    meshes: MeshCache,
    registry: BlockRegistry,
    metrics: Arc<Metrics>,
    /// Latest collected mesh per resident chunk, as a renderer would hold it.
    visible: HashMap<ChunkPos, MeshArtifact>,
}

impl Session<FsChunkStore> {
    /// Open a session saving into the configured world directory.
    pub fn open(config: &HostConfig, registry: BlockRegistry) -> Result<Self> {
        let store = FsChunkStore::open(&config.world.save_dir).with_context(|| {
            format!("opening world directory {}", config.world.save_dir.display())
        })?;
        Self::with_store(config, registry, store)
    }
}

impl<S: ChunkStore> Session<S> {
    pub fn with_store(config: &HostConfig, registry: BlockRegistry, store: S) -> Result<Self> {
        let generator = build_generator(&config.world, &registry);
        let generator_name = generator.name();
        let manager = WorldManager::new(generator, store, config.streaming.to_streaming_config())
            .context("invalid streaming configuration")?;
        let meshes = MeshCache::start(config.meshing.to_mesh_cache_config());

        tracing::info!(
            "Session started: {} generator, seed {}, capacity {}, {} mesh workers",
            generator_name,
            config.world.seed,
            config.streaming.capacity,
            meshes.worker_count(),
        );

        Ok(Self {
            manager,
            meshes,
            registry,
            metrics: Arc::new(Metrics::new()),
            visible: HashMap::new(),
        })
    }

    pub fn manager(&self) -> &WorldManager<S> {
        &self.manager
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn mesh(&self, pos: ChunkPos) -> Option<&MeshArtifact> {
        self.visible.get(&pos)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn pending_meshes(&self) -> usize {
        self.meshes.pending_count()
    }

    /// Finished meshes not yet collected by a tick.
    pub fn ready_meshes(&self) -> usize {
        self.meshes.ready_count()
    }

    pub fn block_name(&self, pos: BlockPos) -> &str {
        self.registry.name_of(self.manager.get_block(pos))
    }

    /// Whether the block at `pos` is registered as solid. Unregistered ids,
    /// air and non-resident positions are not.
    pub fn is_solid_at(&self, pos: BlockPos) -> bool {
        self.registry
            .definition(self.manager.get_block(pos))
            .is_some_and(|definition| definition.solid)
    }

    /// Standing position on the ground of column `(x, z)`.
    pub fn spawn_position(&mut self, x: i64, z: i64) -> BlockPos {
        let spawn = self.manager.surface_spawn_position(x, z);
        tracing::debug!("Spawn for column ({}, {}) at y={}", x, z, spawn.y);
        spawn
    }

    pub fn tick(&mut self, observer: BlockPos) -> TickReport {
        let started = Instant::now();

        let (streaming, persist_failures) = match self.manager.update_loaded_chunks(observer) {
            Ok(report) => (report, 0),
            Err(e) => {
                tracing::warn!("{}; retrying next tick", e);
                self.metrics.record_persist_failures(e.failures.len());
                let failed = e.failures.len();
                (e.report, failed)
            }
        };
        self.metrics.record_streaming(
            streaming.loaded.len(),
            streaming.generated.len(),
            streaming.evicted.len(),
        );

        for pos in &streaming.evicted {
            self.meshes.invalidate(*pos);
            self.visible.remove(pos);
        }

        let enqueued = self.enqueue_dirty();
        let collected = self.collect_ready();

        let duration = started.elapsed();
        self.metrics.record_tick(duration);
        TickReport {
            streaming,
            persist_failures,
            enqueued,
            collected,
            duration,
        }
    }

    /// Queue every chunk that needs a new mesh: chunks in the world's remesh
    /// set, plus dirty chunks with no job in flight (a previous job failed).
    fn enqueue_dirty(&mut self) -> usize {
        let world = self.manager.world();
        let mut candidates = world.take_dirty_chunks();
        for entry in world.iter_chunks() {
            let pos = *entry.key();
            if entry.value().is_dirty() && !self.meshes.is_pending(pos) && !candidates.contains(&pos) {
                candidates.push(pos);
            }
        }

        let mut enqueued = 0;
        for pos in candidates {
            let Some(snapshot) = world.snapshot(pos) else {
                continue;
            };
            if self.meshes.enqueue(snapshot) == Enqueued::Queued {
                enqueued += 1;
            }
        }
        self.metrics.record_enqueued(enqueued);
        enqueued
    }

    fn collect_ready(&mut self) -> usize {
        let mut collected = 0;
        for pos in self.manager.resident() {
            if let Some(artifact) = self.meshes.try_collect(pos) {
                self.visible.insert(pos, artifact);
                collected += 1;
            }
        }
        self.metrics.record_collected(collected);
        collected
    }

    /// Place a block. Returns the chunks that will be remeshed next tick.
    pub fn edit(&mut self, pos: BlockPos, block: BlockId) -> Vec<ChunkPos> {
        let touched = self.manager.set_block(pos, block);
        if !touched.is_empty() {
            self.metrics.record_edit();
            tracing::debug!(
                "Placed {} at ({}, {}, {}), {} chunk(s) to remesh",
                self.registry.name_of(block),
                pos.x,
                pos.y,
                pos.z,
                touched.len()
            );
        }
        touched
    }

    pub fn status(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.manager.resident_count(), self.meshes.stats())
    }

    /// Stop the mesh workers and persist every resident chunk.
    pub fn shutdown(self) -> Result<usize> {
        let Session { manager, meshes, .. } = self;
        meshes.shutdown();
        let saved = manager.flush_all().context("saving resident chunks")?;
        tracing::info!("Session stopped, {} chunks saved", saved);
        Ok(saved)
    }
}
