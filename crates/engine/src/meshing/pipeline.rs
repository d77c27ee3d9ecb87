//! Off-thread meshing with a per-coordinate result cache.
//!
//! The simulation context enqueues snapshots and later polls for finished
//! meshes with [`MeshCache::try_collect`]; neither call blocks on a worker.
//!
//! Every enqueued job is stamped with the snapshot's `(ChunkId, revision)`.
//! The stamp is recorded as the coordinate's pending entry, and a worker only
//! publishes its result while still holding that entry with an equal stamp.
//! A job superseded by a newer revision, or by [`MeshCache::invalidate`] after
//! the chunk was evicted, is discarded instead of overwriting fresher state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{ChunkSnapshot, Mesh, MeshArtifact, greedy};
use crate::world::chunk::ChunkId;
use crate::world::position::ChunkPos;

/// Mesher run by the workers. Swappable so callers can plug in their own
/// mesher (or a failing one in tests).
pub type MeshFn = fn(&ChunkSnapshot, &Arc<str>) -> Mesh;

#[derive(Debug, Clone)]
pub struct MeshCacheConfig {
    pub workers: usize,
    /// How long an idle worker waits on the queue before re-checking the
    /// stop flag.
    pub idle_wait: Duration,
    /// Texture key attached to every produced mesh.
    pub texture: Arc<str>,
}

impl Default for MeshCacheConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1);
        Self {
            workers,
            idle_wait: Duration::from_millis(50),
            texture: Arc::from("terrain"),
        }
    }
}

/// Outcome of [`MeshCache::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The same chunk instance at the same revision is already queued or
    /// being meshed.
    AlreadyPending,
    /// An uncollected artifact at this revision or newer is waiting.
    AlreadyReady,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub queued: u64,
    pub published: u64,
    pub failed: u64,
    pub discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    id: ChunkId,
    revision: u64,
}

struct Job {
    snapshot: ChunkSnapshot,
    stamp: Stamp,
}

struct Shared {
    pending: DashMap<ChunkPos, Stamp>,
    ready: DashMap<ChunkPos, MeshArtifact>,
    stop: AtomicBool,
    queued: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Worker pool plus pending/ready maps.
pub struct MeshCache {
    shared: Arc<Shared>,
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl MeshCache {
    /// Start the pool with the greedy mesher.
    pub fn start(config: MeshCacheConfig) -> Self {
        Self::with_mesher(config, greedy::mesh_snapshot)
    }

    pub fn with_mesher(config: MeshCacheConfig, mesher: MeshFn) -> Self {
        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            ready: DashMap::new(),
            stop: AtomicBool::new(false),
            queued: AtomicU64::new(0),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..config.workers.max(1))
            .map(|n| {
                let shared = Arc::clone(&shared);
                let rx = rx.clone();
                let texture = Arc::clone(&config.texture);
                let idle_wait = config.idle_wait;
                std::thread::Builder::new()
                    .name(format!("mesh-worker-{n}"))
                    .spawn(move || worker_loop(shared, rx, mesher, texture, idle_wait))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn mesh worker: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!("Mesh cache started with {} workers", workers.len());

        Self {
            shared,
            jobs: Some(tx),
            workers,
        }
    }

    /// Queue a snapshot for meshing unless an equivalent job or result
    /// already exists. A newer revision of a pending chunk replaces the
    /// pending stamp, so the older job's result will be discarded.
    pub fn enqueue(&self, snapshot: ChunkSnapshot) -> Enqueued {
        let pos = snapshot.pos();
        let stamp = Stamp {
            id: snapshot.id(),
            revision: snapshot.revision(),
        };

        if let Some(ready) = self.shared.ready.get(&pos) {
            if ready.id == stamp.id && ready.revision >= stamp.revision {
                return Enqueued::AlreadyReady;
            }
        }

        match self.shared.pending.entry(pos) {
            Entry::Occupied(entry) if *entry.get() == stamp => Enqueued::AlreadyPending,
            Entry::Occupied(mut entry) => {
                entry.insert(stamp);
                self.send(Job { snapshot, stamp });
                Enqueued::Queued
            }
            Entry::Vacant(entry) => {
                entry.insert(stamp);
                self.send(Job { snapshot, stamp });
                Enqueued::Queued
            }
        }
    }

    fn send(&self, job: Job) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        let pos = job.snapshot.pos();
        if jobs.send(job).is_err() {
            tracing::error!("Mesh queue closed, dropping job for chunk ({}, {})", pos.x, pos.z);
            return;
        }
        self.shared.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the finished mesh for `pos`, if any. Never blocks.
    pub fn try_collect(&self, pos: ChunkPos) -> Option<MeshArtifact> {
        self.shared.ready.remove(&pos).map(|(_, artifact)| artifact)
    }

    /// Forget everything about `pos`. Results still in flight are dropped
    /// when they finish.
    pub fn invalidate(&self, pos: ChunkPos) {
        self.shared.pending.remove(&pos);
        self.shared.ready.remove(&pos);
    }

    pub fn is_pending(&self, pos: ChunkPos) -> bool {
        self.shared.pending.contains_key(&pos)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn ready_count(&self) -> usize {
        self.shared.ready.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            queued: self.shared.queued.load(Ordering::Relaxed),
            published: self.shared.published.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }

    /// Stop the workers and wait for them. Queued jobs that have not started
    /// are dropped.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.jobs = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Mesh worker exited abnormally");
            }
        }
    }
}

impl Drop for MeshCache {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    jobs: Receiver<Job>,
    mesher: MeshFn,
    texture: Arc<str>,
    idle_wait: Duration,
) {
    while !shared.stop.load(Ordering::Acquire) {
        let job = match jobs.recv_timeout(idle_wait) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        shared.run(job, mesher, &texture);
    }
}

impl Shared {
    fn is_current(&self, pos: ChunkPos, stamp: Stamp) -> bool {
        self.pending.get(&pos).is_some_and(|pending| *pending == stamp)
    }

    fn run(&self, job: Job, mesher: MeshFn, texture: &Arc<str>) {
        let pos = job.snapshot.pos();
        if !self.is_current(pos, job.stamp) {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mesh = match panic::catch_unwind(AssertUnwindSafe(|| mesher(&job.snapshot, texture))) {
            Ok(mesh) => mesh,
            Err(_) => {
                tracing::error!(
                    "Mesh job for chunk ({}, {}) revision {} panicked",
                    pos.x,
                    pos.z,
                    job.stamp.revision
                );
                self.failed.fetch_add(1, Ordering::Relaxed);
                // Clear our stamp so the chunk can be queued again.
                self.pending.remove_if(&pos, |_, pending| *pending == job.stamp);
                return;
            }
        };

        // Publish while holding the pending entry, so `invalidate` and newer
        // enqueues serialize against it.
        match self.pending.entry(pos) {
            Entry::Occupied(entry) if *entry.get() == job.stamp => {
                job.snapshot.mark_meshed();
                self.ready.insert(
                    pos,
                    MeshArtifact {
                        pos,
                        id: job.stamp.id,
                        revision: job.stamp.revision,
                        mesh,
                    },
                );
                entry.remove();
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
