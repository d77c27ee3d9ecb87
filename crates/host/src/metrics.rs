//! Lock-free session counters.
//!
//! The tick loop updates these with relaxed atomics; readers (the status
//! dump, tests) take a [`MetricsSnapshot`] whenever they like.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

use chunkstream_engine::meshing::MeshStats;

pub struct Metrics {
    ticks: AtomicU64,
    tick_ns_sum: AtomicU64,
    chunks_loaded: AtomicU64,
    chunks_generated: AtomicU64,
    chunks_evicted: AtomicU64,
    persist_failures: AtomicU64,
    meshes_enqueued: AtomicU64,
    meshes_collected: AtomicU64,
    edits: AtomicU64,

    // Tick duration histogram
    hist_under_1ms: AtomicU64,
    hist_1_5ms: AtomicU64,
    hist_5_20ms: AtomicU64,
    hist_20_50ms: AtomicU64,
    hist_over_50ms: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_ns_sum: AtomicU64::new(0),
            chunks_loaded: AtomicU64::new(0),
            chunks_generated: AtomicU64::new(0),
            chunks_evicted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            meshes_enqueued: AtomicU64::new(0),
            meshes_collected: AtomicU64::new(0),
            edits: AtomicU64::new(0),
            hist_under_1ms: AtomicU64::new(0),
            hist_1_5ms: AtomicU64::new(0),
            hist_5_20ms: AtomicU64::new(0),
            hist_20_50ms: AtomicU64::new(0),
            hist_over_50ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_tick(&self, duration: Duration) {
        self.ticks.fetch_add(1, Relaxed);
        self.tick_ns_sum
            .fetch_add(duration.as_nanos() as u64, Relaxed);

        let bucket = match duration.as_millis() {
            0 => &self.hist_under_1ms,
            1..=4 => &self.hist_1_5ms,
            5..=19 => &self.hist_5_20ms,
            20..=49 => &self.hist_20_50ms,
            _ => &self.hist_over_50ms,
        };
        bucket.fetch_add(1, Relaxed);
    }

    pub fn record_streaming(&self, loaded: usize, generated: usize, evicted: usize) {
        self.chunks_loaded.fetch_add(loaded as u64, Relaxed);
        self.chunks_generated.fetch_add(generated as u64, Relaxed);
        self.chunks_evicted.fetch_add(evicted as u64, Relaxed);
    }

    pub fn record_persist_failures(&self, count: usize) {
        self.persist_failures.fetch_add(count as u64, Relaxed);
    }

    pub fn record_enqueued(&self, count: usize) {
        self.meshes_enqueued.fetch_add(count as u64, Relaxed);
    }

    pub fn record_collected(&self, count: usize) {
        self.meshes_collected.fetch_add(count as u64, Relaxed);
    }

    pub fn record_edit(&self) {
        self.edits.fetch_add(1, Relaxed);
    }

    /// Read all counters. `resident` and `mesh` are gauges owned elsewhere.
    pub fn snapshot(&self, resident: usize, mesh: MeshStats) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            ticks: self.ticks.load(Relaxed),
            tick_ns_sum: self.tick_ns_sum.load(Relaxed),
            resident_chunks: resident as u64,
            chunks_loaded: self.chunks_loaded.load(Relaxed),
            chunks_generated: self.chunks_generated.load(Relaxed),
            chunks_evicted: self.chunks_evicted.load(Relaxed),
            persist_failures: self.persist_failures.load(Relaxed),
            meshes_enqueued: self.meshes_enqueued.load(Relaxed),
            meshes_collected: self.meshes_collected.load(Relaxed),
            mesh_jobs_failed: mesh.failed,
            mesh_jobs_discarded: mesh.discarded,
            edits: self.edits.load(Relaxed),
            tick_hist: [
                self.hist_under_1ms.load(Relaxed),
                self.hist_1_5ms.load(Relaxed),
                self.hist_5_20ms.load(Relaxed),
                self.hist_20_50ms.load(Relaxed),
                self.hist_over_50ms.load(Relaxed),
            ],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub ticks: u64,
    pub tick_ns_sum: u64,
    pub resident_chunks: u64,
    pub chunks_loaded: u64,
    pub chunks_generated: u64,
    pub chunks_evicted: u64,
    pub persist_failures: u64,
    pub meshes_enqueued: u64,
    pub meshes_collected: u64,
    pub mesh_jobs_failed: u64,
    pub mesh_jobs_discarded: u64,
    pub edits: u64,
    /// `[<1ms, 1-5ms, 5-20ms, 20-50ms, >50ms]`
    pub tick_hist: [u64; 5],
}
