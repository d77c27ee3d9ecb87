//! Durable chunk storage.

pub mod codec;
pub mod fs;

pub use codec::{CODEC_VERSION, CodecError};
pub use fs::FsChunkStore;

use std::io;

use dashmap::DashMap;
use thiserror::Error;

use crate::generation::WorldGenerator;
use crate::world::chunk::Chunk;
use crate::world::position::ChunkPos;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chunk store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Where evicted chunks go and where missing chunks are looked up first.
///
/// Implementations are shared with the loader's rayon tasks, hence
/// `Send + Sync` and `&self` everywhere.
pub trait ChunkStore: Send + Sync {
    fn save(&self, chunk: &Chunk) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing was ever saved for `pos`.
    fn load(&self, pos: ChunkPos, generator: &WorldGenerator) -> Result<Option<Chunk>, StoreError>;

    fn has(&self, pos: ChunkPos) -> bool;
}

/// In-memory store holding encoded records. Used by tests and benchmarks.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<ChunkPos, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store raw bytes for a coordinate, bypassing the codec.
    pub fn insert_raw(&self, pos: ChunkPos, bytes: Vec<u8>) {
        self.records.insert(pos, bytes);
    }
}

impl ChunkStore for MemoryStore {
    fn save(&self, chunk: &Chunk) -> Result<(), StoreError> {
        let bytes = codec::encode(chunk)?;
        self.records.insert(chunk.pos(), bytes);
        Ok(())
    }

    fn load(&self, pos: ChunkPos, generator: &WorldGenerator) -> Result<Option<Chunk>, StoreError> {
        let Some(bytes) = self.records.get(&pos).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        Ok(Some(codec::decode_at(&bytes, pos, generator)?))
    }

    fn has(&self, pos: ChunkPos) -> bool {
        self.records.contains_key(&pos)
    }
}
