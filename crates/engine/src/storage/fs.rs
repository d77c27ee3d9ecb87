use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{ChunkStore, StoreError, codec};
use crate::generation::WorldGenerator;
use crate::world::chunk::Chunk;
use crate::world::position::ChunkPos;

/// One file per chunk, `c.<x>.<z>.chunk`, under a single directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-save leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    dir: PathBuf,
}

impl FsChunkStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, pos: ChunkPos) -> PathBuf {
        self.dir.join(format!("c.{}.{}.chunk", pos.x, pos.z))
    }

    /// Coordinates of every record on disk. Unrelated files are skipped.
    pub fn saved_chunks(&self) -> io::Result<Vec<ChunkPos>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match parse_file_name(name) {
                Some(pos) => found.push(pos),
                None => tracing::debug!("Skipping unexpected file in chunk dir: {}", name),
            }
        }
        found.sort();
        Ok(found)
    }
}

fn parse_file_name(name: &str) -> Option<ChunkPos> {
    let rest = name.strip_prefix("c.")?.strip_suffix(".chunk")?;
    let (x, z) = rest.split_once('.')?;
    Some(ChunkPos::new(x.parse().ok()?, z.parse().ok()?))
}

impl ChunkStore for FsChunkStore {
    fn save(&self, chunk: &Chunk) -> Result<(), StoreError> {
        let bytes = codec::encode(chunk)?;
        let path = self.path_for(chunk.pos());
        let tmp = path.with_extension("chunk.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, pos: ChunkPos, generator: &WorldGenerator) -> Result<Option<Chunk>, StoreError> {
        let bytes = match fs::read(self.path_for(pos)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(codec::decode_at(&bytes, pos, generator)?))
    }

    fn has(&self, pos: ChunkPos) -> bool {
        self.path_for(pos).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_roundtrip() {
        assert_eq!(parse_file_name("c.-4.12.chunk"), Some(ChunkPos::new(-4, 12)));
        assert_eq!(parse_file_name("c.1.chunk"), None);
        assert_eq!(parse_file_name("c.1.2.chunk.tmp"), None);
        assert_eq!(parse_file_name("r.0.0.mca"), None);
    }
}
