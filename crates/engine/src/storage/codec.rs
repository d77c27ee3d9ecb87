//! Binary chunk record.
//!
//! Layout before compression, all integers little-endian `i32`:
//!
//! ```text
//! [version][chunk_x][chunk_z][width][height][depth][blocks ...]
//! ```
//!
//! `blocks` holds `width * height * depth` bytes in the chunk's storage order
//! (x-major, y-mid, z-minor). The whole record is gzip-compressed.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use crate::generation::WorldGenerator;
use crate::world::block::BlockId;
use crate::world::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME, CHUNK_WIDTH, Chunk};
use crate::world::position::ChunkPos;

/// Format version written into every record.
pub const CODEC_VERSION: i32 = 1;

const HEADER_LEN: usize = 6 * 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("corrupt chunk record: {0}")]
    Corrupt(#[source] io::Error),
    #[error("chunk record ends early: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("unsupported chunk format version {found} (expected {expected})")]
    VersionMismatch { expected: i32, found: i32 },
    #[error("chunk dimensions {found:?} do not match world dimensions {expected:?}")]
    DimensionMismatch { expected: [i32; 3], found: [i32; 3] },
    #[error("chunk record has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("record is for chunk ({found_x}, {found_z}), expected ({expected_x}, {expected_z})")]
    CoordinateMismatch {
        expected_x: i32,
        expected_z: i32,
        found_x: i32,
        found_z: i32,
    },
}

const DIMENSIONS: [i32; 3] = [CHUNK_WIDTH as i32, CHUNK_HEIGHT as i32, CHUNK_DEPTH as i32];

/// Serialize a chunk into a compressed record.
pub fn encode(chunk: &Chunk) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(HEADER_LEN + CHUNK_VOLUME);
    let pos = chunk.pos();
    for field in [CODEC_VERSION, pos.x, pos.z, DIMENSIONS[0], DIMENSIONS[1], DIMENSIONS[2]] {
        raw.extend_from_slice(&field.to_le_bytes());
    }
    raw.extend(chunk.blocks().iter().map(|block| block.0));

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).map_err(CodecError::Corrupt)?;
    encoder.finish().map_err(CodecError::Corrupt)
}

/// Parse a compressed record back into a chunk.
///
/// The chunk is first built from `generator` and then every voxel is
/// overwritten in storage order, so the result never mixes partial data.
pub fn decode(bytes: &[u8], generator: &WorldGenerator) -> Result<Chunk, CodecError> {
    let mut raw = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated {
                expected: HEADER_LEN + CHUNK_VOLUME,
                found: raw.len(),
            },
            _ => CodecError::Corrupt(e),
        })?;

    if raw.len() < HEADER_LEN {
        return Err(CodecError::Truncated {
            expected: HEADER_LEN,
            found: raw.len(),
        });
    }
    let header: Vec<i32> = raw[..HEADER_LEN]
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let version = header[0];
    if version != CODEC_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: CODEC_VERSION,
            found: version,
        });
    }
    let found = [header[3], header[4], header[5]];
    if found != DIMENSIONS {
        return Err(CodecError::DimensionMismatch {
            expected: DIMENSIONS,
            found,
        });
    }

    let body = &raw[HEADER_LEN..];
    if body.len() < CHUNK_VOLUME {
        return Err(CodecError::Truncated {
            expected: HEADER_LEN + CHUNK_VOLUME,
            found: raw.len(),
        });
    }
    if body.len() > CHUNK_VOLUME {
        return Err(CodecError::TrailingBytes(body.len() - CHUNK_VOLUME));
    }

    let pos = ChunkPos::new(header[1], header[2]);
    let mut chunk = Chunk::generated(pos, generator);
    for (local, &byte) in Chunk::local_positions().zip(body) {
        chunk.set(local, BlockId(byte));
    }
    Ok(chunk)
}

/// Like [`decode`], but also checks the record belongs to `expected`.
pub fn decode_at(
    bytes: &[u8],
    expected: ChunkPos,
    generator: &WorldGenerator,
) -> Result<Chunk, CodecError> {
    let chunk = decode(bytes, generator)?;
    let found = chunk.pos();
    if found != expected {
        return Err(CodecError::CoordinateMismatch {
            expected_x: expected.x,
            expected_z: expected.z,
            found_x: found.x,
            found_z: found.z,
        });
    }
    Ok(chunk)
}
