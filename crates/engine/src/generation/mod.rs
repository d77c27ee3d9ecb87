//! Terrain generators.
//!
//! A generator is a pure function of world position: the same position always
//! yields the same block. The streaming cache relies on this to recreate a
//! chunk that was evicted without a persisted record.

pub mod flat;
pub mod zones;

pub use flat::FlatGenerator;
pub use zones::{Zone, ZonePalette, ZoneRange, ZoneTable, ZonedGenerator};

use std::ops::RangeInclusive;

use crate::world::block::BlockId;
use crate::world::chunk::CHUNK_HEIGHT;
use crate::world::position::BlockPos;

/// The generator a world populates new chunks with.
#[derive(Debug, Clone)]
pub enum WorldGenerator {
    /// Fixed horizontal layers, identical in every column.
    Flat(FlatGenerator),
    /// Vertical zones (hell up to orbit), each with its own rule.
    Zoned(ZonedGenerator),
}

impl WorldGenerator {
    #[inline]
    pub fn block_at(&self, pos: BlockPos) -> BlockId {
        match self {
            WorldGenerator::Flat(flat) => flat.block_at(pos),
            WorldGenerator::Zoned(zoned) => zoned.block_at(pos),
        }
    }

    /// Heights a spawn search scans for ground: the surface zone of a zoned
    /// world, the whole column of a flat one.
    pub fn surface_range(&self) -> RangeInclusive<i64> {
        match self {
            WorldGenerator::Flat(_) => 0..=CHUNK_HEIGHT as i64 - 1,
            WorldGenerator::Zoned(zoned) => {
                let range = zoned.table().surface_range();
                range.min..=range.max
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorldGenerator::Flat(_) => "flat",
            WorldGenerator::Zoned(_) => "zoned",
        }
    }
}

impl From<FlatGenerator> for WorldGenerator {
    fn from(flat: FlatGenerator) -> Self {
        WorldGenerator::Flat(flat)
    }
}

impl From<ZonedGenerator> for WorldGenerator {
    fn from(zoned: ZonedGenerator) -> Self {
        WorldGenerator::Zoned(zoned)
    }
}
