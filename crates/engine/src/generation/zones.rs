//! Zone-composite terrain.
//!
//! Vertical space is split into named zones by a fixed height-range table.
//! A position's zone is resolved by range lookup and the zone's rule produces
//! the block. Zones have no identity beyond their rule, so they are a plain
//! enum dispatched with `match`.

use noise::{NoiseFn, Perlin};

use crate::world::block::BlockId;
use crate::world::position::BlockPos;

/// Vertical band of the world with its own generation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Hell,
    Underground,
    Surface,
    Sky,
    Stratosphere,
    Orbit,
}

impl Zone {
    pub const fn name(self) -> &'static str {
        match self {
            Zone::Hell => "hell",
            Zone::Underground => "underground",
            Zone::Surface => "surface",
            Zone::Sky => "sky",
            Zone::Stratosphere => "stratosphere",
            Zone::Orbit => "orbit",
        }
    }
}

/// Inclusive `[min, max]` height range assigned to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRange {
    pub zone: Zone,
    pub min: i64,
    pub max: i64,
}

impl ZoneRange {
    pub const fn new(zone: Zone, min: i64, max: i64) -> Self {
        Self { zone, min, max }
    }

    pub const fn contains(&self, y: i64) -> bool {
        self.min <= y && y <= self.max
    }
}

/// Static height-range table, sorted bottom-up.
#[derive(Debug, Clone)]
pub struct ZoneTable {
    ranges: Vec<ZoneRange>,
}

impl ZoneTable {
    /// # Panics
    /// An empty table, an inverted range or overlapping ranges are
    /// configuration bugs and panic immediately.
    pub fn new(mut ranges: Vec<ZoneRange>) -> Self {
        assert!(!ranges.is_empty(), "zone table needs at least one height range");
        ranges.sort_by_key(|range| range.min);
        for range in &ranges {
            assert!(
                range.min <= range.max,
                "zone {} has inverted height range {}..={}",
                range.zone.name(),
                range.min,
                range.max
            );
        }
        for pair in ranges.windows(2) {
            assert!(
                pair[0].max < pair[1].min,
                "zones {} and {} overlap",
                pair[0].zone.name(),
                pair[1].zone.name()
            );
        }
        Self { ranges }
    }

    /// The six zones bottom to top over the 256-block column: hell 0..=7,
    /// underground 8..=63, surface 64..=127, sky 128..=175, stratosphere
    /// 176..=223, orbit 224..=255.
    pub fn standard() -> Self {
        Self::new(vec![
            ZoneRange::new(Zone::Hell, 0, 7),
            ZoneRange::new(Zone::Underground, 8, 63),
            ZoneRange::new(Zone::Surface, 64, 127),
            ZoneRange::new(Zone::Sky, 128, 175),
            ZoneRange::new(Zone::Stratosphere, 176, 223),
            ZoneRange::new(Zone::Orbit, 224, 255),
        ])
    }

    pub fn ranges(&self) -> &[ZoneRange] {
        &self.ranges
    }

    pub fn range_of(&self, zone: Zone) -> Option<ZoneRange> {
        self.ranges.iter().copied().find(|range| range.zone == zone)
    }

    /// Lowest height covered by the table.
    pub fn floor(&self) -> i64 {
        self.ranges[0].min
    }

    /// The band spawn searches scan: the surface zone, or the whole table
    /// when it has none.
    pub fn surface_range(&self) -> ZoneRange {
        self.range_of(Zone::Surface).unwrap_or_else(|| {
            let top = self.ranges[self.ranges.len() - 1];
            ZoneRange::new(Zone::Surface, self.floor(), top.max)
        })
    }

    /// Resolve the zone for height `y`.
    ///
    /// Heights below the table clamp to the bottom zone, heights above it to
    /// the top zone, and heights in a gap between two ranges go to the nearer
    /// one (the lower one on a tie).
    pub fn determine_zone(&self, y: i64) -> Zone {
        let bottom = self.ranges[0];
        let top = self.ranges[self.ranges.len() - 1];
        if y < bottom.min {
            return bottom.zone;
        }
        if y > top.max {
            return top.zone;
        }
        if let Some(range) = self.ranges.iter().find(|range| range.contains(y)) {
            return range.zone;
        }
        // In a gap: the first range starting above y has a neighbor below it.
        let upper = self
            .ranges
            .iter()
            .position(|range| range.min > y)
            .unwrap_or(self.ranges.len() - 1);
        let below = self.ranges[upper.saturating_sub(1)];
        let above = self.ranges[upper];
        if y - below.max <= above.min - y {
            below.zone
        } else {
            above.zone
        }
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Block ids used by the zone rules. Assigned by the host's block registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonePalette {
    pub bedrock: BlockId,
    pub stone: BlockId,
    pub dirt: BlockId,
    pub grass: BlockId,
    pub sand: BlockId,
    pub water: BlockId,
    pub cloud: BlockId,
    pub magma: BlockId,
}

const TERRAIN_SCALE: f64 = 0.012;
const TERRAIN_AMPLITUDE: f64 = 14.0;
const CAVE_SCALE: f64 = 0.06;
const CAVE_THRESHOLD: f64 = 0.55;
const CLOUD_SCALE: f64 = 0.025;
const CLOUD_THRESHOLD: f64 = 0.45;
const CLOUD_OFFSET: i64 = 32;
const CLOUD_THICKNESS: i64 = 4;
const DIRT_DEPTH: i64 = 3;

/// Zone-composite generator with seeded Perlin noise for terrain height,
/// caves and clouds.
#[derive(Debug, Clone)]
pub struct ZonedGenerator {
    table: ZoneTable,
    palette: ZonePalette,
    seed: u32,
    sea_level: i64,
    terrain: Perlin,
    caves: Perlin,
    clouds: Perlin,
}

impl ZonedGenerator {
    pub fn new(table: ZoneTable, palette: ZonePalette, seed: u32) -> Self {
        let surface = table
            .range_of(Zone::Surface)
            .unwrap_or_else(|| table.ranges()[0]);
        Self {
            sea_level: surface.min + 6,
            table,
            palette,
            seed,
            terrain: Perlin::new(seed),
            caves: Perlin::new(seed.wrapping_add(1)),
            clouds: Perlin::new(seed.wrapping_add(2)),
        }
    }

    pub fn table(&self) -> &ZoneTable {
        &self.table
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn sea_level(&self) -> i64 {
        self.sea_level
    }

    /// Terrain height of the column at `(x, z)`, clamped into the surface zone.
    pub fn surface_height(&self, x: i64, z: i64) -> i64 {
        let Some(surface) = self.table.range_of(Zone::Surface) else {
            return self.table.ranges()[0].max;
        };
        let base = self.sea_level + 2;
        let sample = self
            .terrain
            .get([x as f64 * TERRAIN_SCALE, z as f64 * TERRAIN_SCALE]);
        let height = base + (sample * TERRAIN_AMPLITUDE).round() as i64;
        height.clamp(surface.min, surface.max)
    }

    /// The bottom layer of the table is bedrock whichever zone owns it.
    pub fn block_at(&self, pos: BlockPos) -> BlockId {
        if pos.y <= self.table.floor() {
            return self.palette.bedrock;
        }
        match self.table.determine_zone(pos.y) {
            Zone::Hell => self.palette.magma,
            Zone::Underground => self.underground(pos),
            Zone::Surface => self.surface(pos),
            Zone::Sky => self.sky(pos),
            Zone::Stratosphere | Zone::Orbit => BlockId::AIR,
        }
    }

    fn underground(&self, pos: BlockPos) -> BlockId {
        let floor = self
            .table
            .range_of(Zone::Underground)
            .map_or(self.table.floor(), |range| range.min);
        if pos.y > floor + 1 {
            let sample = self.caves.get([
                pos.x as f64 * CAVE_SCALE,
                pos.y as f64 * CAVE_SCALE,
                pos.z as f64 * CAVE_SCALE,
            ]);
            if sample > CAVE_THRESHOLD {
                return BlockId::AIR;
            }
        }
        self.palette.stone
    }

    fn surface(&self, pos: BlockPos) -> BlockId {
        let height = self.surface_height(pos.x, pos.z);
        if pos.y > height {
            return if pos.y <= self.sea_level {
                self.palette.water
            } else {
                BlockId::AIR
            };
        }
        if pos.y == height {
            return if height <= self.sea_level + 1 {
                self.palette.sand
            } else {
                self.palette.grass
            };
        }
        if pos.y > height - DIRT_DEPTH {
            self.palette.dirt
        } else {
            self.palette.stone
        }
    }

    fn sky(&self, pos: BlockPos) -> BlockId {
        let Some(sky) = self.table.range_of(Zone::Sky) else {
            return BlockId::AIR;
        };
        let cloud_base = sky.min + CLOUD_OFFSET;
        if pos.y < cloud_base || pos.y >= cloud_base + CLOUD_THICKNESS {
            return BlockId::AIR;
        }
        let sample = self
            .clouds
            .get([pos.x as f64 * CLOUD_SCALE, pos.z as f64 * CLOUD_SCALE]);
        if sample > CLOUD_THRESHOLD {
            self.palette.cloud
        } else {
            BlockId::AIR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> ZonePalette {
        ZonePalette {
            bedrock: BlockId(4),
            stone: BlockId(1),
            dirt: BlockId(2),
            grass: BlockId(3),
            sand: BlockId(5),
            water: BlockId(6),
            cloud: BlockId(7),
            magma: BlockId(10),
        }
    }

    #[test]
    fn zone_inside_each_range() {
        let table = ZoneTable::standard();
        for range in table.ranges() {
            for y in range.min..=range.max {
                assert_eq!(table.determine_zone(y), range.zone, "y = {y}");
            }
        }
    }

    #[test]
    fn zone_clamps_above_and_below() {
        let table = ZoneTable::standard();
        assert_eq!(table.determine_zone(-1), Zone::Hell);
        assert_eq!(table.determine_zone(-10_000), Zone::Hell);
        assert_eq!(table.determine_zone(256), Zone::Orbit);
        assert_eq!(table.determine_zone(10_000), Zone::Orbit);
    }

    #[test]
    fn zone_gap_goes_to_nearest_range() {
        let table = ZoneTable::new(vec![
            ZoneRange::new(Zone::Sky, 100, 150),
            ZoneRange::new(Zone::Underground, 0, 40),
        ]);
        assert_eq!(table.determine_zone(45), Zone::Underground);
        assert_eq!(table.determine_zone(70), Zone::Underground); // tie
        assert_eq!(table.determine_zone(71), Zone::Sky);
        assert_eq!(table.determine_zone(99), Zone::Sky);
    }

    #[test]
    #[should_panic(expected = "at least one height range")]
    fn empty_table_panics() {
        ZoneTable::new(Vec::new());
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn overlapping_ranges_panic() {
        ZoneTable::new(vec![
            ZoneRange::new(Zone::Underground, 0, 70),
            ZoneRange::new(Zone::Surface, 64, 127),
        ]);
    }

    #[test]
    fn generation_is_deterministic() {
        let a = ZonedGenerator::new(ZoneTable::standard(), palette(), 42);
        let b = ZonedGenerator::new(ZoneTable::standard(), palette(), 42);
        for x in -20..20 {
            for y in [0, 1, 30, 64, 70, 80, 127, 160, 163, 200] {
                let pos = BlockPos::new(x, y, x * 3 - 7);
                assert_eq!(a.block_at(pos), b.block_at(pos));
                assert_eq!(a.block_at(pos), a.block_at(pos));
            }
        }
    }

    #[test]
    fn column_has_bedrock_floor_and_surface_cap() {
        let zoned = ZonedGenerator::new(ZoneTable::standard(), palette(), 7);
        let (x, z) = (12, -30);
        assert_eq!(zoned.block_at(BlockPos::new(x, 0, z)), BlockId(4));
        let height = zoned.surface_height(x, z);
        assert!((64..=127).contains(&height));
        let top = zoned.block_at(BlockPos::new(x, height, z));
        assert!(top == BlockId(3) || top == BlockId(5));
        let above = zoned.block_at(BlockPos::new(x, height + 1, z));
        assert!(above == BlockId::AIR || above == BlockId(6));
        assert_eq!(zoned.block_at(BlockPos::new(x, 127 + 1, z)), BlockId::AIR);
    }

    #[test]
    fn standard_table_stacks_six_zones_over_the_column() {
        let table = ZoneTable::standard();
        let zones: Vec<Zone> = table.ranges().iter().map(|range| range.zone).collect();
        assert_eq!(
            zones,
            vec![
                Zone::Hell,
                Zone::Underground,
                Zone::Surface,
                Zone::Sky,
                Zone::Stratosphere,
                Zone::Orbit
            ]
        );
        assert_eq!(table.floor(), 0);
        assert_eq!(table.ranges()[5].max, 255);
        for pair in table.ranges().windows(2) {
            assert_eq!(pair[0].max + 1, pair[1].min);
        }
    }

    #[test]
    fn hell_is_magma_over_bedrock_and_the_upper_zones_are_empty() {
        let zoned = ZonedGenerator::new(ZoneTable::standard(), palette(), 3);
        for x in -8..8 {
            let z = 5 - x;
            assert_eq!(zoned.block_at(BlockPos::new(x, 0, z)), BlockId(4));
            for y in 1..=7 {
                assert_eq!(zoned.block_at(BlockPos::new(x, y, z)), BlockId(10));
            }
            for y in 176..=255 {
                assert_eq!(zoned.block_at(BlockPos::new(x, y, z)), BlockId::AIR, "y = {y}");
            }
        }
    }

    #[test]
    fn surface_range_falls_back_to_the_whole_table() {
        assert_eq!(ZoneTable::standard().surface_range(), ZoneRange::new(Zone::Surface, 64, 127));
        let table = ZoneTable::new(vec![
            ZoneRange::new(Zone::Hell, 10, 20),
            ZoneRange::new(Zone::Sky, 30, 90),
        ]);
        assert_eq!(table.surface_range(), ZoneRange::new(Zone::Surface, 10, 90));
    }
}
