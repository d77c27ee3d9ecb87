//! Block type definitions.
//!
//! The engine only knows that `BlockId(0)` is air. Everything else about a
//! block (its name, whether it is solid, opaque, or collidable) lives here, in
//! an explicitly constructed [`BlockRegistry`] that the session owns.

use std::collections::HashMap;

use chunkstream_engine::generation::{FlatGenerator, ZonePalette};
use chunkstream_engine::world::block::BlockId;

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const DIRT: BlockId = BlockId(2);
pub const GRASS: BlockId = BlockId(3);
pub const BEDROCK: BlockId = BlockId(4);
pub const SAND: BlockId = BlockId(5);
pub const WATER: BlockId = BlockId(6);
pub const CLOUD: BlockId = BlockId(7);
pub const PLANKS: BlockId = BlockId(8);
pub const GLASS: BlockId = BlockId(9);
pub const MAGMA: BlockId = BlockId(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDefinition {
    pub name: String,
    /// Occupies its voxel (meshing emits faces for it).
    pub solid: bool,
    /// Hides the faces of blocks behind it.
    pub opaque: bool,
    /// Entities cannot pass through it.
    pub collision: bool,
}

impl BlockDefinition {
    pub fn new(name: impl Into<String>, solid: bool, opaque: bool, collision: bool) -> Self {
        Self {
            name: name.into(),
            solid,
            opaque,
            collision,
        }
    }
}

/// Id-indexed block definitions plus a reverse name lookup.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    definitions: Vec<Option<BlockDefinition>>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// A registry that only knows air.
    pub fn new() -> Self {
        let mut registry = Self {
            definitions: vec![None; 256],
            by_name: HashMap::new(),
        };
        registry.register(AIR, BlockDefinition::new("air", false, false, false));
        registry
    }

    /// The blocks the built-in generators place, plus a couple of building
    /// blocks for edits.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(STONE, BlockDefinition::new("stone", true, true, true));
        registry.register(DIRT, BlockDefinition::new("dirt", true, true, true));
        registry.register(GRASS, BlockDefinition::new("grass", true, true, true));
        registry.register(BEDROCK, BlockDefinition::new("bedrock", true, true, true));
        registry.register(SAND, BlockDefinition::new("sand", true, true, true));
        registry.register(WATER, BlockDefinition::new("water", true, false, false));
        registry.register(CLOUD, BlockDefinition::new("cloud", true, false, false));
        registry.register(PLANKS, BlockDefinition::new("planks", true, true, true));
        registry.register(GLASS, BlockDefinition::new("glass", true, false, true));
        registry.register(MAGMA, BlockDefinition::new("magma", true, true, true));
        registry
    }

    /// Add or replace the definition for `id`.
    pub fn register(&mut self, id: BlockId, definition: BlockDefinition) {
        if let Some(previous) = &self.definitions[id.0 as usize] {
            self.by_name.remove(&previous.name);
        }
        self.by_name.insert(definition.name.clone(), id);
        self.definitions[id.0 as usize] = Some(definition);
    }

    pub fn definition(&self, id: BlockId) -> Option<&BlockDefinition> {
        self.definitions[id.0 as usize].as_ref()
    }

    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: BlockId) -> &str {
        self.definition(id).map_or("unknown", |def| def.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Unknown ids count as solid so they stay visible.
    pub fn is_solid(&self, id: BlockId) -> bool {
        self.definition(id).map_or(!id.is_air(), |def| def.solid)
    }

    /// Palette for the zoned generator.
    pub fn zone_palette(&self) -> ZonePalette {
        ZonePalette {
            bedrock: BEDROCK,
            stone: STONE,
            dirt: DIRT,
            grass: GRASS,
            sand: SAND,
            water: WATER,
            cloud: CLOUD,
            magma: MAGMA,
        }
    }

    /// Bedrock, three stone layers and a dirt top.
    pub fn flat_generator(&self) -> FlatGenerator {
        FlatGenerator::standard(BEDROCK, STONE, DIRT)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
