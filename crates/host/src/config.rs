//! Host configuration, loaded from TOML.
//!
//! Every field has a default, so a missing file or an empty one is a valid
//! configuration. Command-line flags are applied on top in `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use chunkstream_engine::meshing::MeshCacheConfig;
use chunkstream_engine::streaming::StreamingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Flat,
    #[default]
    Zoned,
}

impl std::str::FromStr for GeneratorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(GeneratorKind::Flat),
            "zoned" => Ok(GeneratorKind::Zoned),
            other => anyhow::bail!("unknown generator '{}' (expected 'flat' or 'zoned')", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub world: WorldSection,
    pub streaming: StreamingSection,
    pub meshing: MeshingSection,
    pub session: SessionSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldSection {
    pub generator: GeneratorKind,
    pub seed: u32,
    /// Directory chunk records are written to.
    pub save_dir: PathBuf,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::Zoned,
            seed: 0,
            save_dir: PathBuf::from("world"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingSection {
    pub capacity: usize,
    pub surface_radius: u32,
    pub underground_radius: u32,
    pub surface_level: i64,
    pub retain_margin: u32,
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            capacity: 160,
            surface_radius: 96,
            underground_radius: 48,
            surface_level: 64,
            retain_margin: 1,
        }
    }
}

impl StreamingSection {
    pub fn to_streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            capacity: self.capacity,
            surface_radius: self.surface_radius,
            underground_radius: self.underground_radius,
            surface_level: self.surface_level,
            retain_margin: self.retain_margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshingSection {
    /// Worker threads; 0 picks one less than the available cores.
    pub workers: usize,
    pub idle_wait_ms: u64,
    pub texture: String,
}

impl Default for MeshingSection {
    fn default() -> Self {
        Self {
            workers: 0,
            idle_wait_ms: 50,
            texture: "terrain".into(),
        }
    }
}

impl MeshingSection {
    pub fn to_mesh_cache_config(&self) -> MeshCacheConfig {
        let defaults = MeshCacheConfig::default();
        MeshCacheConfig {
            workers: if self.workers == 0 {
                defaults.workers
            } else {
                self.workers
            },
            idle_wait: Duration::from_millis(self.idle_wait_ms),
            texture: self.texture.as_str().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub tick_interval_ms: u64,
    /// Blocks the scripted observer moves along +x per tick.
    pub observer_speed: i64,
    /// Observer height.
    pub observer_y: i64,
    /// Place a block every this many ticks; 0 disables edits.
    pub edit_every: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            observer_speed: 4,
            observer_y: 80,
            edit_every: 20,
        }
    }
}

impl HostConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing host configuration")
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` if given, else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
