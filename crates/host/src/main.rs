use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use chunkstream_engine::world::position::BlockPos;
use chunkstream_host::block::{self, BlockRegistry};
use chunkstream_host::config::{GeneratorKind, HostConfig};
use chunkstream_host::session::Session;

/// Stream a voxel world around a scripted observer, meshing chunks in the
/// background and saving them as they fall out of range.
#[derive(Debug, Parser)]
#[command(name = "chunkstream", version)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// World save directory (overrides `world.save_dir`).
    #[arg(long)]
    world: Option<PathBuf>,

    /// Stop after this many ticks; runs until Ctrl+C when omitted.
    #[arg(long)]
    ticks: Option<u64>,

    /// Terrain seed (overrides `world.seed`).
    #[arg(long)]
    seed: Option<u32>,

    /// Terrain generator: `flat` or `zoned` (overrides `world.generator`).
    #[arg(long)]
    generator: Option<GeneratorKind>,

    /// Print a JSON metrics snapshot to stdout on exit.
    #[arg(long)]
    status_json: bool,
}

impl Args {
    fn apply(&self, config: &mut HostConfig) {
        if let Some(world) = &self.world {
            config.world.save_dir = world.clone();
        }
        if let Some(seed) = self.seed {
            config.world.seed = seed;
        }
        if let Some(generator) = self.generator {
            config.world.generator = generator;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = HostConfig::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);

    let registry = BlockRegistry::standard();
    let mut session = Session::open(&config, registry).context("starting session")?;

    let settings = config.session.clone();
    let spawn = session.spawn_position(0, 0);
    tracing::info!("Ground at the origin column, spawn at ({}, {}, {})", spawn.x, spawn.y, spawn.z);
    let mut interval = tokio::time::interval(Duration::from_millis(settings.tick_interval_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut tick: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if args.ticks.is_some_and(|limit| tick >= limit) {
            tracing::info!("Reached {} ticks", tick);
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }

        let observer = BlockPos::new(tick as i64 * settings.observer_speed, settings.observer_y, 0);
        if settings.edit_every > 0 && tick > 0 && tick % settings.edit_every == 0 {
            let marker = BlockPos::new(observer.x, settings.observer_y - 1, observer.z);
            if !session.is_solid_at(marker) {
                session.edit(marker, block::PLANKS);
            }
        }

        let report = session.tick(observer);
        if !report.streaming.evicted.is_empty() || !report.streaming.generated.is_empty() {
            tracing::debug!(
                "Tick {}: +{} loaded, +{} generated, -{} evicted, {} queued, {} meshes collected",
                tick,
                report.streaming.loaded.len(),
                report.streaming.generated.len(),
                report.streaming.evicted.len(),
                report.enqueued,
                report.collected,
            );
        }
        tick += 1;
    }

    let status = session.status();
    tracing::info!(
        "Ran {} ticks: {} resident, {} generated, {} evicted, {} meshes collected",
        status.ticks,
        status.resident_chunks,
        status.chunks_generated,
        status.chunks_evicted,
        status.meshes_collected,
    );
    if args.status_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    tracing::info!("Saving world before exit...");
    session.shutdown()?;
    Ok(())
}
