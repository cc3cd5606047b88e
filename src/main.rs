//! rkstream - headless streaming driver
//!
//! Streams terrain around a viewpoint that walks a slow circle, applies a
//! block edit once the world around the start is loaded and logs progress.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{IVec3, Vec3};

use rkstream::core::{WorldConfig, logging};
use rkstream::core::types::Result;
use rkstream::streaming::{
    ChunkManager, FileSaveStore, MemorySaveStore, SaveCollaborator, SharedViewpoint,
    StreamingWorker, Viewpoint,
};
use rkstream::terrain::{BiomeRegistry, StructureRegistry, WorldGenerator};
use rkstream::voxel::BlockType;

fn main() {
    logging::init();
    log::info!("rkstream starting...");

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_path_arg(&args, "--config", "-c") {
        Some(path) => {
            log::info!("Loading config from: {}", path.display());
            WorldConfig::from_json_file(&path)?
        }
        None => WorldConfig::default(),
    };
    let seconds = parse_seconds_arg(&args).unwrap_or(20.0);

    let save: Arc<dyn SaveCollaborator> = match parse_path_arg(&args, "--save-dir", "-s") {
        Some(dir) => {
            log::info!("Saving overrides to: {}", dir.display());
            Arc::new(FileSaveStore::new(dir))
        }
        None => Arc::new(MemorySaveStore::new()),
    };

    let generator = WorldGenerator::new(
        &config,
        Arc::new(BiomeRegistry::default()),
        Arc::new(StructureRegistry::default()),
    )?;
    let start = Vec3::new(8.0, config.world_height() as f32 * 0.6, 8.0);
    let viewpoint = Arc::new(SharedViewpoint::new(Viewpoint::new(start, config.render_distance)));
    let manager = Arc::new(ChunkManager::new(generator, save, viewpoint.clone()));

    log::info!(
        "Seed {}, render distance {}, {} ticks/s",
        config.seed,
        config.render_distance,
        config.ticks_per_second
    );

    let mut worker = StreamingWorker::spawn(manager.clone())?;
    let began = Instant::now();
    let mut last_report = Instant::now();
    let mut edited = false;
    let edit_at = IVec3::new(8, config.world_height() - 4, 8);

    while began.elapsed().as_secs_f32() < seconds {
        std::thread::sleep(Duration::from_millis(50));

        // One column width per second around a circle of eight columns radius
        let angle = began.elapsed().as_secs_f32() * config.dims.chunk_size as f32 / 128.0;
        let radius = 8.0 * config.dims.chunk_size as f32;
        viewpoint.set_position(start + Vec3::new(angle.cos() - 1.0, 0.0, angle.sin()) * radius);

        if !edited && manager.block_at(edit_at).is_some() {
            manager.change_block(edit_at, BlockType::Cobblestone);
            edited = true;
            log::info!("Placed cobblestone at {}", edit_at);
        }

        if last_report.elapsed() >= Duration::from_secs(2) {
            last_report = Instant::now();
            let stats = manager.stats();
            log::info!(
                "{} resident, {} drawable, queues g{}/b{}/u{}, {} generated, {} baked, {} evicted",
                manager.resident_count(),
                manager.drawable_chunks().len(),
                manager.generate_queue_len(),
                manager.bake_queue_len(),
                manager.unload_queue_len(),
                stats.columns_generated,
                stats.chunks_baked,
                stats.columns_evicted
            );
        }
    }

    worker.stop();
    let saved = manager.flush_overrides()?;
    log::info!("Stopped after {} ticks, flushed {} columns", manager.stats().ticks, saved);
    Ok(())
}

/// Parse a path argument given as `long <path>` or `short <path>`
fn parse_path_arg(args: &[String], long: &str, short: &str) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == long || args[i] == short {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse --seconds argument (run duration)
fn parse_seconds_arg(args: &[String]) -> Option<f32> {
    for i in 0..args.len() {
        if args[i] == "--seconds" || args[i] == "-t" {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}
