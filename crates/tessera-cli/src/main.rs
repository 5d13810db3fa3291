//! `tessera`: bake the terrain atlas or drive a headless renderer session.

mod session;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tessera_atlas::{ImageDirSource, SyntheticTileSource, TileSource, build_atlas};
use tessera_config::{CliArgs, Command, Config, default_config_dir};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = match args.config.clone().map(Ok).unwrap_or_else(default_config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to resolve config directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    tessera_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let result = match &args.command {
        Command::Bake { out } => bake(&config, out),
        Command::Session {
            frames,
            edits_per_frame,
            ..
        } => session::run(&config, tile_source(&config), *frames, *edits_per_frame),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Tiles from the configured archive directory, or procedural ones.
fn tile_source(config: &Config) -> Arc<dyn TileSource> {
    match &config.tiles.archive_dir {
        Some(dir) => {
            info!("Reading tiles from {}", dir.display());
            Arc::new(ImageDirSource::new(dir.clone()))
        }
        None => {
            info!("No tile archive configured, using procedural tiles");
            Arc::new(SyntheticTileSource::new(config.tiles.landscape_file))
        }
    }
}

fn bake(config: &Config, out: &Path) -> Result<(), String> {
    let source = tile_source(config);
    let pixels = build_atlas(source.as_ref(), config.tiles.landscape_file)
        .map_err(|e| format!("Failed to build atlas: {e}"))?;
    pixels
        .save_png(out)
        .map_err(|e| format!("Failed to write {}: {e}", out.display()))?;
    info!(
        "Wrote {}x{} atlas to {}",
        pixels.size(),
        pixels.size(),
        out.display()
    );
    Ok(())
}
