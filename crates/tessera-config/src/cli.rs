//! Command-line argument parsing for the `tessera` tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{Config, ShadeEncoding, UpdateStrategy};

/// Tessera command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "tessera", about = "Terrain mesh and tile atlas tool")]
pub struct CliArgs {
    /// Tile archive directory (omit for procedural tiles).
    #[arg(long)]
    pub tiles: Option<PathBuf>,

    /// Shade update strategy (async or sync).
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<UpdateStrategy>,

    /// Shade buffer encoding (float or rgba8).
    #[arg(long, value_parser = parse_encoding)]
    pub encoding: Option<ShadeEncoding>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// What the tool should do.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build the tile atlas and write it as a PNG.
    Bake {
        /// Output image path.
        #[arg(long, default_value = "atlas.png")]
        out: PathBuf,
    },
    /// Run a headless renderer session over a generated map.
    Session {
        /// Number of frames to draw.
        #[arg(long, default_value_t = 120)]
        frames: u32,
        /// Terrain edits applied per frame.
        #[arg(long, default_value_t = 16)]
        edits_per_frame: u32,
        /// Map width override.
        #[arg(long)]
        width: Option<u32>,
        /// Map height override.
        #[arg(long)]
        height: Option<u32>,
    },
}

fn parse_strategy(value: &str) -> Result<UpdateStrategy, String> {
    match value.to_ascii_lowercase().as_str() {
        "async" => Ok(UpdateStrategy::Async),
        "sync" => Ok(UpdateStrategy::Sync),
        other => Err(format!("unknown update strategy '{other}' (expected async or sync)")),
    }
}

fn parse_encoding(value: &str) -> Result<ShadeEncoding, String> {
    match value.to_ascii_lowercase().as_str() {
        "float" => Ok(ShadeEncoding::Float),
        "rgba8" | "packed" => Ok(ShadeEncoding::PackedRgba8),
        other => Err(format!("unknown shade encoding '{other}' (expected float or rgba8)")),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.tiles {
            self.tiles.archive_dir = Some(dir.clone());
        }
        if let Some(strategy) = args.strategy {
            self.render.update_strategy = strategy;
        }
        if let Some(encoding) = args.encoding {
            self.render.shade_encoding = encoding;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Command::Session { width, height, .. } = args.command {
            if let Some(w) = width {
                self.map.width = w;
            }
            if let Some(h) = height {
                self.map.height = h;
            }
        }
    }
}
