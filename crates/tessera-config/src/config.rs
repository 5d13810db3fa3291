//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain renderer settings.
    pub render: RenderConfig,
    /// Tile archive settings.
    pub tiles: TileConfig,
    /// Generated map settings (used by the CLI session).
    pub map: MapConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// How shading changes reach the GPU.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UpdateStrategy {
    /// Notifications patch a shadow copy under a lock; the draw flushes stale spans.
    #[default]
    Async,
    /// Notifications set per-point bits; the draw regenerates dirty points in place.
    Sync,
}

/// Per-vertex payload of the shade buffer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShadeEncoding {
    /// One normalized `f32` luminance per vertex.
    #[default]
    Float,
    /// Four bytes `(gray, gray, gray, 255)` per vertex.
    PackedRgba8,
}

/// Terrain renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Shade update strategy, fixed for the lifetime of a renderer.
    pub update_strategy: UpdateStrategy,
    /// Shade buffer encoding, fixed per session.
    pub shade_encoding: ShadeEncoding,
    /// Decode the atlas on a background thread before the first frame.
    pub preload_atlas: bool,
}

/// Tile archive configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TileConfig {
    /// Root directory of the tile archive. `None` selects procedural tiles.
    pub archive_dir: Option<PathBuf>,
    /// Archive file holding the landscape tiles.
    pub landscape_file: u32,
}

/// Generated map configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Map width in grid points.
    pub width: u32,
    /// Map height in grid points.
    pub height: u32,
    /// Seed for the procedural terrain.
    pub seed: u64,
    /// Attenuate shading by fog-of-war visibility.
    pub fog_of_war: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            update_strategy: UpdateStrategy::Async,
            shade_encoding: ShadeEncoding::Float,
            preload_atlas: true,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            seed: 1,
            fog_of_war: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// The per-user configuration directory, `<config_dir>/tessera`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("tessera"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    ///
    /// Renderer settings only take effect for renderers created afterwards.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = read_config(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(ConfigError::Parse)
}
