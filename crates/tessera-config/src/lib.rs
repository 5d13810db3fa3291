//! Configuration system for Tessera.
//!
//! Settings persist to disk as RON files, can be overridden from the command
//! line via clap, and deserialize with defaults for any missing section so old
//! config files keep loading.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, Command};
pub use config::{
    Config, DebugConfig, MapConfig, RenderConfig, ShadeEncoding, TileConfig, UpdateStrategy,
    default_config_dir,
};
pub use error::ConfigError;
