//! Terrain data model for Tessera.
//!
//! Defines the landscape types drawn by the renderer, the provider trait the
//! renderer samples terrain through, the listener trait providers push change
//! notifications into, and [`GridTerrain`], an in-memory provider with a
//! procedural generator.

mod generate;
mod grid;
mod landscape;
mod provider;

pub use generate::{MapParams, generate_map};
pub use grid::GridTerrain;
pub use landscape::LandscapeType;
pub use provider::{TerrainListener, TerrainProvider, TerrainSample, VISIBLE_MAX};
