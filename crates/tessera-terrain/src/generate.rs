//! Procedural map generation from fractal simplex noise.

use noise::{NoiseFn, Simplex};

use crate::{GridTerrain, LandscapeType, TerrainSample, VISIBLE_MAX};

/// Parameters for [`generate_map`].
#[derive(Clone, Debug)]
pub struct MapParams {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub fog_of_war: bool,
    /// Noise octaves composited per sample.
    pub octaves: u32,
    /// Frequency of the first octave, in cycles per grid point.
    pub base_frequency: f64,
    /// Height of the first octave's amplitude.
    pub amplitude: f64,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            seed: 1,
            fog_of_war: false,
            octaves: 5,
            base_frequency: 0.02,
            amplitude: 12.0,
        }
    }
}

/// Fractal Brownian motion over simplex noise, in `[-1, 1]` before scaling.
fn fbm(noise: &Simplex, params: &MapParams, x: f64, y: f64) -> f64 {
    let mut total = 0.0;
    let mut norm = 0.0;
    let mut frequency = params.base_frequency;
    let mut amplitude = 1.0;
    for _ in 0..params.octaves {
        total += noise.get([x * frequency, y * frequency]) * amplitude;
        norm += amplitude;
        frequency *= 2.0;
        amplitude *= 0.5;
    }
    if norm > 0.0 { total / norm } else { 0.0 }
}

/// Pick a landscape from a normalized height and a moisture value.
fn classify(h: f64, moisture: f64) -> LandscapeType {
    match h {
        h if h < -0.35 => LandscapeType::water(((-h - 0.35) * 16.0) as u8 + 4),
        h if h < -0.2 => LandscapeType::water(((-h - 0.2) * 20.0) as u8 + 1),
        h if h < -0.14 => LandscapeType::Sand,
        h if h < 0.35 => {
            if moisture > 0.45 {
                LandscapeType::Moor
            } else if moisture < -0.5 {
                LandscapeType::Desert
            } else if moisture < -0.3 {
                LandscapeType::DryGrass
            } else {
                LandscapeType::Grass
            }
        }
        h if h < 0.42 => LandscapeType::MountainBorder,
        h if h < 0.6 => LandscapeType::Mountain,
        _ => LandscapeType::Snow,
    }
}

/// Generate a deterministic map from `params.seed`.
pub fn generate_map(params: &MapParams) -> GridTerrain {
    let height_noise = Simplex::new(params.seed as u32);
    let moisture_noise = Simplex::new((params.seed as u32).wrapping_add(0x9e37));

    let terrain = GridTerrain::from_fn(params.width, params.height, |x, y| {
        let (fx, fy) = (f64::from(x), f64::from(y));
        let h = fbm(&height_noise, params, fx, fy);
        let moisture = moisture_noise.get([fx * 0.013, fy * 0.013]);
        TerrainSample {
            landscape: classify(h, moisture),
            height: (h.max(-0.2) * params.amplitude) as f32,
            visibility: VISIBLE_MAX,
        }
    });
    terrain.set_fog_enabled(params.fog_of_war);
    log::debug!(
        "Generated {}x{} map (seed {})",
        params.width,
        params.height,
        params.seed
    );
    terrain
}
