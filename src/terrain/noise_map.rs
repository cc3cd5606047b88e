//! Seeded coherent noise with spline remapping.
//!
//! A [`NoiseMap`] samples a configurable `noise` source into [0, 1] and then
//! pushes the value through a piecewise-linear spline of control points. The
//! spline always contains `(0, 0)` and `(1, 1)`; a mapped value that is NaN or
//! leaves [0, 1] is a configuration error and is reported, never clamped.

use noise::{
    Billow, Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, RidgedMulti, Seedable,
    SuperSimplex, Value,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Base coherent noise function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseKind {
    Perlin,
    OpenSimplex,
    SuperSimplex,
    Value,
}

/// Fractal layering applied on top of the base noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalKind {
    None,
    Fbm,
    Billow,
    RidgedMulti,
}

/// Serializable description of one noise field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoiseSettings {
    pub kind: NoiseKind,
    pub fractal: FractalKind,
    pub octaves: usize,
    pub frequency: f64,
    /// Added to the world seed so fields sharing a seed stay uncorrelated
    pub seed_offset: u32,
    /// Extra spline control points `(x, y)`; the endpoints are implicit
    #[serde(default)]
    pub control_points: Vec<(f64, f64)>,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            kind: NoiseKind::Perlin,
            fractal: FractalKind::Fbm,
            octaves: 4,
            frequency: 0.01,
            seed_offset: 0,
            control_points: Vec::new(),
        }
    }
}

type NoiseSource = Box<dyn NoiseFn<f64, 2> + Send + Sync>;

/// Seeded 2D noise sampler with a remapping spline.
pub struct NoiseMap {
    source: NoiseSource,
    /// Input scale for unlayered noise; fractal sources carry their own frequency
    input_scale: f64,
    /// Sorted by x, unique x values
    points: Vec<(f64, f64)>,
}

impl std::fmt::Debug for NoiseMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseMap")
            .field("source", &"<NoiseFn>")
            .field("input_scale", &self.input_scale)
            .field("points", &self.points)
            .finish()
    }
}

impl NoiseMap {
    /// Create a noise map with the identity spline.
    pub fn new(
        seed: u32,
        kind: NoiseKind,
        fractal: FractalKind,
        octaves: usize,
        frequency: f64,
    ) -> Result<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(Error::Config(format!("noise frequency must be positive, got {frequency}")));
        }
        if octaves == 0 {
            return Err(Error::Config("noise octaves must be at least 1".into()));
        }

        let source = match kind {
            NoiseKind::Perlin => layered::<Perlin>(fractal, seed, octaves, frequency),
            NoiseKind::OpenSimplex => layered::<OpenSimplex>(fractal, seed, octaves, frequency),
            NoiseKind::SuperSimplex => layered::<SuperSimplex>(fractal, seed, octaves, frequency),
            NoiseKind::Value => layered::<Value>(fractal, seed, octaves, frequency),
        };
        let input_scale = if fractal == FractalKind::None { frequency } else { 1.0 };

        Ok(Self {
            source,
            input_scale,
            points: vec![(0.0, 0.0), (1.0, 1.0)],
        })
    }

    /// Build a noise map from settings, offsetting the world seed.
    pub fn from_settings(world_seed: u32, settings: &NoiseSettings) -> Result<Self> {
        let mut map = Self::new(
            world_seed.wrapping_add(settings.seed_offset),
            settings.kind,
            settings.fractal,
            settings.octaves,
            settings.frequency,
        )?;
        for &(x, y) in &settings.control_points {
            map.add_control_point(x, y)?;
        }
        Ok(map)
    }

    /// Insert a spline control point, replacing any point with the same x.
    pub fn add_control_point(&mut self, x: f64, y: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&x) || !y.is_finite() {
            return Err(Error::Config(format!("invalid spline control point ({x}, {y})")));
        }
        match self.points.binary_search_by(|p| p.0.total_cmp(&x)) {
            Ok(idx) => self.points[idx].1 = y,
            Err(idx) => self.points.insert(idx, (x, y)),
        }
        Ok(())
    }

    /// Spline control points in ascending x order.
    pub fn control_points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Raw noise at `(x, y)` remapped from [-1, 1] to [0, 1].
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let raw = self
            .source
            .get([x * self.input_scale, y * self.input_scale])
            .clamp(-1.0, 1.0);
        (raw + 1.0) * 0.5
    }

    /// Push a [0, 1] value through the spline.
    pub fn map_value(&self, value: f64) -> Result<f64> {
        // L = greatest control x <= value, G = least control x >= value
        let upper = self.points.partition_point(|p| p.0 < value);
        let lower = self.points.partition_point(|p| p.0 <= value);

        let output = match (lower.checked_sub(1), self.points.get(upper)) {
            (Some(l), Some(&(gx, gy))) => {
                let (lx, ly) = self.points[l];
                if gx == lx {
                    ly
                } else {
                    ly + (gy - ly) * (value - lx) / (gx - lx)
                }
            }
            _ => f64::NAN,
        };

        if output.is_nan() || !(0.0..=1.0).contains(&output) {
            return Err(Error::SplineOutOfRange { input: value, output });
        }
        Ok(output)
    }

    /// Sample and map in one step.
    pub fn sample_mapped(&self, x: f64, y: f64) -> Result<f64> {
        self.map_value(self.sample(x, y))
    }

    /// Sample a `len` x `len` block of mapped values starting at `(x, y)`.
    ///
    /// Rows are sampled in parallel; the first spline error aborts the grid.
    pub fn sample_grid(&self, x: i32, y: i32, len: usize) -> Result<NoiseGrid> {
        let rows: Vec<Vec<f64>> = (0..len)
            .into_par_iter()
            .map(|dy| {
                (0..len)
                    .map(|dx| self.sample_mapped((x + dx as i32) as f64, (y + dy as i32) as f64))
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(NoiseGrid {
            len,
            values: rows.into_iter().flatten().collect(),
        })
    }
}

/// Linearly rescale a [0, 1] value onto the integer range `[min, max]`.
///
/// The range is split into `max - min + 1` equal buckets, so every integer
/// in it is reachable.
pub fn to_int_scale(mapped: f64, min: i32, max: i32) -> i32 {
    let buckets = (max - min) as f64 + 1.0;
    let scaled = min as f64 + (mapped * buckets).floor();
    (scaled as i32).clamp(min.min(max), max.max(min))
}

fn layered<T>(fractal: FractalKind, seed: u32, octaves: usize, frequency: f64) -> NoiseSource
where
    T: NoiseFn<f64, 2> + Seedable + Default + Clone + Send + Sync + 'static,
{
    match fractal {
        FractalKind::None => Box::new(T::default().set_seed(seed)),
        FractalKind::Fbm => Box::new(
            Fbm::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(frequency),
        ),
        FractalKind::Billow => Box::new(
            Billow::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(frequency),
        ),
        FractalKind::RidgedMulti => Box::new(
            RidgedMulti::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(frequency),
        ),
    }
}

/// Square grid of mapped samples, row-major by y.
#[derive(Clone, Debug)]
pub struct NoiseGrid {
    len: usize,
    values: Vec<f64>,
}

impl NoiseGrid {
    /// Value at grid cell `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.len + x]
    }
}
