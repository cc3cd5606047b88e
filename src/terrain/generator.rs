//! Noise-based column generation
//!
//! [`WorldGenerator`] is a pure function of its configuration: the same seed
//! and column position always produce the same blocks. Each column samples
//! five noise grids over its footprint (height, temperature, humidity,
//! vegetation density, structure rotation), classifies every cell into a
//! biome and fills it with that biome's layering.

use std::sync::Arc;

use glam::IVec3;

use super::biome::{BiomeRegistry, BiomeType};
use super::noise_map::{NoiseGrid, NoiseMap, to_int_scale};
use super::placement::{self, Placement, PlacementRules};
use super::structure::StructureRegistry;
use crate::core::config::WorldConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::column::{ColumnBlocks, ColumnDims, ColumnPos};

/// Terrain for one column before structures and overrides are applied.
#[derive(Clone, Debug)]
pub struct GeneratedColumn {
    pub pos: ColumnPos,
    pub blocks: ColumnBlocks,
    /// Surface height per cell, index `z * size + x`
    pub heights: Vec<i32>,
    pub biomes: Vec<BiomeType>,
    pub vegetation: NoiseGrid,
    pub rotation: NoiseGrid,
}

impl GeneratedColumn {
    fn cell(&self, x: i32, z: i32) -> usize {
        (z * self.blocks.dims().chunk_size + x) as usize
    }

    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        self.heights[self.cell(x, z)]
    }

    pub fn biome_at(&self, x: i32, z: i32) -> BiomeType {
        self.biomes[self.cell(x, z)]
    }

    /// Vegetation density score in [0, 1].
    pub fn vegetation_at(&self, x: i32, z: i32) -> f64 {
        self.vegetation.get(x as usize, z as usize)
    }
}

/// Deterministic column terrain generator.
pub struct WorldGenerator {
    config: WorldConfig,
    biomes: Arc<BiomeRegistry>,
    structures: Arc<StructureRegistry>,
    height: NoiseMap,
    temperature: NoiseMap,
    humidity: NoiseMap,
    vegetation: NoiseMap,
    rotation: NoiseMap,
}

impl WorldGenerator {
    /// Build a generator, validating the configuration and registries.
    pub fn new(
        config: &WorldConfig,
        biomes: Arc<BiomeRegistry>,
        structures: Arc<StructureRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let generation = &config.generation;
        biomes.validate(
            generation.terrain_height,
            generation.temperature_range,
            generation.humidity_range,
        )?;

        if structures.max_extent() > config.dims.chunk_size {
            return Err(Error::Config(format!(
                "structures reach {} cells, wider than a {}-cell column",
                structures.max_extent(),
                config.dims.chunk_size
            )));
        }
        for biome in biomes.biomes() {
            let referenced = [
                biome.primary_structure,
                biome.secondary_structure,
                biome.rare_structure,
            ];
            if let Some(missing) = referenced.into_iter().flatten().find(|s| structures.get(*s).is_none()) {
                return Err(Error::Config(format!(
                    "biome {:?} uses unregistered structure {missing:?}",
                    biome.biome
                )));
            }
        }

        let seed = config.seed;
        Ok(Self {
            height: NoiseMap::from_settings(seed, &generation.height)?,
            temperature: NoiseMap::from_settings(seed, &generation.temperature)?,
            humidity: NoiseMap::from_settings(seed, &generation.humidity)?,
            vegetation: NoiseMap::from_settings(seed, &generation.vegetation)?,
            rotation: NoiseMap::from_settings(seed, &generation.rotation)?,
            config: config.clone(),
            biomes,
            structures,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn dims(&self) -> ColumnDims {
        self.config.dims
    }

    pub fn biomes(&self) -> &BiomeRegistry {
        &self.biomes
    }

    pub fn structures(&self) -> &StructureRegistry {
        &self.structures
    }

    /// Generate terrain for a column.
    ///
    /// Fails if a cell classifies to no biome or a spline leaves [0, 1].
    pub fn generate(&self, pos: ColumnPos) -> Result<GeneratedColumn> {
        let dims = self.config.dims;
        let size = dims.chunk_size;
        let len = size as usize;
        let origin = pos.world_origin(size);
        let generation = &self.config.generation;

        let height_grid = self.height.sample_grid(origin.x, origin.z, len)?;
        let temperature_grid = self.temperature.sample_grid(origin.x, origin.z, len)?;
        let humidity_grid = self.humidity.sample_grid(origin.x, origin.z, len)?;
        let vegetation = self.vegetation.sample_grid(origin.x, origin.z, len)?;
        let rotation = self.rotation.sample_grid(origin.x, origin.z, len)?;

        let mut blocks = ColumnBlocks::new(dims);
        let mut heights = Vec::with_capacity(len * len);
        let mut biomes = Vec::with_capacity(len * len);

        for z in 0..size {
            for x in 0..size {
                let (gx, gz) = (x as usize, z as usize);
                let range = generation.terrain_height;
                let height = to_int_scale(height_grid.get(gx, gz), range.min, range.max);
                let range = generation.temperature_range;
                let temperature = to_int_scale(temperature_grid.get(gx, gz), range.min, range.max);
                let range = generation.humidity_range;
                let humidity = to_int_scale(humidity_grid.get(gx, gz), range.min, range.max);

                let biome = self.biomes.classify(height, temperature, humidity)?;
                for y in 0..dims.height() {
                    let block = biome.layer_block(y, height, self.config.water_level);
                    if !block.is_air() {
                        blocks.set(IVec3::new(x, y, z), block);
                    }
                }
                heights.push(height);
                biomes.push(biome.biome);
            }
        }

        log::trace!("Generated terrain for column {:?}", pos);
        Ok(GeneratedColumn {
            pos,
            blocks,
            heights,
            biomes,
            vegetation,
            rotation,
        })
    }

    /// Choose structure anchors for generated terrain, avoiding `existing`
    /// anchors given in the column's local frame.
    pub fn select_placements(&self, generated: &GeneratedColumn, existing: &[IVec3]) -> Vec<Placement> {
        let rules = PlacementRules {
            seed: self.config.seed,
            spacing: self.config.spacing_between_structures,
            water_level: self.config.water_level,
            rare_chance: self.config.generation.rare_structure_chance,
        };
        placement::select_placements(generated, &self.biomes, existing, &rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::biome::ValueRange;
    use crate::terrain::structure::Structure;
    use crate::voxel::block::BlockType;

    fn generator_with_seed(seed: u32) -> WorldGenerator {
        let config = WorldConfig {
            seed,
            ..Default::default()
        };
        WorldGenerator::new(
            &config,
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generator_with_seed(0);
        let b = generator_with_seed(0);
        let pos = ColumnPos::new(0, 0);

        let first = a.generate(pos).unwrap();
        let second = b.generate(pos).unwrap();
        let repeat = a.generate(pos).unwrap();

        assert_eq!(first.heights, second.heights);
        assert_eq!(first.blocks, second.blocks);
        assert_eq!(first.blocks, repeat.blocks);
        assert_eq!(first.biomes, second.biomes);
    }

    #[test]
    fn test_seeds_differ() {
        let a = generator_with_seed(1).generate(ColumnPos::new(4, 4)).unwrap();
        let b = generator_with_seed(2).generate(ColumnPos::new(4, 4)).unwrap();
        assert_ne!(a.heights, b.heights);
    }

    #[test]
    fn test_heights_within_range_and_layered() {
        let generator = generator_with_seed(0);
        let column = generator.generate(ColumnPos::new(-3, 2)).unwrap();
        let water = generator.config().water_level;

        for z in 0..16 {
            for x in 0..16 {
                let h = column.height_at(x, z);
                assert!((64..=200).contains(&h));
                assert_eq!(column.blocks.get(IVec3::new(x, 0, z)), Some(BlockType::Bedrock));
                let surface = column.blocks.get(IVec3::new(x, h, z)).unwrap();
                assert!(!surface.is_air());
                let above = column.blocks.get(IVec3::new(x, h + 1, z)).unwrap();
                if h < water {
                    assert_eq!(above, BlockType::Water);
                } else {
                    assert_eq!(above, BlockType::Air);
                }
            }
        }
    }

    #[test]
    fn test_surface_matches_biome_top_block() {
        let generator = generator_with_seed(0);
        let column = generator.generate(ColumnPos::new(0, 0)).unwrap();
        for z in 0..16 {
            for x in 0..16 {
                let biome = generator.biomes().get(column.biome_at(x, z)).unwrap();
                let h = column.height_at(x, z);
                assert_eq!(column.blocks.get(IVec3::new(x, h, z)), Some(biome.top_block));
            }
        }
    }

    #[test]
    fn test_adjacent_columns_share_noise_field() {
        // Heights along a shared edge vary smoothly, not per column
        let generator = generator_with_seed(5);
        let left = generator.generate(ColumnPos::new(0, 0)).unwrap();
        let right = generator.generate(ColumnPos::new(1, 0)).unwrap();
        for z in 0..16 {
            let step = (left.height_at(15, z) - right.height_at(0, z)).abs();
            assert!(step <= 8, "edge step {step} at z {z}");
        }
    }

    #[test]
    fn test_rejects_registry_with_gap() {
        let config = WorldConfig {
            generation: crate::terrain::config::GenerationConfig {
                temperature_range: ValueRange::new(-50, 40),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = WorldGenerator::new(
            &config,
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::default()),
        );
        assert!(matches!(result, Err(Error::NoBiome { .. })));
    }

    #[test]
    fn test_rejects_structure_wider_than_column() {
        let mut wide = std::collections::HashMap::new();
        for kind in crate::terrain::structure::StructureType::ALL {
            wide.insert(
                kind,
                Structure {
                    blocks: vec![(IVec3::new(20, 1, 0), BlockType::Stone)],
                },
            );
        }
        let result = WorldGenerator::new(
            &WorldConfig::default(),
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::new(wide)),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_spline_fails_generation() {
        let mut config = WorldConfig::default();
        config.generation.humidity.control_points = vec![(0.0, 0.0), (0.001, 1.5), (0.999, 1.5)];
        // Control points are in range for x, so construction succeeds
        let generator = WorldGenerator::new(
            &config,
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::default()),
        )
        .unwrap();
        let err = generator.generate(ColumnPos::new(0, 0)).unwrap_err();
        assert!(matches!(err, Error::SplineOutOfRange { .. }));
    }
}
