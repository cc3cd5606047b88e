//! Biome classification by height, temperature and humidity
//!
//! Classification is two-staged: a height range picks a [`BiomeCategory`],
//! then the category's candidate list is scanned for the first biome whose
//! temperature/humidity rectangle contains the sample. The standard tables
//! partition the configured domain; [`BiomeRegistry::validate`] proves it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::structure::StructureType;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::block::BlockType;

/// Inclusive integer range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: i32,
    pub max: i32,
}

impl ValueRange {
    /// Matches every value.
    pub const ANY: ValueRange = ValueRange {
        min: i32::MIN,
        max: i32::MAX,
    };

    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        self.min <= value && value <= self.max
    }

    /// Clamp this range to `bounds`, None if they do not overlap.
    pub fn intersect(&self, bounds: ValueRange) -> Option<ValueRange> {
        let min = self.min.max(bounds.min);
        let max = self.max.min(bounds.max);
        (min <= max).then_some(ValueRange { min, max })
    }
}

/// Coarse height band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiomeCategory {
    Ocean,
    Plain,
    Mountain,
    Peak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiomeType {
    FrozenOcean,
    Ocean,
    WarmOcean,
    Tundra,
    SpruceForest,
    Meadow,
    BirchForest,
    OakForest,
    Swamp,
    Desert,
    Savanna,
    RockyMountains,
    ForestedMountains,
    SnowyPeaks,
}

/// Height band and the biomes it may contain, in priority order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiomeCategoryConfig {
    pub category: BiomeCategory,
    pub height: ValueRange,
    pub biomes: Vec<BiomeType>,
}

/// Climate rectangle, block layering and structure choices for one biome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiomeConfig {
    pub biome: BiomeType,
    pub temperature: ValueRange,
    pub humidity: ValueRange,
    pub top_block: BlockType,
    pub middle_block: BlockType,
    pub bottom_block: BlockType,
    /// Cells of `middle_block` below the surface
    pub top_layer_height: i32,
    /// Cells of `bottom_block` below the middle layer
    pub bottom_layer_height: i32,
    pub primary_structure: Option<StructureType>,
    pub secondary_structure: Option<StructureType>,
    pub rare_structure: Option<StructureType>,
    /// Upper bound on structures per column
    pub vegetation_density: u32,
}

impl BiomeConfig {
    /// Block at height `y` in a cell whose surface is at `surface`.
    pub fn layer_block(&self, y: i32, surface: i32, water_level: i32) -> BlockType {
        if y == 0 {
            return BlockType::Bedrock;
        }
        if y > surface {
            return if y <= water_level {
                BlockType::Water
            } else {
                BlockType::Air
            };
        }
        let depth = surface - y;
        if depth == 0 {
            self.top_block
        } else if depth <= self.top_layer_height {
            self.middle_block
        } else if depth <= self.top_layer_height + self.bottom_layer_height {
            self.bottom_block
        } else {
            BlockType::Stone
        }
    }

    /// Structure for a candidate cell, given its density score and rare roll.
    pub fn structure_for(&self, density: f64, rare_roll: bool) -> Option<StructureType> {
        if rare_roll && self.rare_structure.is_some() {
            return self.rare_structure;
        }
        let (first, second) = if density >= 0.5 {
            (self.primary_structure, self.secondary_structure)
        } else {
            (self.secondary_structure, self.primary_structure)
        };
        first.or(second)
    }
}

/// Immutable biome tables built once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiomeRegistry {
    categories: Vec<BiomeCategoryConfig>,
    biomes: HashMap<BiomeType, BiomeConfig>,
}

impl BiomeRegistry {
    pub fn new(categories: Vec<BiomeCategoryConfig>, biomes: Vec<BiomeConfig>) -> Self {
        Self {
            categories,
            biomes: biomes.into_iter().map(|b| (b.biome, b)).collect(),
        }
    }

    /// Height band for a surface height.
    pub fn category_for(&self, height: i32) -> Result<&BiomeCategoryConfig> {
        self.categories
            .iter()
            .find(|c| c.height.contains(height))
            .ok_or(Error::NoBiomeCategory { height })
    }

    pub fn get(&self, biome: BiomeType) -> Option<&BiomeConfig> {
        self.biomes.get(&biome)
    }

    /// Classify a surface cell. No match is a table-authoring error.
    pub fn classify(&self, height: i32, temperature: i32, humidity: i32) -> Result<&BiomeConfig> {
        let category = self.category_for(height)?;
        category
            .biomes
            .iter()
            .filter_map(|b| self.biomes.get(b))
            .find(|b| b.temperature.contains(temperature) && b.humidity.contains(humidity))
            .ok_or(Error::NoBiome {
                category: category.category,
                height,
                temperature,
                humidity,
            })
    }

    /// Check that every integer sample in the domain has exactly one category
    /// and exactly one biome.
    pub fn validate(
        &self,
        height: ValueRange,
        temperature: ValueRange,
        humidity: ValueRange,
    ) -> Result<()> {
        for category in &self.categories {
            if let Some(missing) = category.biomes.iter().find(|b| !self.biomes.contains_key(b)) {
                return Err(Error::Config(format!(
                    "category {:?} lists unregistered biome {missing:?}",
                    category.category
                )));
            }
        }

        for h in height.min..=height.max {
            let mut matching = self.categories.iter().filter(|c| c.height.contains(h));
            let Some(category) = matching.next() else {
                return Err(Error::NoBiomeCategory { height: h });
            };
            if let Some(other) = matching.next() {
                return Err(Error::Config(format!(
                    "height {h} matches both {:?} and {:?}",
                    category.category, other.category
                )));
            }
        }

        for category in &self.categories {
            let Some(band) = category.height.intersect(height) else {
                continue;
            };
            for t in temperature.min..=temperature.max {
                for m in humidity.min..=humidity.max {
                    let hits = category
                        .biomes
                        .iter()
                        .filter_map(|b| self.biomes.get(b))
                        .filter(|b| b.temperature.contains(t) && b.humidity.contains(m))
                        .count();
                    match hits {
                        0 => {
                            return Err(Error::NoBiome {
                                category: category.category,
                                height: band.min,
                                temperature: t,
                                humidity: m,
                            });
                        }
                        1 => {}
                        _ => {
                            return Err(Error::Config(format!(
                                "{:?} biomes overlap at temperature {t}, humidity {m}",
                                category.category
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Iterate over all registered biomes.
    pub fn biomes(&self) -> impl Iterator<Item = &BiomeConfig> {
        self.biomes.values()
    }
}

impl Default for BiomeRegistry {
    fn default() -> Self {
        Self::new(default_categories(), default_biomes())
    }
}

fn default_categories() -> Vec<BiomeCategoryConfig> {
    use BiomeType::*;
    vec![
        BiomeCategoryConfig {
            category: BiomeCategory::Ocean,
            height: ValueRange::new(0, 99),
            biomes: vec![FrozenOcean, Ocean, WarmOcean],
        },
        BiomeCategoryConfig {
            category: BiomeCategory::Plain,
            height: ValueRange::new(100, 139),
            biomes: vec![
                Tundra,
                SpruceForest,
                Meadow,
                BirchForest,
                OakForest,
                Swamp,
                Desert,
                Savanna,
            ],
        },
        BiomeCategoryConfig {
            category: BiomeCategory::Mountain,
            height: ValueRange::new(140, 179),
            biomes: vec![RockyMountains, ForestedMountains],
        },
        BiomeCategoryConfig {
            category: BiomeCategory::Peak,
            height: ValueRange::new(180, 255),
            biomes: vec![SnowyPeaks],
        },
    ]
}

#[allow(clippy::too_many_arguments)]
fn biome(
    biome: BiomeType,
    temperature: ValueRange,
    humidity: ValueRange,
    layers: [BlockType; 3],
    layer_heights: (i32, i32),
    structures: [Option<StructureType>; 3],
    vegetation_density: u32,
) -> BiomeConfig {
    BiomeConfig {
        biome,
        temperature,
        humidity,
        top_block: layers[0],
        middle_block: layers[1],
        bottom_block: layers[2],
        top_layer_height: layer_heights.0,
        bottom_layer_height: layer_heights.1,
        primary_structure: structures[0],
        secondary_structure: structures[1],
        rare_structure: structures[2],
        vegetation_density,
    }
}

fn default_biomes() -> Vec<BiomeConfig> {
    use BlockType as B;
    use StructureType as S;
    let any = ValueRange::ANY;
    let r = ValueRange::new;
    vec![
        biome(BiomeType::FrozenOcean, r(-10, 4), any, [B::Gravel, B::Gravel, B::Stone], (3, 4), [None, None, None], 0),
        biome(BiomeType::Ocean, r(5, 29), any, [B::Sand, B::Sand, B::Clay], (3, 3), [None, None, None], 0),
        biome(BiomeType::WarmOcean, r(30, 40), any, [B::Sand, B::Sand, B::Sandstone], (4, 4), [None, None, None], 0),
        biome(
            BiomeType::Tundra,
            r(-10, 4),
            r(0, 49),
            [B::Snow, B::Dirt, B::Stone],
            (2, 3),
            [Some(S::Boulder), Some(S::DeadBush), Some(S::IceSpike)],
            2,
        ),
        biome(
            BiomeType::SpruceForest,
            r(-10, 4),
            r(50, 100),
            [B::Grass, B::Dirt, B::Stone],
            (3, 3),
            [Some(S::SpruceTree), Some(S::Shrub), Some(S::Boulder)],
            6,
        ),
        biome(
            BiomeType::Meadow,
            r(5, 14),
            r(0, 49),
            [B::Grass, B::Dirt, B::Stone],
            (3, 3),
            [Some(S::Shrub), Some(S::OakTree), Some(S::Boulder)],
            3,
        ),
        biome(
            BiomeType::BirchForest,
            r(5, 14),
            r(50, 100),
            [B::Grass, B::Dirt, B::Stone],
            (3, 3),
            [Some(S::BirchTree), Some(S::OakTree), Some(S::FallenLog)],
            6,
        ),
        biome(
            BiomeType::OakForest,
            r(15, 30),
            r(0, 33),
            [B::Grass, B::Dirt, B::Stone],
            (3, 3),
            [Some(S::OakTree), Some(S::Shrub), Some(S::FallenLog)],
            6,
        ),
        biome(
            BiomeType::Swamp,
            r(15, 30),
            r(34, 100),
            [B::Grass, B::Dirt, B::Clay],
            (2, 4),
            [Some(S::SwampOak), Some(S::Shrub), None],
            4,
        ),
        biome(
            BiomeType::Desert,
            r(31, 40),
            r(0, 49),
            [B::Sand, B::Sand, B::Sandstone],
            (4, 6),
            [Some(S::Cactus), Some(S::DeadBush), Some(S::DesertWell)],
            2,
        ),
        biome(
            BiomeType::Savanna,
            r(31, 40),
            r(50, 100),
            [B::Grass, B::Dirt, B::Stone],
            (3, 3),
            [Some(S::OakTree), Some(S::DeadBush), Some(S::Boulder)],
            2,
        ),
        biome(
            BiomeType::RockyMountains,
            any,
            r(0, 50),
            [B::Stone, B::Gravel, B::Stone],
            (1, 2),
            [Some(S::Boulder), None, None],
            1,
        ),
        biome(
            BiomeType::ForestedMountains,
            any,
            r(51, 100),
            [B::Grass, B::Dirt, B::Stone],
            (2, 2),
            [Some(S::SpruceTree), Some(S::Boulder), None],
            4,
        ),
        biome(BiomeType::SnowyPeaks, any, any, [B::Snow, B::PackedIce, B::Stone], (2, 3), [None, None, Some(S::IceSpike)], 1),
    ]
}
