//! Multi-block structure templates
//!
//! A structure is a fixed list of offsets relative to the ground cell it is
//! anchored on. Offsets start at `y = 1` so the anchor itself is never
//! overwritten. Templates may reach past a column edge; placement in
//! [`super::placement`] routes such blocks to the neighbor.

use std::collections::HashMap;

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::voxel::block::BlockType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureType {
    OakTree,
    BirchTree,
    SpruceTree,
    SwampOak,
    Cactus,
    Shrub,
    DeadBush,
    Boulder,
    IceSpike,
    DesertWell,
    FallenLog,
}

impl StructureType {
    pub const ALL: [StructureType; 11] = [
        StructureType::OakTree,
        StructureType::BirchTree,
        StructureType::SpruceTree,
        StructureType::SwampOak,
        StructureType::Cactus,
        StructureType::Shrub,
        StructureType::DeadBush,
        StructureType::Boulder,
        StructureType::IceSpike,
        StructureType::DesertWell,
        StructureType::FallenLog,
    ];
}

/// Rotate a horizontal offset by `quarter_turns` * 90 degrees about the y axis.
pub fn rotate_offset(offset: IVec3, quarter_turns: u8) -> IVec3 {
    let mut v = offset;
    for _ in 0..(quarter_turns % 4) {
        v = IVec3::new(-v.z, v.y, v.x);
    }
    v
}

/// Block template of one structure type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Structure {
    pub blocks: Vec<(IVec3, BlockType)>,
}

impl Structure {
    /// Largest horizontal reach from the anchor.
    pub fn extent(&self) -> i32 {
        self.blocks
            .iter()
            .map(|(o, _)| o.x.abs().max(o.z.abs()))
            .max()
            .unwrap_or(0)
    }

    /// World-space blocks for a placement at `anchor` with the given rotation.
    pub fn placed_blocks(
        &self,
        anchor: IVec3,
        rotation: u8,
    ) -> impl Iterator<Item = (IVec3, BlockType)> + '_ {
        self.blocks
            .iter()
            .map(move |&(offset, block)| (anchor + rotate_offset(offset, rotation), block))
    }

    fn set(&mut self, offset: IVec3, block: BlockType) {
        match self.blocks.iter_mut().find(|(o, _)| *o == offset) {
            Some(entry) => entry.1 = block,
            None => self.blocks.push((offset, block)),
        }
    }

    fn column(&mut self, x: i32, z: i32, ys: std::ops::RangeInclusive<i32>, block: BlockType) {
        for y in ys {
            self.set(IVec3::new(x, y, z), block);
        }
    }

    /// Square layer of half-width `radius`, optionally without the corners.
    /// Existing cells are kept so trunks stay intact.
    fn layer(&mut self, y: i32, radius: i32, trim_corners: bool, block: BlockType) {
        for x in -radius..=radius {
            for z in -radius..=radius {
                if trim_corners && radius > 0 && x.abs() == radius && z.abs() == radius {
                    continue;
                }
                let offset = IVec3::new(x, y, z);
                if !self.blocks.iter().any(|(o, _)| *o == offset) {
                    self.blocks.push((offset, block));
                }
            }
        }
    }

    fn cross(&mut self, y: i32, block: BlockType) {
        for (x, z) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
            let offset = IVec3::new(x, y, z);
            if !self.blocks.iter().any(|(o, _)| *o == offset) {
                self.blocks.push((offset, block));
            }
        }
    }
}

fn broadleaf(log: BlockType, leaves: BlockType, trunk: i32) -> Structure {
    let mut s = Structure::default();
    s.column(0, 0, 1..=trunk, log);
    s.layer(trunk - 1, 2, true, leaves);
    s.layer(trunk, 2, true, leaves);
    s.layer(trunk + 1, 1, false, leaves);
    s.cross(trunk + 2, leaves);
    s
}

fn spruce() -> Structure {
    let mut s = Structure::default();
    s.column(0, 0, 1..=7, BlockType::SpruceLog);
    s.layer(3, 2, true, BlockType::SpruceLeaves);
    s.layer(4, 1, true, BlockType::SpruceLeaves);
    s.layer(5, 2, true, BlockType::SpruceLeaves);
    s.layer(6, 1, false, BlockType::SpruceLeaves);
    s.cross(7, BlockType::SpruceLeaves);
    s.set(IVec3::new(0, 8, 0), BlockType::SpruceLeaves);
    s
}

fn swamp_oak() -> Structure {
    let mut s = Structure::default();
    s.column(0, 0, 1..=4, BlockType::OakLog);
    s.layer(4, 3, true, BlockType::OakLeaves);
    s.layer(5, 2, true, BlockType::OakLeaves);
    // Hanging leaves off the canopy edge
    for (x, z) in [(3, 0), (-3, 0), (0, 3), (0, -3)] {
        s.set(IVec3::new(x, 3, z), BlockType::OakLeaves);
    }
    s
}

fn shrub() -> Structure {
    let mut s = Structure::default();
    s.set(IVec3::new(0, 1, 0), BlockType::OakLog);
    s.cross(1, BlockType::OakLeaves);
    s.set(IVec3::new(0, 2, 0), BlockType::OakLeaves);
    s
}

fn boulder() -> Structure {
    let mut s = Structure::default();
    s.layer(1, 1, false, BlockType::Cobblestone);
    s.layer(2, 1, true, BlockType::Cobblestone);
    s.set(IVec3::new(1, 1, 1), BlockType::Stone);
    s.set(IVec3::new(0, 3, 0), BlockType::Cobblestone);
    s
}

fn ice_spike() -> Structure {
    let mut s = Structure::default();
    s.layer(1, 1, true, BlockType::PackedIce);
    s.layer(2, 1, true, BlockType::PackedIce);
    s.column(0, 0, 1..=9, BlockType::PackedIce);
    s.set(IVec3::new(0, 10, 0), BlockType::Ice);
    s
}

fn desert_well() -> Structure {
    let mut s = Structure::default();
    s.set(IVec3::new(0, 1, 0), BlockType::Water);
    s.layer(1, 2, false, BlockType::Sandstone);
    for (x, z) in [(-1, -1), (-1, 1), (1, -1), (1, 1)] {
        s.column(x, z, 2..=4, BlockType::Sandstone);
    }
    s.layer(5, 1, false, BlockType::Sandstone);
    s
}

fn fallen_log() -> Structure {
    let mut s = Structure::default();
    for x in -2..=2 {
        s.set(IVec3::new(x, 1, 0), BlockType::OakLog);
    }
    s
}

fn single(block: BlockType, height: i32) -> Structure {
    let mut s = Structure::default();
    s.column(0, 0, 1..=height, block);
    s
}

/// Immutable structure templates, built once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructureRegistry {
    structures: HashMap<StructureType, Structure>,
}

impl StructureRegistry {
    pub fn new(structures: HashMap<StructureType, Structure>) -> Self {
        Self { structures }
    }

    pub fn get(&self, kind: StructureType) -> Option<&Structure> {
        self.structures.get(&kind)
    }

    /// Largest horizontal reach of any template.
    pub fn max_extent(&self) -> i32 {
        self.structures.values().map(Structure::extent).max().unwrap_or(0)
    }
}

impl Default for StructureRegistry {
    fn default() -> Self {
        let structures = StructureType::ALL
            .iter()
            .map(|&kind| {
                let template = match kind {
                    StructureType::OakTree => broadleaf(BlockType::OakLog, BlockType::OakLeaves, 5),
                    StructureType::BirchTree => broadleaf(BlockType::BirchLog, BlockType::BirchLeaves, 6),
                    StructureType::SpruceTree => spruce(),
                    StructureType::SwampOak => swamp_oak(),
                    StructureType::Cactus => single(BlockType::Cactus, 3),
                    StructureType::Shrub => shrub(),
                    StructureType::DeadBush => single(BlockType::DeadBush, 1),
                    StructureType::Boulder => boulder(),
                    StructureType::IceSpike => ice_spike(),
                    StructureType::DesertWell => desert_well(),
                    StructureType::FallenLog => fallen_log(),
                };
                (kind, template)
            })
            .collect();
        Self { structures }
    }
}
