//! Block materials and sparse block records

use glam::{IVec3, UVec2};
use serde::{Deserialize, Serialize};

use super::mesh::Face;

/// Material of a single voxel cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockType {
    #[default]
    Air = 0,
    Water = 1,
    Stone = 2,
    Bedrock = 3,
    Dirt = 4,
    Grass = 5,
    Sand = 6,
    Sandstone = 7,
    Gravel = 8,
    Clay = 9,
    Snow = 10,
    Ice = 11,
    PackedIce = 12,
    OakLog = 13,
    OakLeaves = 14,
    BirchLog = 15,
    BirchLeaves = 16,
    SpruceLog = 17,
    SpruceLeaves = 18,
    Cactus = 19,
    DeadBush = 20,
    Cobblestone = 21,
}

impl BlockType {
    /// Every block type, indexed by id.
    pub const ALL: [BlockType; 22] = [
        BlockType::Air,
        BlockType::Water,
        BlockType::Stone,
        BlockType::Bedrock,
        BlockType::Dirt,
        BlockType::Grass,
        BlockType::Sand,
        BlockType::Sandstone,
        BlockType::Gravel,
        BlockType::Clay,
        BlockType::Snow,
        BlockType::Ice,
        BlockType::PackedIce,
        BlockType::OakLog,
        BlockType::OakLeaves,
        BlockType::BirchLog,
        BlockType::BirchLeaves,
        BlockType::SpruceLog,
        BlockType::SpruceLeaves,
        BlockType::Cactus,
        BlockType::DeadBush,
        BlockType::Cobblestone,
    ];

    /// Numeric id for compact storage.
    pub fn to_id(self) -> u8 {
        self as u8
    }

    /// Block for a stored id. Unknown ids decode as air.
    pub fn from_id(id: u8) -> Self {
        Self::ALL.get(id as usize).copied().unwrap_or(BlockType::Air)
    }

    /// Air is the only empty block; everything else occludes and is meshed.
    pub fn is_air(self) -> bool {
        self == BlockType::Air
    }

    /// Texture atlas cell (column, row) for a face of this block.
    pub fn texture_cell(self, face: Face) -> UVec2 {
        let top = face == Face::PosY;
        let bottom = face == Face::NegY;
        let cell = match self {
            BlockType::Air => (0, 0),
            BlockType::Water => (13, 12),
            BlockType::Stone => (1, 0),
            BlockType::Bedrock => (1, 1),
            BlockType::Dirt => (2, 0),
            BlockType::Grass if top => (0, 0),
            BlockType::Grass if bottom => (2, 0),
            BlockType::Grass => (3, 0),
            BlockType::Sand => (2, 1),
            BlockType::Sandstone if top => (0, 11),
            BlockType::Sandstone => (0, 12),
            BlockType::Gravel => (3, 1),
            BlockType::Clay => (8, 4),
            BlockType::Snow => (2, 4),
            BlockType::Ice => (3, 4),
            BlockType::PackedIce => (13, 11),
            BlockType::OakLog if top || bottom => (5, 1),
            BlockType::OakLog => (4, 1),
            BlockType::OakLeaves => (4, 3),
            BlockType::BirchLog if top || bottom => (5, 1),
            BlockType::BirchLog => (5, 7),
            BlockType::BirchLeaves => (5, 8),
            BlockType::SpruceLog if top || bottom => (5, 1),
            BlockType::SpruceLog => (4, 7),
            BlockType::SpruceLeaves => (4, 8),
            BlockType::Cactus if top => (5, 4),
            BlockType::Cactus => (6, 4),
            BlockType::DeadBush => (7, 3),
            BlockType::Cobblestone => (0, 1),
        };
        UVec2::new(cell.0, cell.1)
    }
}

/// A block at a position: dense generation output and sparse override lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRecord {
    pub position: IVec3,
    pub block: BlockType,
}

impl BlockRecord {
    pub fn new(position: IVec3, block: BlockType) -> Self {
        Self { position, block }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_covers_all() {
        for (i, block) in BlockType::ALL.iter().enumerate() {
            assert_eq!(block.to_id() as usize, i);
            assert_eq!(BlockType::from_id(block.to_id()), *block);
        }
        assert_eq!(BlockType::from_id(200), BlockType::Air);
    }

    #[test]
    fn test_only_air_is_empty() {
        assert!(BlockType::Air.is_air());
        assert!(!BlockType::Water.is_air());
        assert!(!BlockType::OakLeaves.is_air());
    }

    #[test]
    fn test_grass_faces_differ() {
        let top = BlockType::Grass.texture_cell(Face::PosY);
        let side = BlockType::Grass.texture_cell(Face::PosX);
        let bottom = BlockType::Grass.texture_cell(Face::NegY);
        assert_ne!(top, side);
        assert_eq!(bottom, BlockType::Dirt.texture_cell(Face::PosX));
    }

    #[test]
    fn test_atlas_cells_fit_grid() {
        for block in BlockType::ALL {
            for face in Face::ALL {
                let cell = block.texture_cell(face);
                assert!(cell.x < 16 && cell.y < 16);
            }
        }
    }
}
