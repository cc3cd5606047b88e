//! Face templates and the triangle mesh produced by baking a chunk

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};

use super::block::BlockType;

/// Cells per side of the square texture atlas
pub const ATLAS_CELLS: u32 = 16;

/// One of the six axis-aligned block faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Unit offset to the cell this face looks at.
    pub fn offset(self) -> IVec3 {
        match self {
            Face::PosX => IVec3::X,
            Face::NegX => IVec3::NEG_X,
            Face::PosY => IVec3::Y,
            Face::NegY => IVec3::NEG_Y,
            Face::PosZ => IVec3::Z,
            Face::NegZ => IVec3::NEG_Z,
        }
    }

    pub fn normal(self) -> Vec3 {
        self.offset().as_vec3()
    }

    /// Quad corners in counter-clockwise order seen from outside the block.
    fn corners(self) -> [[f32; 3]; 4] {
        match self {
            Face::PosX => [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
            Face::NegX => [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
            Face::PosY => [[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            Face::NegY => [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            Face::PosZ => [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            Face::NegZ => [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
        }
    }
}

/// Quad UVs matching the corner order above, in atlas-cell units
const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// GPU-ready mesh vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

/// Indexed triangle list for one chunk, in world space.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one textured quad for `face` of the block at world position `origin`.
    pub fn push_face(&mut self, origin: IVec3, face: Face, block: BlockType) {
        let base = self.vertices.len() as u32;
        let cell = block.texture_cell(face);
        let scale = 1.0 / ATLAS_CELLS as f32;
        let origin = origin.as_vec3();
        let normal = face.normal().to_array();

        for (corner, uv) in face.corners().iter().zip(QUAD_UVS) {
            self.vertices.push(Vertex {
                position: (origin + Vec3::from_array(*corner)).to_array(),
                uv: [
                    (cell.x as f32 + uv[0]) * scale,
                    (cell.y as f32 + uv[1]) * scale,
                ],
                normal,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Number of quads in the mesh.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Raw vertex bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
