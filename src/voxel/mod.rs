//! Voxel data structures and meshing

pub mod block;
pub mod mesh;
pub mod chunk;
pub mod column;

pub use block::{BlockRecord, BlockType};
pub use chunk::{BakeNeighbors, Chunk, ChunkKey, ChunkState};
pub use column::{Column, ColumnBlocks, ColumnDims, ColumnPos};
pub use mesh::{ChunkMesh, Face, Vertex};
