//! Chunk - one dense cubic slab of a column, with its baked mesh.
//!
//! Block data sits behind a lock so the consumer thread can read while the
//! worker bakes. Lifecycle flags are atomics and readable without locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use glam::IVec3;
use parking_lot::RwLock;

use super::block::BlockType;
use super::column::{Column, ColumnPos};
use super::mesh::{ChunkMesh, Face};

/// Identifies a chunk: its column and its vertical index in that column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub column: ColumnPos,
    pub index: i32,
}

impl ChunkKey {
    pub fn new(column: ColumnPos, index: i32) -> Self {
        Self { column, index }
    }
}

/// Lifecycle stage of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Allocated, no block data yet
    Empty,
    /// Block data present, no mesh
    Generated,
    /// Mesh build in progress
    Baking,
    /// Mesh available
    Baked,
    /// Mesh and data released
    Unloaded,
}

/// Neighbor data consulted while baking. Missing entries mean "not resident".
#[derive(Default)]
pub struct BakeNeighbors {
    /// Chunk directly below in the same column
    pub below: Option<Arc<Chunk>>,
    /// Chunk directly above in the same column
    pub above: Option<Arc<Chunk>>,
    /// Horizontal neighbor columns in +X, -X, +Z, -Z order
    pub horizontal: [Option<Arc<Column>>; 4],
}

impl BakeNeighbors {
    fn horizontal_slot(offset: IVec3) -> usize {
        match (offset.x.signum(), offset.z.signum()) {
            (1, _) => 0,
            (-1, _) => 1,
            (_, 1) => 2,
            _ => 3,
        }
    }
}

/// Dense cubic grid of blocks with a derived mesh.
pub struct Chunk {
    key: ChunkKey,
    size: i32,
    /// World position of the (0, 0, 0) cell
    origin: IVec3,
    /// Index `(y * size + z) * size + x`; emptied on unload
    blocks: RwLock<Vec<BlockType>>,
    mesh: RwLock<Option<Arc<ChunkMesh>>>,
    generated: AtomicBool,
    baking: AtomicBool,
    baked: AtomicBool,
    unloaded: AtomicBool,
    bake_count: AtomicU32,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("bake_count", &self.bake_count())
            .finish()
    }
}

impl Chunk {
    /// Create an empty chunk with no block data.
    pub fn empty(key: ChunkKey, size: i32) -> Self {
        let origin = IVec3::new(
            key.column.x * size,
            key.index * size,
            key.column.z * size,
        );
        Self {
            key,
            size,
            origin,
            blocks: RwLock::new(Vec::new()),
            mesh: RwLock::new(None),
            generated: AtomicBool::new(false),
            baking: AtomicBool::new(false),
            baked: AtomicBool::new(false),
            unloaded: AtomicBool::new(false),
            bake_count: AtomicU32::new(0),
        }
    }

    /// Create a generated chunk from `size^3` blocks.
    pub fn with_blocks(key: ChunkKey, size: i32, blocks: Vec<BlockType>) -> Self {
        debug_assert_eq!(blocks.len(), (size * size * size) as usize);
        let chunk = Self::empty(key, size);
        *chunk.blocks.write() = blocks;
        chunk.generated.store(true, Ordering::Release);
        chunk
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// World position of the chunk's minimum corner.
    pub fn world_origin(&self) -> IVec3 {
        self.origin
    }

    pub fn state(&self) -> ChunkState {
        if self.unloaded.load(Ordering::Acquire) {
            ChunkState::Unloaded
        } else if self.baking.load(Ordering::Acquire) {
            ChunkState::Baking
        } else if self.baked.load(Ordering::Acquire) {
            ChunkState::Baked
        } else if self.generated.load(Ordering::Acquire) {
            ChunkState::Generated
        } else {
            ChunkState::Empty
        }
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }

    pub fn is_baked(&self) -> bool {
        self.baked.load(Ordering::Acquire)
    }

    /// Number of completed bakes.
    pub fn bake_count(&self) -> u32 {
        self.bake_count.load(Ordering::Relaxed)
    }

    fn in_bounds(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(self.size)).all()
    }

    fn index(&self, local: IVec3) -> usize {
        ((local.y * self.size + local.z) * self.size + local.x) as usize
    }

    /// Block at a chunk-local position. None outside the chunk or once unloaded.
    pub fn block(&self, local: IVec3) -> Option<BlockType> {
        if !self.in_bounds(local) {
            return None;
        }
        self.blocks.read().get(self.index(local)).copied()
    }

    /// Overwrite one block. Returns false if out of bounds or unloaded.
    pub fn set_block(&self, local: IVec3, block: BlockType) -> bool {
        if !self.in_bounds(local) {
            return false;
        }
        let index = self.index(local);
        match self.blocks.write().get_mut(index) {
            Some(cell) => {
                *cell = block;
                true
            }
            None => false,
        }
    }

    /// Current mesh, if baked.
    pub fn mesh(&self) -> Option<Arc<ChunkMesh>> {
        self.mesh.read().clone()
    }

    /// Rebuild the mesh from scratch against the given neighbors.
    ///
    /// A face is skipped only when the adjacent cell is resident and non-air.
    /// Faces against missing neighbors are emitted and fixed by a later rebake
    /// once that neighbor arrives. Returns the number of faces emitted.
    pub fn bake(&self, neighbors: &BakeNeighbors) -> usize {
        if self.is_unloaded() {
            return 0;
        }
        self.baking.store(true, Ordering::Release);

        let mut mesh = ChunkMesh::new();
        {
            let blocks = self.blocks.read();
            if blocks.is_empty() {
                self.baking.store(false, Ordering::Release);
                return 0;
            }
            for y in 0..self.size {
                for z in 0..self.size {
                    for x in 0..self.size {
                        let local = IVec3::new(x, y, z);
                        let block = blocks[self.index(local)];
                        if block.is_air() {
                            continue;
                        }
                        for face in Face::ALL {
                            let adjacent = local + face.offset();
                            let occluder = if self.in_bounds(adjacent) {
                                Some(blocks[self.index(adjacent)])
                            } else {
                                self.neighbor_block(adjacent, face.offset(), neighbors)
                            };
                            if occluder.is_some_and(|b| !b.is_air()) {
                                continue;
                            }
                            mesh.push_face(self.origin + local, face, block);
                        }
                    }
                }
            }
        }

        let faces = mesh.face_count();
        let mut slot = self.mesh.write();
        if self.is_unloaded() {
            self.baking.store(false, Ordering::Release);
            return 0;
        }
        *slot = Some(Arc::new(mesh));
        drop(slot);
        self.baked.store(true, Ordering::Release);
        self.bake_count.fetch_add(1, Ordering::Relaxed);
        self.baking.store(false, Ordering::Release);
        faces
    }

    /// Resolve a position just outside this chunk through the neighbor set.
    fn neighbor_block(
        &self,
        adjacent: IVec3,
        offset: IVec3,
        neighbors: &BakeNeighbors,
    ) -> Option<BlockType> {
        let wrapped = adjacent.rem_euclid(IVec3::splat(self.size));
        if offset.y != 0 {
            let chunk = if offset.y < 0 {
                neighbors.below.as_ref()
            } else {
                neighbors.above.as_ref()
            }?;
            return chunk.block(wrapped);
        }
        let column = neighbors.horizontal[BakeNeighbors::horizontal_slot(offset)].as_ref()?;
        column.chunk(self.key.index)?.block(wrapped)
    }

    /// Release the mesh and block data. The chunk cannot be baked afterwards.
    pub fn unload(&self) {
        {
            let mut mesh = self.mesh.write();
            self.unloaded.store(true, Ordering::Release);
            *mesh = None;
        }
        *self.blocks.write() = Vec::new();
        self.baked.store(false, Ordering::Release);
    }
}
