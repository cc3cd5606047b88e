//! Column - a vertical stack of chunks at one (x, z) grid position.
//!
//! A column owns its chunks and the player overrides recorded against it.
//! Generation runs the terrain generator, routes structure blocks across
//! column edges, re-applies saved overrides and splits the result into chunks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{IVec3, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::block::{BlockRecord, BlockType};
use super::chunk::{Chunk, ChunkKey};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::streaming::save::SaveCollaborator;
use crate::terrain::generator::WorldGenerator;
use crate::terrain::placement::{self, NeighborAccess, StructureLedger};

/// Chunk edge length and number of chunks stacked per column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDims {
    pub chunk_size: i32,
    pub chunks_per_column: i32,
}

impl Default for ColumnDims {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            chunks_per_column: 16,
        }
    }
}

impl ColumnDims {
    pub fn new(chunk_size: i32, chunks_per_column: i32) -> Self {
        Self {
            chunk_size,
            chunks_per_column,
        }
    }

    /// Column height in blocks.
    pub fn height(&self) -> i32 {
        self.chunk_size * self.chunks_per_column
    }

    /// Blocks in one chunk.
    pub fn chunk_volume(&self) -> usize {
        (self.chunk_size * self.chunk_size * self.chunk_size) as usize
    }

    /// Whether a column-local position lies inside the column.
    pub fn contains(&self, local: IVec3) -> bool {
        local.x >= 0
            && local.z >= 0
            && local.y >= 0
            && local.x < self.chunk_size
            && local.z < self.chunk_size
            && local.y < self.height()
    }
}

/// Integer grid position of a column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnPos {
    pub x: i32,
    pub z: i32,
}

impl ColumnPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Column containing a world block position.
    pub fn from_world(world: IVec3, chunk_size: i32) -> Self {
        Self::new(world.x.div_euclid(chunk_size), world.z.div_euclid(chunk_size))
    }

    /// World block position of the column's (0, 0, 0) cell.
    pub fn world_origin(self, chunk_size: i32) -> IVec3 {
        IVec3::new(self.x * chunk_size, 0, self.z * chunk_size)
    }

    /// Horizontal distance, in column units, from a world point to the column center.
    pub fn distance_to(self, world: Vec3, chunk_size: i32) -> f32 {
        let dx = world.x / chunk_size as f32 - (self.x as f32 + 0.5);
        let dz = world.z / chunk_size as f32 - (self.z as f32 + 0.5);
        (dx * dx + dz * dz).sqrt()
    }

    /// The four edge-adjacent columns in +X, -X, +Z, -Z order.
    pub fn neighbors4(self) -> [ColumnPos; 4] {
        [
            self.offset(1, 0),
            self.offset(-1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
        ]
    }

    /// The eight surrounding columns.
    pub fn neighbors8(self) -> impl Iterator<Item = ColumnPos> {
        (-1..=1)
            .flat_map(move |dz| (-1..=1).map(move |dx| (dx, dz)))
            .filter(|&(dx, dz)| dx != 0 || dz != 0)
            .map(move |(dx, dz)| self.offset(dx, dz))
    }

    /// This column and its eight neighbors.
    pub fn neighborhood(self) -> impl Iterator<Item = ColumnPos> {
        std::iter::once(self).chain(self.neighbors8())
    }
}

/// Dense block storage for a whole column.
///
/// Indexed `(y * size + z) * size + x`, so each chunk is one contiguous slab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnBlocks {
    dims: ColumnDims,
    blocks: Vec<BlockType>,
}

impl ColumnBlocks {
    pub fn new(dims: ColumnDims) -> Self {
        Self {
            dims,
            blocks: vec![BlockType::Air; dims.chunk_volume() * dims.chunks_per_column as usize],
        }
    }

    pub fn dims(&self) -> ColumnDims {
        self.dims
    }

    fn index(&self, local: IVec3) -> usize {
        let size = self.dims.chunk_size;
        ((local.y * size + local.z) * size + local.x) as usize
    }

    pub fn get(&self, local: IVec3) -> Option<BlockType> {
        self.dims
            .contains(local)
            .then(|| self.blocks[self.index(local)])
    }

    /// Overwrite a cell. Returns false outside the column.
    pub fn set(&mut self, local: IVec3, block: BlockType) -> bool {
        if !self.dims.contains(local) {
            return false;
        }
        let index = self.index(local);
        self.blocks[index] = block;
        true
    }

    /// Write only into air. Returns true if the cell changed.
    pub fn merge(&mut self, local: IVec3, block: BlockType) -> bool {
        if !self.dims.contains(local) {
            return false;
        }
        let index = self.index(local);
        if self.blocks[index].is_air() {
            self.blocks[index] = block;
            true
        } else {
            false
        }
    }

    pub fn as_slice(&self) -> &[BlockType] {
        &self.blocks
    }

    /// Split into per-chunk block vectors, bottom first.
    pub fn into_chunks(self) -> Vec<Vec<BlockType>> {
        self.blocks
            .chunks(self.dims.chunk_volume())
            .map(<[BlockType]>::to_vec)
            .collect()
    }
}

/// A freshly generated column plus the neighbor chunks its structures touched.
pub struct ColumnBuild {
    pub column: Column,
    pub rebake: Vec<ChunkKey>,
}

/// Resident vertical stack of chunks.
pub struct Column {
    pos: ColumnPos,
    dims: ColumnDims,
    chunks: Vec<Arc<Chunk>>,
    /// Player edits, keyed by column-local position
    overrides: Mutex<HashMap<IVec3, BlockType>>,
    /// Overrides changed since the last save
    dirty: AtomicBool,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("pos", &self.pos)
            .field("chunks", &self.chunks.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl Column {
    /// Build a column from finished block data.
    pub fn from_blocks(pos: ColumnPos, blocks: ColumnBlocks, overrides: HashMap<IVec3, BlockType>) -> Self {
        let dims = blocks.dims();
        let chunks = blocks
            .into_chunks()
            .into_iter()
            .enumerate()
            .map(|(i, data)| {
                Arc::new(Chunk::with_blocks(
                    ChunkKey::new(pos, i as i32),
                    dims.chunk_size,
                    data,
                ))
            })
            .collect();
        Self {
            pos,
            dims,
            chunks,
            overrides: Mutex::new(overrides),
            dirty: AtomicBool::new(false),
        }
    }

    /// Generate a column: terrain, pending ghost blocks, structures, saved overrides.
    ///
    /// Ghost blocks and spill replayed from recorded neighbor placements take
    /// precedence over terrain; this column's own structures only fill air.
    /// Structure blocks that land in a resident neighbor are written into it
    /// directly and the touched chunks are returned for rebaking; blocks for
    /// non-resident neighbors are parked in the ledger's ghost buffer.
    ///
    /// Saved overrides are loaded before the ledger or any neighbor is
    /// touched, so a failed load leaves both unchanged.
    pub fn generate(
        pos: ColumnPos,
        generator: &WorldGenerator,
        save: &dyn SaveCollaborator,
        ledger: &Mutex<StructureLedger>,
        neighbors: &dyn NeighborAccess,
    ) -> Result<ColumnBuild> {
        let mut generated = generator.generate(pos)?;
        let saved = save.load(pos)?.unwrap_or_default();
        let dims = generator.dims();

        let (ghosts, recorded, nearby) = {
            let mut ledger = ledger.lock();
            (
                ledger.take_ghosts(pos),
                ledger.placements(pos).map(<[_]>::to_vec),
                ledger.neighbor_placements(pos),
            )
        };

        let mut claimed = HashSet::new();
        for ghost in &ghosts {
            if generated.blocks.set(ghost.position, ghost.block) {
                claimed.insert(ghost.position);
            }
        }
        placement::replay_neighbor_spill(
            pos,
            &mut generated.blocks,
            &nearby,
            generator.structures(),
            &mut claimed,
        );

        let placements = match recorded {
            Some(placements) => placements,
            None => {
                let existing = placement::anchors_in_frame(pos, &nearby, dims.chunk_size);
                generator.select_placements(&generated, &existing)
            }
        };
        let spill = placement::write_placements(
            pos,
            &mut generated.blocks,
            &placements,
            generator.structures(),
            neighbors,
        );

        {
            let mut ledger = ledger.lock();
            for (target, record) in spill.ghosts {
                ledger.push_ghost(target, record);
            }
            ledger.record(pos, placements);
        }

        let mut overrides = HashMap::new();
        for record in saved {
            if generated.blocks.set(record.position, record.block) {
                overrides.insert(record.position, record.block);
            } else {
                log::debug!("Ignoring override outside column {:?}: {:?}", pos, record.position);
            }
        }

        Ok(ColumnBuild {
            column: Column::from_blocks(pos, generated.blocks, overrides),
            rebake: spill.rebake,
        })
    }

    pub fn pos(&self) -> ColumnPos {
        self.pos
    }

    pub fn dims(&self) -> ColumnDims {
        self.dims
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn chunk(&self, index: i32) -> Option<&Arc<Chunk>> {
        usize::try_from(index).ok().and_then(|i| self.chunks.get(i))
    }

    /// Chunk holding a column-local position and the position within it.
    fn locate(&self, local: IVec3) -> Option<(&Arc<Chunk>, IVec3)> {
        if !self.dims.contains(local) {
            return None;
        }
        let size = self.dims.chunk_size;
        let chunk = self.chunk(local.y / size)?;
        Some((chunk, IVec3::new(local.x, local.y % size, local.z)))
    }

    /// Block at a column-local position.
    pub fn block_at(&self, local: IVec3) -> Option<BlockType> {
        let (chunk, inner) = self.locate(local)?;
        chunk.block(inner)
    }

    /// Write a block spilled from a neighbor's structure. Cells holding a
    /// player override are left alone. Returns the chunk that changed.
    pub fn place_spill(&self, local: IVec3, block: BlockType) -> Option<ChunkKey> {
        if self.overrides.lock().contains_key(&local) {
            return None;
        }
        let (chunk, inner) = self.locate(local)?;
        (chunk.block(inner)? != block && chunk.set_block(inner, block)).then(|| chunk.key())
    }

    /// Apply a player edit and record it as an override.
    ///
    /// Returns the owning chunk followed by every chunk that shares the
    /// edited cell's faces, including chunks in neighboring columns.
    pub fn change_block(&self, local: IVec3, block: BlockType) -> Result<Vec<ChunkKey>> {
        let (chunk, inner) = self.locate(local).ok_or(Error::BlockOutOfBounds(local))?;
        if !chunk.set_block(inner, block) {
            log::debug!("Edit at {:?} hit unloaded chunk {:?}", local, chunk.key());
        }
        self.overrides.lock().insert(local, block);
        self.dirty.store(true, Ordering::Release);

        let size = self.dims.chunk_size;
        let index = chunk.key().index;
        let mut keys = vec![chunk.key()];
        if inner.y == 0 && index > 0 {
            keys.push(ChunkKey::new(self.pos, index - 1));
        }
        if inner.y == size - 1 && index + 1 < self.dims.chunks_per_column {
            keys.push(ChunkKey::new(self.pos, index + 1));
        }
        if local.x == 0 {
            keys.push(ChunkKey::new(self.pos.offset(-1, 0), index));
        }
        if local.x == size - 1 {
            keys.push(ChunkKey::new(self.pos.offset(1, 0), index));
        }
        if local.z == 0 {
            keys.push(ChunkKey::new(self.pos.offset(0, -1), index));
        }
        if local.z == size - 1 {
            keys.push(ChunkKey::new(self.pos.offset(0, 1), index));
        }
        Ok(keys)
    }

    /// Recorded overrides sorted by position.
    pub fn overrides(&self) -> Vec<BlockRecord> {
        let mut records: Vec<BlockRecord> = self
            .overrides
            .lock()
            .iter()
            .map(|(&position, &block)| BlockRecord::new(position, block))
            .collect();
        records.sort_by_key(|r| (r.position.x, r.position.y, r.position.z));
        records
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag after a successful save.
    pub fn mark_saved(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn all_unloaded(&self) -> bool {
        self.chunks.iter().all(|c| c.is_unloaded())
    }

    pub fn any_unloaded(&self) -> bool {
        self.chunks.iter().any(|c| c.is_unloaded())
    }
}
