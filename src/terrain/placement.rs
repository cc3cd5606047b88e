//! Structure placement across column boundaries
//!
//! Anchors are chosen greedily from a vegetation-density field, kept at least
//! `spacing` apart (Chebyshev) from each other and from anchors already
//! recorded in the eight neighboring columns. Blocks that fall outside the
//! generating column go straight into a resident neighbor, or wait in the
//! ghost buffer until that neighbor generates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::IVec3;

use super::biome::BiomeRegistry;
use super::generator::GeneratedColumn;
use super::structure::{StructureRegistry, StructureType};
use crate::voxel::block::{BlockRecord, BlockType};
use crate::voxel::chunk::ChunkKey;
use crate::voxel::column::{Column, ColumnBlocks, ColumnPos};

/// Read access to resident columns during generation.
pub trait NeighborAccess {
    fn resident_column(&self, pos: ColumnPos) -> Option<Arc<Column>>;
}

/// No column is resident.
pub struct NoNeighbors;

impl NeighborAccess for NoNeighbors {
    fn resident_column(&self, _pos: ColumnPos) -> Option<Arc<Column>> {
        None
    }
}

impl NeighborAccess for HashMap<ColumnPos, Arc<Column>> {
    fn resident_column(&self, pos: ColumnPos) -> Option<Arc<Column>> {
        self.get(&pos).cloned()
    }
}

/// One structure rooted in a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Column-local ground cell the structure stands on
    pub anchor: IVec3,
    pub structure: StructureType,
    /// Quarter turns about the y axis
    pub rotation: u8,
}

/// Parameters for anchor selection.
#[derive(Clone, Copy, Debug)]
pub struct PlacementRules {
    pub seed: u32,
    pub spacing: i32,
    pub water_level: i32,
    /// 1 in this many candidate cells rolls the biome's rare structure
    pub rare_chance: u32,
}

/// Counts removed by [`StructureLedger::prune`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub placements: usize,
    pub ghosts: usize,
}

/// Anchor table and ghost-block buffer shared by all column generations.
#[derive(Debug, Default)]
pub struct StructureLedger {
    placements: HashMap<ColumnPos, Vec<Placement>>,
    /// Pending blocks per target column; the first block written to a cell wins
    ghosts: HashMap<ColumnPos, HashMap<IVec3, BlockType>>,
}

impl StructureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placements recorded for a column.
    pub fn placements(&self, pos: ColumnPos) -> Option<&[Placement]> {
        self.placements.get(&pos).map(Vec::as_slice)
    }

    pub fn record(&mut self, pos: ColumnPos, placements: Vec<Placement>) {
        self.placements.insert(pos, placements);
    }

    /// Recorded placements of the eight surrounding columns.
    pub fn neighbor_placements(&self, pos: ColumnPos) -> Vec<(ColumnPos, Vec<Placement>)> {
        pos.neighbors8()
            .filter_map(|n| self.placements.get(&n).map(|p| (n, p.clone())))
            .collect()
    }

    pub fn push_ghost(&mut self, target: ColumnPos, record: BlockRecord) {
        self.ghosts
            .entry(target)
            .or_default()
            .entry(record.position)
            .or_insert(record.block);
    }

    /// Remove and return a column's pending ghost blocks, sorted by position.
    pub fn take_ghosts(&mut self, pos: ColumnPos) -> Vec<BlockRecord> {
        let mut records: Vec<BlockRecord> = self
            .ghosts
            .remove(&pos)
            .unwrap_or_default()
            .into_iter()
            .map(|(position, block)| BlockRecord::new(position, block))
            .collect();
        records.sort_by_key(|r| (r.position.y, r.position.z, r.position.x));
        records
    }

    pub fn ghosts_for(&self, pos: ColumnPos) -> Option<&HashMap<IVec3, BlockType>> {
        self.ghosts.get(&pos)
    }

    pub fn has_ghosts(&self, pos: ColumnPos) -> bool {
        self.ghosts.contains_key(&pos)
    }

    /// Total pending ghost blocks.
    pub fn ghost_count(&self) -> usize {
        self.ghosts.values().map(HashMap::len).sum()
    }

    /// Columns with recorded placements.
    pub fn anchor_count(&self) -> usize {
        self.placements.len()
    }

    /// Drop entries whose column and eight neighbors are all non-resident.
    pub fn prune(&mut self, is_resident: impl Fn(ColumnPos) -> bool) -> PruneStats {
        let keep = |pos: &ColumnPos| pos.neighborhood().any(&is_resident);

        let placements_before = self.placements.len();
        let ghosts_before = self.ghosts.len();
        self.placements.retain(|pos, _| keep(pos));
        self.ghosts.retain(|pos, _| keep(pos));

        PruneStats {
            placements: placements_before - self.placements.len(),
            ghosts: ghosts_before - self.ghosts.len(),
        }
    }

    pub fn shrink_to_fit(&mut self) {
        self.placements.shrink_to_fit();
        self.ghosts.shrink_to_fit();
    }
}

/// Blocks produced for columns other than the one generating.
#[derive(Debug, Default)]
pub struct Spill {
    /// Blocks for non-resident neighbors, in the neighbor's local frame
    pub ghosts: Vec<(ColumnPos, BlockRecord)>,
    /// Resident chunks that received blocks
    pub rebake: Vec<ChunkKey>,
}

/// Offset from `from`'s local frame into `to`'s local frame.
fn frame_shift(from: ColumnPos, to: ColumnPos, chunk_size: i32) -> IVec3 {
    IVec3::new((from.x - to.x) * chunk_size, 0, (from.z - to.z) * chunk_size)
}

fn chebyshev(a: IVec3, b: IVec3) -> i32 {
    (a.x - b.x).abs().max((a.z - b.z).abs())
}

/// Neighbor anchors translated into `pos`'s local frame.
pub fn anchors_in_frame(
    pos: ColumnPos,
    nearby: &[(ColumnPos, Vec<Placement>)],
    chunk_size: i32,
) -> Vec<IVec3> {
    nearby
        .iter()
        .flat_map(|(npos, placements)| {
            let shift = frame_shift(*npos, pos, chunk_size);
            placements.iter().map(move |p| p.anchor + shift)
        })
        .collect()
}

/// Deterministic hash of a world cell, used for rare-structure rolls.
pub fn cell_hash(seed: u32, x: i32, z: i32) -> u32 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x27d4_eb2d)
        ^ (z as u32).wrapping_mul(0x1656_67b1).rotate_left(13);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

struct Candidate {
    anchor: IVec3,
    score: f64,
    structure: StructureType,
}

/// Choose anchors for a freshly generated column.
///
/// `existing` holds anchors from neighboring columns in this column's frame.
pub fn select_placements(
    generated: &GeneratedColumn,
    biomes: &BiomeRegistry,
    existing: &[IVec3],
    rules: &PlacementRules,
) -> Vec<Placement> {
    let size = generated.blocks.dims().chunk_size;
    let origin = generated.pos.world_origin(size);

    let mut candidates = Vec::new();
    let mut density_total = 0.0;
    for z in 0..size {
        for x in 0..size {
            let Some(biome) = biomes.get(generated.biome_at(x, z)) else {
                continue;
            };
            let density = generated.vegetation_at(x, z);
            density_total += density * biome.vegetation_density as f64;

            let height = generated.height_at(x, z);
            if height <= rules.water_level {
                continue;
            }
            let anchor = IVec3::new(x, height, z);
            if existing.iter().any(|a| chebyshev(*a, anchor) < rules.spacing) {
                continue;
            }
            let rare = cell_hash(rules.seed, origin.x + x, origin.z + z) % rules.rare_chance == 0;
            if let Some(structure) = biome.structure_for(density, rare) {
                candidates.push(Candidate {
                    anchor,
                    score: density,
                    structure,
                });
            }
        }
    }

    let budget = (density_total / (size * size) as f64).round() as usize;
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.anchor.z.cmp(&b.anchor.z))
            .then(a.anchor.x.cmp(&b.anchor.x))
    });

    let mut placements: Vec<Placement> = Vec::new();
    for candidate in candidates {
        if placements.len() >= budget {
            break;
        }
        if placements
            .iter()
            .any(|p| chebyshev(p.anchor, candidate.anchor) < rules.spacing)
        {
            continue;
        }
        let (x, z) = (candidate.anchor.x as usize, candidate.anchor.z as usize);
        let rotation = super::noise_map::to_int_scale(generated.rotation.get(x, z), 0, 3) as u8;
        placements.push(Placement {
            anchor: candidate.anchor,
            structure: candidate.structure,
            rotation,
        });
    }
    placements
}

/// Write placements into `blocks`, routing out-of-column blocks to neighbors.
pub fn write_placements(
    pos: ColumnPos,
    blocks: &mut ColumnBlocks,
    placements: &[Placement],
    structures: &StructureRegistry,
    neighbors: &dyn NeighborAccess,
) -> Spill {
    let dims = blocks.dims();
    let size = dims.chunk_size;
    let mut resident: HashMap<ColumnPos, Option<Arc<Column>>> = HashMap::new();
    let mut rebake = HashSet::new();
    let mut ghosts = Vec::new();

    for placement in placements {
        let Some(template) = structures.get(placement.structure) else {
            continue;
        };
        for (local, block) in template.placed_blocks(placement.anchor, placement.rotation) {
            if local.y < 0 || local.y >= dims.height() {
                continue;
            }
            if dims.contains(local) {
                blocks.merge(local, block);
                continue;
            }

            let target = pos.offset(local.x.div_euclid(size), local.z.div_euclid(size));
            let target_local = IVec3::new(local.x.rem_euclid(size), local.y, local.z.rem_euclid(size));
            let column = resident
                .entry(target)
                .or_insert_with(|| neighbors.resident_column(target));
            match column {
                Some(column) => {
                    if let Some(key) = column.place_spill(target_local, block) {
                        rebake.insert(key);
                    }
                }
                None => ghosts.push((target, BlockRecord::new(target_local, block))),
            }
        }
    }

    let mut rebake: Vec<ChunkKey> = rebake.into_iter().collect();
    rebake.sort();
    Spill { ghosts, rebake }
}

/// Re-apply blocks that recorded neighbor placements put into this column.
///
/// Covers spill whose ghost entries were consumed by an earlier generation
/// of this column. Spill overwrites terrain; a cell already in `claimed`
/// (a ghost or earlier spill) keeps its block.
pub fn replay_neighbor_spill(
    pos: ColumnPos,
    blocks: &mut ColumnBlocks,
    nearby: &[(ColumnPos, Vec<Placement>)],
    structures: &StructureRegistry,
    claimed: &mut HashSet<IVec3>,
) {
    let dims = blocks.dims();
    for (npos, placements) in nearby {
        let shift = frame_shift(*npos, pos, dims.chunk_size);
        for placement in placements {
            let Some(template) = structures.get(placement.structure) else {
                continue;
            };
            for (local, block) in template.placed_blocks(placement.anchor, placement.rotation) {
                let local = local + shift;
                if dims.contains(local) && claimed.insert(local) {
                    blocks.set(local, block);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorldConfig;
    use crate::streaming::save::MemorySaveStore;
    use crate::terrain::generator::WorldGenerator;
    use crate::voxel::column::ColumnDims;
    use parking_lot::Mutex;

    fn generator() -> WorldGenerator {
        WorldGenerator::new(
            &WorldConfig::default(),
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::default()),
        )
        .unwrap()
    }

    fn edge_tree() -> Placement {
        // Canopy reaches two cells past the +X edge of a 16-wide column
        Placement {
            anchor: IVec3::new(15, 220, 8),
            structure: StructureType::OakTree,
            rotation: 0,
        }
    }

    #[test]
    fn test_spill_to_absent_neighbor_becomes_ghosts() {
        let pos = ColumnPos::new(0, 0);
        let mut blocks = ColumnBlocks::new(ColumnDims::default());
        let spill = write_placements(
            pos,
            &mut blocks,
            &[edge_tree()],
            &StructureRegistry::default(),
            &NoNeighbors,
        );

        assert!(spill.rebake.is_empty());
        assert!(!spill.ghosts.is_empty());
        assert!(spill.ghosts.iter().all(|(target, _)| *target == ColumnPos::new(1, 0)));
        assert!(spill
            .ghosts
            .iter()
            .all(|(_, r)| r.position.x < 2 && r.block == BlockType::OakLeaves));
        assert_eq!(blocks.get(IVec3::new(15, 221, 8)), Some(BlockType::OakLog));
    }

    #[test]
    fn test_spill_to_resident_neighbor_merges_and_rebakes() {
        let pos = ColumnPos::new(0, 0);
        let neighbor_pos = ColumnPos::new(1, 0);
        let neighbor = Arc::new(Column::from_blocks(
            neighbor_pos,
            ColumnBlocks::new(ColumnDims::default()),
            HashMap::new(),
        ));
        let resident: HashMap<ColumnPos, Arc<Column>> =
            [(neighbor_pos, neighbor.clone())].into_iter().collect();

        let mut blocks = ColumnBlocks::new(ColumnDims::default());
        let spill = write_placements(
            pos,
            &mut blocks,
            &[edge_tree()],
            &StructureRegistry::default(),
            &resident,
        );

        assert!(spill.ghosts.is_empty());
        // Spilled leaves sit at y 224..=227, all inside chunk 14
        assert_eq!(spill.rebake, vec![ChunkKey::new(neighbor_pos, 14)]);
        assert_eq!(neighbor.block_at(IVec3::new(0, 224, 8)), Some(BlockType::OakLeaves));
    }

    #[test]
    fn test_ghost_round_trip() {
        let generator = generator();
        let save = MemorySaveStore::new();
        let ledger = Mutex::new(StructureLedger::new());
        let source = ColumnPos::new(0, 0);
        let target = ColumnPos::new(1, 0);

        // Sink the tree so its spilled canopy overlaps the neighbor's terrain
        let surface = generator.generate(target).unwrap().height_at(0, 8);
        let buried = Placement {
            anchor: IVec3::new(15, surface - 4, 8),
            ..edge_tree()
        };
        let mut scratch = ColumnBlocks::new(ColumnDims::default());
        let spill = write_placements(
            source,
            &mut scratch,
            &[buried],
            generator.structures(),
            &NoNeighbors,
        );
        for (pos, record) in &spill.ghosts {
            ledger.lock().push_ghost(*pos, *record);
        }
        let pending = ledger.lock().ghosts_for(target).cloned().unwrap();
        assert!(!pending.is_empty());

        let build = Column::generate(target, &generator, &save, &ledger, &NoNeighbors).unwrap();
        for (position, block) in &pending {
            assert_eq!(build.column.block_at(*position), Some(*block), "ghost at {position}");
        }
        assert!(ledger.lock().ghosts_for(target).is_none());
    }

    #[test]
    fn test_spacing_invariant_across_neighborhood() {
        let generator = generator();
        let save = MemorySaveStore::new();
        let ledger = Mutex::new(StructureLedger::new());
        let spacing = WorldConfig::default().spacing_between_structures;

        for z in -1..=1 {
            for x in -1..=1 {
                Column::generate(ColumnPos::new(x, z), &generator, &save, &ledger, &NoNeighbors)
                    .unwrap();
            }
        }

        let ledger = ledger.lock();
        let mut anchors = Vec::new();
        for z in -1..=1 {
            for x in -1..=1 {
                let pos = ColumnPos::new(x, z);
                for p in ledger.placements(pos).unwrap() {
                    anchors.push(p.anchor + pos.world_origin(16));
                }
            }
        }
        for (i, a) in anchors.iter().enumerate() {
            for b in &anchors[i + 1..] {
                assert!(chebyshev(*a, *b) >= spacing, "{a} and {b} too close");
            }
        }
    }

    #[test]
    fn test_selection_respects_existing_anchors() {
        let generator = generator();
        let generated = generator.generate(ColumnPos::new(3, -2)).unwrap();
        let free = generator.select_placements(&generated, &[]);
        let blocked: Vec<IVec3> = free.iter().map(|p| p.anchor).collect();

        let again = generator.select_placements(&generated, &blocked);
        for p in &again {
            assert!(blocked.iter().all(|a| chebyshev(*a, p.anchor) >= 4));
        }
    }

    #[test]
    fn test_all_rotations_occur() {
        let generator = generator();
        let mut seen = [0usize; 4];
        for z in 0..12 {
            for x in 0..12 {
                let generated = generator.generate(ColumnPos::new(x, z)).unwrap();
                for p in generator.select_placements(&generated, &[]) {
                    seen[p.rotation as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&n| n > 0), "rotation counts {seen:?}");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let generator = generator();
        let generated = generator.generate(ColumnPos::new(7, 7)).unwrap();
        assert_eq!(
            generator.select_placements(&generated, &[]),
            generator.select_placements(&generated, &[])
        );
    }

    #[test]
    fn test_replay_restores_neighbor_spill() {
        let pos = ColumnPos::new(1, 0);
        let nearby = vec![(ColumnPos::new(0, 0), vec![edge_tree()])];
        let mut blocks = ColumnBlocks::new(ColumnDims::default());
        // Terrain under part of the canopy, and one cell already claimed by a ghost
        blocks.set(IVec3::new(0, 225, 8), BlockType::Stone);
        blocks.set(IVec3::new(1, 224, 8), BlockType::Cobblestone);
        let mut claimed: HashSet<IVec3> = [IVec3::new(1, 224, 8)].into_iter().collect();

        replay_neighbor_spill(pos, &mut blocks, &nearby, &StructureRegistry::default(), &mut claimed);
        assert_eq!(blocks.get(IVec3::new(0, 224, 8)), Some(BlockType::OakLeaves));
        assert_eq!(blocks.get(IVec3::new(0, 225, 8)), Some(BlockType::OakLeaves));
        assert_eq!(blocks.get(IVec3::new(1, 224, 8)), Some(BlockType::Cobblestone));
        assert_eq!(blocks.get(IVec3::new(2, 224, 8)), Some(BlockType::Air));
        assert!(claimed.contains(&IVec3::new(0, 224, 8)));
    }

    #[test]
    fn test_prune_keeps_entries_near_residents() {
        let mut ledger = StructureLedger::new();
        let near = ColumnPos::new(1, 1);
        let far = ColumnPos::new(10, 10);
        ledger.record(near, vec![edge_tree()]);
        ledger.record(far, Vec::new());
        ledger.push_ghost(far.offset(1, 0), BlockRecord::new(IVec3::ZERO, BlockType::OakLeaves));

        let stats = ledger.prune(|p| p == ColumnPos::new(0, 0));
        assert_eq!(stats, PruneStats { placements: 1, ghosts: 1 });
        assert!(ledger.placements(near).is_some());
        assert!(ledger.placements(far).is_none());
        assert_eq!(ledger.ghost_count(), 0);
    }

    #[test]
    fn test_first_ghost_wins() {
        let mut ledger = StructureLedger::new();
        let pos = ColumnPos::new(0, 0);
        ledger.push_ghost(pos, BlockRecord::new(IVec3::ONE, BlockType::OakLog));
        ledger.push_ghost(pos, BlockRecord::new(IVec3::ONE, BlockType::OakLeaves));
        assert_eq!(
            ledger.take_ghosts(pos),
            vec![BlockRecord::new(IVec3::ONE, BlockType::OakLog)]
        );
        assert!(!ledger.has_ghosts(pos));
    }

    #[test]
    fn test_cell_hash_varies() {
        let a = cell_hash(1, 0, 0);
        assert_eq!(a, cell_hash(1, 0, 0));
        assert_ne!(a, cell_hash(1, 1, 0));
        assert_ne!(a, cell_hash(2, 0, 0));
        assert_ne!(cell_hash(1, 1, 0), cell_hash(1, 0, 1));
    }
}
