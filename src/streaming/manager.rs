//! ChunkManager - the streaming scheduler.
//!
//! Every tick the manager applies queued edits, rebuilds the generate queue
//! around the current viewpoint, marks far columns for unloading and then
//! performs exactly one unit of work for the active phase (generate one
//! column, bake one chunk or unload one chunk). Locks are held only around
//! queue and map mutations, never across generation or meshing.
//!
//! A column enters the resident map only in the Generate phase and leaves it
//! only in the Unload phase.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::IVec3;
use parking_lot::{Mutex, RwLock};

use super::priority::GenerateQueue;
use super::queue::ChunkQueue;
use super::save::SaveCollaborator;
use super::scheduler::{Phase, PhaseScheduler};
use super::viewpoint::{Viewpoint, ViewpointProvider};
use crate::core::config::WorldConfig;
use crate::core::types::Result;
use crate::terrain::generator::WorldGenerator;
use crate::terrain::placement::{NeighborAccess, PruneStats, StructureLedger};
use crate::voxel::block::BlockType;
use crate::voxel::chunk::{BakeNeighbors, ChunkKey};
use crate::voxel::column::{Column, ColumnPos};
use crate::voxel::mesh::ChunkMesh;

/// Counters for monitoring streaming progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub ticks: u64,
    pub columns_generated: u64,
    pub generation_failures: u64,
    pub chunks_baked: u64,
    pub stale_bakes_skipped: u64,
    pub chunks_unloaded: u64,
    pub columns_evicted: u64,
    pub unloads_cancelled: u64,
    pub edits_applied: u64,
    pub edits_dropped: u64,
    pub columns_saved: u64,
    pub reclaim_sweeps: u64,
}

/// What the active phase did during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseWork {
    /// The phase's queue was empty
    Idle,
    Generated(ColumnPos),
    GenerationFailed(ColumnPos),
    Baked { key: ChunkKey, faces: usize },
    /// Dequeued chunk was unloaded, pending unload or gone
    SkippedStale(ChunkKey),
    Unloaded(ChunkKey),
    /// Last chunk unloaded; column left the resident map
    Evicted(ColumnPos),
}

/// Result of one scheduler tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickOutcome {
    pub phase: Phase,
    pub work: PhaseWork,
    pub edits_applied: usize,
}

/// A baked chunk ready for drawing.
#[derive(Clone, Debug)]
pub struct DrawableChunk {
    pub key: ChunkKey,
    /// World position of the chunk's minimum corner
    pub origin: IVec3,
    pub mesh: Arc<ChunkMesh>,
}

#[derive(Clone, Copy, Debug)]
struct BlockEdit {
    world: IVec3,
    block: BlockType,
}

/// Background scheduler that keeps the world generated around a viewpoint.
pub struct ChunkManager {
    config: WorldConfig,
    generator: WorldGenerator,
    save: Arc<dyn SaveCollaborator>,
    viewpoint: Arc<dyn ViewpointProvider>,
    resident: RwLock<HashMap<ColumnPos, Arc<Column>>>,
    generate_queue: Mutex<GenerateQueue>,
    bake_queue: Mutex<ChunkQueue>,
    unload_queue: Mutex<ChunkQueue>,
    ledger: Mutex<StructureLedger>,
    pending_edits: Mutex<Vec<BlockEdit>>,
    /// Positions whose generation failed; not re-queued while in range
    failed: Mutex<HashSet<ColumnPos>>,
    scheduler: Mutex<PhaseScheduler>,
    stats: Mutex<StreamingStats>,
}

impl ChunkManager {
    pub fn new(
        generator: WorldGenerator,
        save: Arc<dyn SaveCollaborator>,
        viewpoint: Arc<dyn ViewpointProvider>,
    ) -> Self {
        Self {
            config: generator.config().clone(),
            generator,
            save,
            viewpoint,
            resident: RwLock::new(HashMap::new()),
            generate_queue: Mutex::new(GenerateQueue::new()),
            bake_queue: Mutex::new(ChunkQueue::new()),
            unload_queue: Mutex::new(ChunkQueue::new()),
            ledger: Mutex::new(StructureLedger::new()),
            pending_edits: Mutex::new(Vec::new()),
            failed: Mutex::new(HashSet::new()),
            scheduler: Mutex::new(PhaseScheduler::new()),
            stats: Mutex::new(StreamingStats::default()),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Run one scheduler tick.
    pub fn tick(&self) -> TickOutcome {
        let edits_applied = self.apply_pending_edits();
        let viewpoint = self.viewpoint.viewpoint();
        self.requery(&viewpoint);

        let phase = self.scheduler.lock().advance();
        let work = match phase {
            Phase::Generate => self.run_generate(),
            Phase::Bake => self.run_bake(),
            Phase::Unload => self.run_unload(),
        };
        self.stats.lock().ticks += 1;
        log::trace!("Tick {:?}: {:?}", phase, work);

        TickOutcome {
            phase,
            work,
            edits_applied,
        }
    }

    /// Queue a block edit at a world position; applied at the start of the next tick.
    pub fn change_block(&self, world: IVec3, block: BlockType) {
        self.pending_edits.lock().push(BlockEdit { world, block });
    }

    fn apply_pending_edits(&self) -> usize {
        let edits = std::mem::take(&mut *self.pending_edits.lock());
        if edits.is_empty() {
            return 0;
        }

        let size = self.config.dims.chunk_size;
        let mut applied = 0;
        let mut dropped = 0;
        let mut rebake = Vec::new();
        for edit in edits {
            let pos = ColumnPos::from_world(edit.world, size);
            let Some(column) = self.resident_column(pos) else {
                log::warn!("Dropping edit at {} in non-resident column {:?}", edit.world, pos);
                dropped += 1;
                continue;
            };
            match column.change_block(edit.world - pos.world_origin(size), edit.block) {
                Ok(keys) => {
                    rebake.extend(keys);
                    applied += 1;
                }
                Err(e) => {
                    log::warn!("Dropping edit at {}: {}", edit.world, e);
                    dropped += 1;
                }
            }
        }
        self.queue_bakes(rebake);

        let mut stats = self.stats.lock();
        stats.edits_applied += applied as u64;
        stats.edits_dropped += dropped;
        applied
    }

    /// Rebuild the generate queue and sort resident columns into keep/unload.
    fn requery(&self, viewpoint: &Viewpoint) {
        let radius = viewpoint.render_distance.max(1);
        let size = self.config.dims.chunk_size;
        let unload_distance = self.config.unload_distance(radius);

        let resident: HashMap<ColumnPos, Arc<Column>> = self.resident.read().clone();
        let failed = {
            let mut failed = self.failed.lock();
            // Forget failures once out of range so they are retried on return
            failed.retain(|p| p.distance_to(viewpoint.position, size) <= unload_distance);
            failed.clone()
        };

        self.generate_queue
            .lock()
            .update(viewpoint.position, radius, size, |p| {
                resident.contains_key(&p) || failed.contains(&p)
            });

        let mut to_unload = Vec::new();
        let mut back_in_range = Vec::new();
        for (pos, column) in &resident {
            let distance = pos.distance_to(viewpoint.position, size);
            if distance > unload_distance {
                to_unload.push(column.clone());
            } else if distance <= radius as f32 && !column.any_unloaded() {
                back_in_range.push(column.clone());
            }
        }

        if !to_unload.is_empty() {
            let mut queued = Vec::new();
            {
                let mut unload_queue = self.unload_queue.lock();
                for column in &to_unload {
                    if unload_queue.contains_column(column.pos()) {
                        continue;
                    }
                    for chunk in column.chunks().iter().filter(|c| !c.is_unloaded()) {
                        unload_queue.push(chunk.key());
                    }
                    queued.push(column.pos());
                }
            }
            let mut bake_queue = self.bake_queue.lock();
            for pos in queued {
                bake_queue.remove_column(pos);
                log::debug!("Column {:?} queued for unload", pos);
            }
        }

        if !back_in_range.is_empty() {
            let mut cancelled = Vec::new();
            {
                let mut unload_queue = self.unload_queue.lock();
                for column in back_in_range {
                    if unload_queue.remove_column(column.pos()) > 0 {
                        cancelled.push(column);
                    }
                }
            }
            if !cancelled.is_empty() {
                self.stats.lock().unloads_cancelled += cancelled.len() as u64;
                let keys = cancelled
                    .iter()
                    .flat_map(|c| c.chunks().iter().filter(|k| !k.is_baked()).map(|k| k.key()))
                    .collect();
                self.queue_bakes(keys);
            }
        }
    }

    /// Queue chunks for baking, skipping non-resident columns and columns
    /// pending unload.
    fn queue_bakes(&self, keys: Vec<ChunkKey>) {
        if keys.is_empty() {
            return;
        }
        let eligible: Vec<ChunkKey> = {
            let resident = self.resident.read();
            keys.into_iter()
                .filter(|k| {
                    resident
                        .get(&k.column)
                        .and_then(|c| c.chunk(k.index))
                        .is_some_and(|c| !c.is_unloaded())
                })
                .collect()
        };
        let eligible: Vec<ChunkKey> = {
            let unload_queue = self.unload_queue.lock();
            eligible
                .into_iter()
                .filter(|k| !unload_queue.contains_column(k.column))
                .collect()
        };
        let mut bake_queue = self.bake_queue.lock();
        for key in eligible {
            bake_queue.push(key);
        }
    }

    fn run_generate(&self) -> PhaseWork {
        let Some(entry) = self.generate_queue.lock().pop() else {
            return PhaseWork::Idle;
        };
        let pos = entry.pos;
        if self.is_resident(pos) {
            return PhaseWork::Idle;
        }

        let build = match Column::generate(pos, &self.generator, self.save.as_ref(), &self.ledger, self) {
            Ok(build) => build,
            Err(e) => {
                log::error!("Failed to generate column {:?}: {}", pos, e);
                self.failed.lock().insert(pos);
                self.stats.lock().generation_failures += 1;
                return PhaseWork::GenerationFailed(pos);
            }
        };

        let column = Arc::new(build.column);
        self.resident.write().insert(pos, column.clone());

        let mut keys: Vec<ChunkKey> = column.chunks().iter().map(|c| c.key()).collect();
        for neighbor in pos.neighbors4() {
            if let Some(neighbor) = self.resident_column(neighbor) {
                keys.extend(neighbor.chunks().iter().map(|c| c.key()));
            }
        }
        keys.extend(build.rebake);
        self.queue_bakes(keys);

        self.stats.lock().columns_generated += 1;
        log::debug!("Generated column {:?} at distance {:.1}", pos, entry.distance);
        PhaseWork::Generated(pos)
    }

    fn run_bake(&self) -> PhaseWork {
        let Some(key) = self.bake_queue.lock().pop() else {
            return PhaseWork::Idle;
        };

        let column = self.resident_column(key.column);
        let chunk = column.as_ref().and_then(|c| c.chunk(key.index).cloned());
        let pending_unload = self.unload_queue.lock().contains_column(key.column);
        let (Some(column), Some(chunk)) = (column, chunk) else {
            self.stats.lock().stale_bakes_skipped += 1;
            return PhaseWork::SkippedStale(key);
        };
        if chunk.is_unloaded() || pending_unload {
            self.stats.lock().stale_bakes_skipped += 1;
            return PhaseWork::SkippedStale(key);
        }

        let neighbors = BakeNeighbors {
            below: column.chunk(key.index - 1).cloned(),
            above: column.chunk(key.index + 1).cloned(),
            horizontal: key.column.neighbors4().map(|p| self.resident_column(p)),
        };
        let faces = chunk.bake(&neighbors);
        self.stats.lock().chunks_baked += 1;
        PhaseWork::Baked { key, faces }
    }

    fn run_unload(&self) -> PhaseWork {
        let Some(key) = self.unload_queue.lock().pop() else {
            return PhaseWork::Idle;
        };
        let Some(column) = self.resident_column(key.column) else {
            return PhaseWork::SkippedStale(key);
        };
        if let Some(chunk) = column.chunk(key.index) {
            chunk.unload();
        }
        self.stats.lock().chunks_unloaded += 1;

        if !column.all_unloaded() {
            return PhaseWork::Unloaded(key);
        }

        let pos = column.pos();
        self.resident.write().remove(&pos);
        self.save_column(&column);
        self.stats.lock().columns_evicted += 1;
        log::debug!("Evicted column {:?}", pos);

        let mut keys = Vec::new();
        for neighbor in pos.neighbors4() {
            if let Some(neighbor) = self.resident_column(neighbor) {
                keys.extend(neighbor.chunks().iter().map(|c| c.key()));
            }
        }
        self.queue_bakes(keys);

        if self.unload_queue.lock().is_empty() {
            self.reclaim();
        }
        PhaseWork::Evicted(pos)
    }

    /// Persist a column's overrides if they changed since the last save.
    fn save_column(&self, column: &Column) -> Option<Result<()>> {
        if !column.is_dirty() {
            return None;
        }
        let overrides = column.overrides();
        if overrides.is_empty() {
            column.mark_saved();
            return None;
        }
        let result = self.save.save(column.pos(), &overrides);
        match &result {
            Ok(()) => {
                column.mark_saved();
                self.stats.lock().columns_saved += 1;
            }
            Err(e) => log::error!("Failed to save overrides for column {:?}: {}", column.pos(), e),
        }
        Some(result)
    }

    /// Save every resident column with unsaved overrides.
    ///
    /// All columns are attempted; the first failure is returned.
    pub fn flush_overrides(&self) -> Result<usize> {
        let columns: Vec<Arc<Column>> = self.resident.read().values().cloned().collect();
        let mut saved = 0;
        let mut first_error = None;
        for column in columns {
            match self.save_column(&column) {
                Some(Ok(())) => saved += 1,
                Some(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                None => {}
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// Drop ledger entries no resident column can need and release spare capacity.
    fn reclaim(&self) -> PruneStats {
        let resident: HashSet<ColumnPos> = self.resident.read().keys().copied().collect();
        let pruned = {
            let mut ledger = self.ledger.lock();
            let pruned = ledger.prune(|p| resident.contains(&p));
            ledger.shrink_to_fit();
            pruned
        };
        self.resident.write().shrink_to_fit();
        self.stats.lock().reclaim_sweeps += 1;
        log::info!(
            "Reclaimed {} anchor entries and {} ghost entries, {} columns resident",
            pruned.placements,
            pruned.ghosts,
            resident.len()
        );
        pruned
    }

    /// Baked chunks of every resident column.
    pub fn drawable_chunks(&self) -> Vec<DrawableChunk> {
        let resident = self.resident.read();
        resident
            .values()
            .flat_map(|column| column.chunks().iter())
            .filter_map(|chunk| {
                chunk.mesh().map(|mesh| DrawableChunk {
                    key: chunk.key(),
                    origin: chunk.world_origin(),
                    mesh,
                })
            })
            .collect()
    }

    /// Block at a world position, if its column is resident.
    pub fn block_at(&self, world: IVec3) -> Option<BlockType> {
        let size = self.config.dims.chunk_size;
        let pos = ColumnPos::from_world(world, size);
        self.resident_column(pos)?
            .block_at(world - pos.world_origin(size))
    }

    pub fn is_resident(&self, pos: ColumnPos) -> bool {
        self.resident.read().contains_key(&pos)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.read().len()
    }

    /// Resident column positions in sorted order.
    pub fn resident_positions(&self) -> Vec<ColumnPos> {
        let mut positions: Vec<ColumnPos> = self.resident.read().keys().copied().collect();
        positions.sort();
        positions
    }

    pub fn generate_queue_len(&self) -> usize {
        self.generate_queue.lock().len()
    }

    pub fn bake_queue_len(&self) -> usize {
        self.bake_queue.lock().len()
    }

    pub fn unload_queue_len(&self) -> usize {
        self.unload_queue.lock().len()
    }

    pub fn stats(&self) -> StreamingStats {
        self.stats.lock().clone()
    }
}

impl NeighborAccess for ChunkManager {
    fn resident_column(&self, pos: ColumnPos) -> Option<Arc<Column>> {
        self.resident.read().get(&pos).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::logging;
    use crate::streaming::save::MemorySaveStore;
    use crate::streaming::viewpoint::SharedViewpoint;
    use crate::terrain::biome::BiomeRegistry;
    use crate::terrain::structure::StructureRegistry;
    use crate::voxel::block::BlockRecord;
    use glam::Vec3;

    fn test_config() -> WorldConfig {
        WorldConfig {
            seed: 0,
            render_distance: 1,
            ..Default::default()
        }
    }

    fn manager_with(
        config: &WorldConfig,
        save: Arc<dyn SaveCollaborator>,
        viewpoint: Arc<SharedViewpoint>,
    ) -> ChunkManager {
        logging::init_for_tests();
        let generator = WorldGenerator::new(
            config,
            Arc::new(BiomeRegistry::default()),
            Arc::new(StructureRegistry::default()),
        )
        .unwrap();
        ChunkManager::new(generator, save, viewpoint)
    }

    fn center_of(pos: ColumnPos) -> Vec3 {
        Vec3::new(pos.x as f32 * 16.0 + 8.0, 120.0, pos.z as f32 * 16.0 + 8.0)
    }

    fn setup(radius: i32) -> (ChunkManager, Arc<SharedViewpoint>, Arc<MemorySaveStore>) {
        let config = WorldConfig {
            render_distance: radius,
            ..test_config()
        };
        let viewpoint = Arc::new(SharedViewpoint::new(Viewpoint::new(
            center_of(ColumnPos::new(0, 0)),
            radius,
        )));
        let save = Arc::new(MemorySaveStore::new());
        let manager = manager_with(&config, save.clone(), viewpoint.clone());
        (manager, viewpoint, save)
    }

    /// Tick until all queues drain or the limit is hit.
    fn run_until_idle(manager: &ChunkManager, limit: usize) {
        for _ in 0..limit {
            manager.tick();
            if manager.generate_queue_len() == 0
                && manager.bake_queue_len() == 0
                && manager.unload_queue_len() == 0
            {
                return;
            }
        }
    }

    /// Column positions and chunk keys never sit in incompatible sets.
    fn assert_exclusive_membership(manager: &ChunkManager) {
        let resident: HashSet<ColumnPos> = manager.resident.read().keys().copied().collect();
        let generate = manager.generate_queue.lock();
        for pos in &resident {
            assert!(!generate.contains(*pos), "{pos:?} resident and queued for generation");
        }
        drop(generate);
        let bake = manager.bake_queue.lock();
        let unload = manager.unload_queue.lock();
        for pos in &resident {
            if unload.contains_column(*pos) {
                assert!(!bake.contains_column(*pos), "{pos:?} queued for bake and unload");
            }
        }
    }

    #[test]
    fn test_tick_cycles_phases() {
        let (manager, _, _) = setup(1);
        let phases: Vec<Phase> = (0..3).map(|_| manager.tick().phase).collect();
        assert_eq!(phases, vec![Phase::Generate, Phase::Bake, Phase::Unload]);
        assert_eq!(manager.stats().ticks, 3);
    }

    #[test]
    fn test_streams_in_render_radius() {
        let (manager, _, _) = setup(1);
        run_until_idle(&manager, 2000);

        // Radius 1 around (0, 0): the center and its four edge neighbors
        assert_eq!(
            manager.resident_positions(),
            vec![
                ColumnPos::new(-1, 0),
                ColumnPos::new(0, -1),
                ColumnPos::new(0, 0),
                ColumnPos::new(0, 1),
                ColumnPos::new(1, 0),
            ]
        );
        assert!(manager.drawable_chunks().iter().any(|c| !c.mesh.is_empty()));
        let stats = manager.stats();
        assert_eq!(stats.columns_generated, 5);
        assert_eq!(stats.generation_failures, 0);
    }

    #[test]
    fn test_nearest_generated_first() {
        let (manager, _, _) = setup(2);
        let outcome = manager.tick();
        assert_eq!(outcome.work, PhaseWork::Generated(ColumnPos::new(0, 0)));
    }

    #[test]
    fn test_duplicate_enqueue_yields_one_resident() {
        let (manager, _, _) = setup(1);
        let pos = ColumnPos::new(0, 0);
        {
            let mut queue = manager.generate_queue.lock();
            queue.push(pos, 0.0);
            queue.push(pos, 0.0);
        }
        assert_eq!(manager.run_generate(), PhaseWork::Generated(pos));
        assert_eq!(manager.run_generate(), PhaseWork::Idle);

        // A stale entry for a resident column is ignored too
        manager.generate_queue.lock().push(pos, 0.0);
        assert_eq!(manager.run_generate(), PhaseWork::Idle);
        assert_eq!(manager.resident_count(), 1);
    }

    #[test]
    fn test_membership_stays_exclusive_while_roaming() {
        let (manager, viewpoint, _) = setup(2);
        for step in 0..600 {
            if step % 100 == 0 {
                let x = (step / 100) as f32 * 24.0;
                viewpoint.set_position(Vec3::new(x, 120.0, 8.0));
            }
            manager.tick();
            assert_exclusive_membership(&manager);
        }
    }

    #[test]
    fn test_far_columns_are_evicted_and_reclaimed() {
        let (manager, viewpoint, _) = setup(1);
        run_until_idle(&manager, 2000);
        assert_eq!(manager.resident_count(), 5);

        viewpoint.set_position(center_of(ColumnPos::new(20, 0)));
        run_until_idle(&manager, 5000);

        assert!(!manager.is_resident(ColumnPos::new(0, 0)));
        assert!(manager.is_resident(ColumnPos::new(20, 0)));
        let stats = manager.stats();
        assert_eq!(stats.columns_evicted, 5);
        assert!(stats.reclaim_sweeps >= 1);
        // Nothing near the old origin is resident, so its ledger entries are gone
        assert!(manager.ledger.lock().placements(ColumnPos::new(0, 0)).is_none());
    }

    #[test]
    fn test_bake_skips_chunk_pending_unload() {
        let (manager, viewpoint, _) = setup(1);
        let pos = ColumnPos::new(0, 0);
        manager.tick();
        assert!(manager.is_resident(pos));
        assert!(manager.bake_queue_len() > 0);

        // Move away so the column is queued for unload; its bakes are cancelled
        viewpoint.set_position(center_of(ColumnPos::new(10, 0)));
        manager.requery(&viewpoint.viewpoint());
        assert!(manager.unload_queue.lock().contains_column(pos));
        assert!(!manager.bake_queue.lock().contains_column(pos));

        // A bake request slipped in directly is still skipped at dequeue time
        manager.bake_queue.lock().push(ChunkKey::new(pos, 0));
        assert_eq!(manager.run_bake(), PhaseWork::SkippedStale(ChunkKey::new(pos, 0)));
    }

    #[test]
    fn test_unload_cancelled_when_column_returns() {
        let (manager, viewpoint, _) = setup(1);
        let pos = ColumnPos::new(0, 0);
        manager.tick();

        viewpoint.set_position(center_of(ColumnPos::new(10, 0)));
        manager.requery(&viewpoint.viewpoint());
        assert!(manager.unload_queue.lock().contains_column(pos));

        viewpoint.set_position(center_of(pos));
        manager.requery(&viewpoint.viewpoint());
        assert!(!manager.unload_queue.lock().contains_column(pos));
        assert!(manager.bake_queue.lock().contains_column(pos));
        assert_eq!(manager.stats().unloads_cancelled, 1);
    }

    #[test]
    fn test_edit_applies_and_rebakes() {
        let (manager, _, _) = setup(1);
        run_until_idle(&manager, 2000);

        let target = IVec3::new(5, 250, 5);
        assert_eq!(manager.block_at(target), Some(BlockType::Air));
        manager.change_block(target, BlockType::Cobblestone);
        let outcome = manager.tick();

        assert_eq!(outcome.edits_applied, 1);
        assert_eq!(manager.block_at(target), Some(BlockType::Cobblestone));
        // The touched chunk is either still queued or was rebaked this tick
        let key = ChunkKey::new(ColumnPos::new(0, 0), 15);
        let rebaked = matches!(outcome.work, PhaseWork::Baked { key: k, .. } if k == key);
        assert!(rebaked || manager.bake_queue.lock().contains(key));
    }

    #[test]
    fn test_edit_in_unloaded_column_dropped() {
        let (manager, _, _) = setup(1);
        manager.change_block(IVec3::new(1000, 100, 1000), BlockType::Stone);
        let outcome = manager.tick();
        assert_eq!(outcome.edits_applied, 0);
        assert_eq!(manager.stats().edits_dropped, 1);
    }

    #[test]
    fn test_edits_saved_on_eviction_and_restored() {
        let (manager, viewpoint, save) = setup(1);
        run_until_idle(&manager, 2000);

        let target = IVec3::new(3, 240, 3);
        manager.change_block(target, BlockType::Cobblestone);
        manager.tick();

        viewpoint.set_position(center_of(ColumnPos::new(20, 0)));
        run_until_idle(&manager, 5000);
        assert_eq!(
            save.load(ColumnPos::new(0, 0)).unwrap(),
            Some(vec![BlockRecord::new(target, BlockType::Cobblestone)])
        );

        viewpoint.set_position(center_of(ColumnPos::new(0, 0)));
        run_until_idle(&manager, 5000);
        assert_eq!(manager.block_at(target), Some(BlockType::Cobblestone));
    }

    #[test]
    fn test_flush_overrides_saves_dirty_columns() {
        let (manager, _, save) = setup(1);
        run_until_idle(&manager, 2000);
        assert_eq!(manager.flush_overrides().unwrap(), 0);

        manager.change_block(IVec3::new(-4, 230, 2), BlockType::Stone);
        manager.tick();
        assert_eq!(manager.flush_overrides().unwrap(), 1);
        assert!(save.load(ColumnPos::new(-1, 0)).unwrap().is_some());
        assert_eq!(manager.flush_overrides().unwrap(), 0);
    }

    #[test]
    fn test_generation_failure_not_requeued() {
        let config = WorldConfig {
            render_distance: 1,
            ..test_config()
        };
        let mut broken = config.clone();
        broken.generation.height.control_points = vec![(0.001, 2.0), (0.999, 2.0)];
        let viewpoint = Arc::new(SharedViewpoint::new(Viewpoint::new(
            center_of(ColumnPos::new(0, 0)),
            1,
        )));
        let manager = manager_with(&broken, Arc::new(MemorySaveStore::new()), viewpoint);

        let outcome = manager.tick();
        assert_eq!(outcome.work, PhaseWork::GenerationFailed(ColumnPos::new(0, 0)));
        assert_eq!(manager.resident_count(), 0);

        manager.tick();
        manager.tick();
        // The failed position stays out of the queue on later requeries
        assert!(!manager.generate_queue.lock().contains(ColumnPos::new(0, 0)));
    }

    #[test]
    fn test_neighbor_arrival_rebakes_boundary() {
        let (manager, _, _) = setup(1);
        let center = ColumnPos::new(0, 0);
        manager.run_generate_for_test(center);
        let chunk = manager.resident_column(center).unwrap().chunk(4).cloned().unwrap();
        manager.bake_chunk_for_test(chunk.key());
        let alone = chunk.mesh().unwrap().face_count();

        manager.run_generate_for_test(ColumnPos::new(1, 0));
        assert!(manager.bake_queue.lock().contains(chunk.key()));
        manager.bake_chunk_for_test(chunk.key());
        let with_neighbor = chunk.mesh().unwrap().face_count();

        // Solid stone at the shared +X wall is now occluded
        assert!(with_neighbor < alone);
    }

    impl ChunkManager {
        fn run_generate_for_test(&self, pos: ColumnPos) {
            self.generate_queue.lock().clear();
            self.generate_queue.lock().push(pos, 0.0);
            assert_eq!(self.run_generate(), PhaseWork::Generated(pos));
        }

        fn bake_chunk_for_test(&self, key: ChunkKey) {
            self.bake_queue.lock().remove(key);
            let mut queue = std::mem::take(&mut *self.bake_queue.lock());
            self.bake_queue.lock().push(key);
            assert!(matches!(self.run_bake(), PhaseWork::Baked { .. }));
            std::mem::swap(&mut *self.bake_queue.lock(), &mut queue);
        }
    }
}
