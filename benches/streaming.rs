use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, black_box};

use rkstream::core::WorldConfig;
use rkstream::streaming::{ChunkManager, MemorySaveStore, Viewpoint};
use rkstream::terrain::{BiomeRegistry, StructureLedger, StructureRegistry, WorldGenerator};
use rkstream::terrain::placement::NoNeighbors;
use rkstream::voxel::{BakeNeighbors, Column, ColumnPos};

use glam::Vec3;
use parking_lot::Mutex;

fn generator(config: &WorldConfig) -> WorldGenerator {
    WorldGenerator::new(
        config,
        Arc::new(BiomeRegistry::default()),
        Arc::new(StructureRegistry::default()),
    )
    .unwrap()
}

fn bench_generate_terrain(c: &mut Criterion) {
    let generator = generator(&WorldConfig::default());

    c.bench_function("generate_terrain_column", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            generator.generate(black_box(ColumnPos::new(x, 0))).unwrap()
        });
    });
}

fn bench_generate_column(c: &mut Criterion) {
    let generator = generator(&WorldConfig::default());
    let save = MemorySaveStore::new();

    c.bench_function("generate_column_with_structures", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            let ledger = Mutex::new(StructureLedger::new());
            Column::generate(black_box(ColumnPos::new(x, 0)), &generator, &save, &ledger, &NoNeighbors)
                .unwrap()
        });
    });
}

fn bench_bake_surface_chunk(c: &mut Criterion) {
    let generator = generator(&WorldConfig::default());
    let ledger = Mutex::new(StructureLedger::new());
    let build = Column::generate(
        ColumnPos::new(0, 0),
        &generator,
        &MemorySaveStore::new(),
        &ledger,
        &NoNeighbors,
    )
    .unwrap();
    let column = build.column;
    // Chunk holding the water line, where most faces are exposed
    let index = generator.config().water_level / generator.dims().chunk_size;
    let neighbors = BakeNeighbors {
        below: column.chunk(index - 1).cloned(),
        above: column.chunk(index + 1).cloned(),
        ..Default::default()
    };
    let chunk = column.chunk(index).cloned().unwrap();

    c.bench_function("bake_surface_chunk", |b| {
        b.iter(|| chunk.bake(black_box(&neighbors)));
    });
}

fn bench_tick_steady_state(c: &mut Criterion) {
    let config = WorldConfig {
        render_distance: 4,
        ..Default::default()
    };
    let manager = ChunkManager::new(
        generator(&config),
        Arc::new(MemorySaveStore::new()),
        Arc::new(Viewpoint::new(Vec3::new(8.0, 120.0, 8.0), 4)),
    );
    // Drain all queues so only the per-tick requery remains
    for _ in 0..20_000 {
        manager.tick();
    }

    c.bench_function("tick_steady_state_r4", |b| {
        b.iter(|| manager.tick());
    });
}

criterion_group!(
    benches,
    bench_generate_terrain,
    bench_generate_column,
    bench_bake_surface_chunk,
    bench_tick_steady_state,
);
criterion_main!(benches);
