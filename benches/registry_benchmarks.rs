use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gpu_registry::{
    BufferDescriptor, BufferUsage, DriverDevice, NullDriver, QueueKind, RegistryDescriptor,
    RegistryLimits, ResourceRegistry,
};

fn bench_registry() -> ResourceRegistry {
    ResourceRegistry::new(
        Arc::new(NullDriver::new()),
        Arc::new(gpu_registry::NoopBindingTable),
        &RegistryDescriptor::new().with_limits(RegistryLimits {
            max_buffers: 1 << 16,
            max_textures: 1 << 12,
            max_texture_views: 1 << 12,
            max_samplers: 1 << 10,
            max_acceleration_structures: 1 << 10,
        }),
    )
}

// ---------------------------------------------------------------------------
// Hot-path operations
// ---------------------------------------------------------------------------

fn bench_create_destroy_collect(c: &mut Criterion) {
    let registry = bench_registry();
    let desc = BufferDescriptor::new(256, BufferUsage::STORAGE);

    c.bench_function("buffer_create_destroy_collect", |b| {
        b.iter(|| {
            let handle = registry.create_buffer(&desc).unwrap();
            registry.destroy_buffer(black_box(handle)).unwrap();
            registry.collect_garbage().unwrap();
        });
    });
}

fn bench_validation(c: &mut Criterion) {
    let registry = bench_registry();
    let desc = BufferDescriptor::new(256, BufferUsage::STORAGE);
    let live = registry.create_buffer(&desc).unwrap();
    let stale = registry.create_buffer(&desc).unwrap();
    registry.destroy_buffer(stale).unwrap();

    c.bench_function("is_valid_live_handle", |b| {
        b.iter(|| black_box(registry.is_buffer_valid(black_box(live))));
    });
    c.bench_function("is_valid_stale_handle", |b| {
        b.iter(|| black_box(registry.is_buffer_valid(black_box(stale))));
    });

    registry.collect_garbage().unwrap();
    registry.destroy_buffer(live).unwrap();
    registry.collect_garbage().unwrap();
}

fn bench_record_submission(c: &mut Criterion) {
    let registry = bench_registry();
    let desc = BufferDescriptor::new(256, BufferUsage::STORAGE);
    let handles: Vec<_> = (0..16)
        .map(|_| registry.create_buffer(&desc).unwrap())
        .collect();
    let references: Vec<gpu_registry::AnyHandle> =
        handles.iter().map(|h| (*h).into()).collect();

    c.bench_function("record_submission_16_refs", |b| {
        b.iter(|| {
            black_box(
                registry
                    .record_submission(QueueKind::Graphics, &references)
                    .unwrap(),
            )
        });
    });

    for handle in handles {
        registry.destroy_buffer(handle).unwrap();
    }
    registry
        .driver()
        .signal_completed(QueueKind::Graphics, registry.timeline_value())
        .unwrap();
    registry.collect_garbage().unwrap();
}

// ---------------------------------------------------------------------------
// Collection throughput
// ---------------------------------------------------------------------------

fn bench_collect_batch(c: &mut Criterion) {
    let registry = bench_registry();
    let desc = BufferDescriptor::new(256, BufferUsage::STORAGE);

    c.bench_function("collect_1024_zombies", |b| {
        b.iter_batched(
            || {
                let handles: Vec<_> = (0..1024)
                    .map(|_| registry.create_buffer(&desc).unwrap())
                    .collect();
                for handle in &handles {
                    registry.destroy_buffer(*handle).unwrap();
                }
            },
            |_| registry.collect_garbage().unwrap(),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_create_destroy_collect,
    bench_validation,
    bench_record_submission,
    bench_collect_batch
);
criterion_main!(benches);
