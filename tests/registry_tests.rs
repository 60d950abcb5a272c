//! Lifecycle integration tests for the resource registry.
//!
//! Everything runs against the null driver, which counts driver-object
//! creations and destructions and lets tests advance per-queue completion
//! by hand, which is enough to pin down the whole deferred-reclamation
//! contract without GPU hardware.

use std::collections::HashSet;
use std::sync::Arc;

use rstest::rstest;

use gpu_registry::{
    AccelerationStructureDescriptor, BufferDescriptor, BufferUsage, DriverDevice, NullDriver,
    QueueKind, RegistryDescriptor, RegistryError, RegistryLimits, ResourceKind, ResourceRegistry,
    SamplerDescriptor, TextureDescriptor, TextureFormat, TextureUsage, TextureViewDescriptor,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_limits() -> RegistryLimits {
    RegistryLimits {
        max_buffers: 16,
        max_textures: 16,
        max_texture_views: 16,
        max_samplers: 16,
        max_acceleration_structures: 16,
    }
}

fn test_registry(limits: RegistryLimits) -> (Arc<NullDriver>, ResourceRegistry) {
    init_logging();
    let driver = Arc::new(NullDriver::new());
    let registry = ResourceRegistry::new(
        driver.clone(),
        Arc::new(gpu_registry::NoopBindingTable),
        &RegistryDescriptor::new().with_limits(limits),
    );
    (driver, registry)
}

fn buffer_desc(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::STORAGE | BufferUsage::COPY_DST)
}

// ============================================================================
// Deferred reclamation
// ============================================================================

/// The core gating scenario: a buffer referenced by an in-flight
/// submission survives collection until the queue's completion counter
/// passes the submission.
#[test]
fn test_no_premature_reclamation() {
    let (driver, registry) = test_registry(small_limits());

    let buffer = registry.create_buffer(&buffer_desc(64)).unwrap();
    assert_eq!(buffer.index(), 0);
    assert_eq!(buffer.generation(), 1);

    // Four unrelated submissions, then one referencing the buffer at
    // timeline value 5.
    for _ in 0..4 {
        registry.record_submission(QueueKind::Graphics, &[]).unwrap();
    }
    let submission = registry
        .record_submission(QueueKind::Graphics, &[buffer.into()])
        .unwrap();
    assert_eq!(submission, 5);

    registry.destroy_buffer(buffer).unwrap();
    assert!(!registry.is_buffer_valid(buffer));
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 0);

    // GPU has only executed through 4: the zombie must survive.
    driver.signal_completed(QueueKind::Graphics, 4).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 0);

    // GPU finished the referencing submission: now it goes.
    driver.signal_completed(QueueKind::Graphics, submission).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);

    // The slot recycles with a strictly greater generation.
    let again = registry.create_buffer(&buffer_desc(64)).unwrap();
    assert_eq!(again.index(), buffer.index());
    assert!(again.generation() > buffer.generation());
    assert!(!registry.is_buffer_valid(buffer));
    registry.destroy_buffer(again).unwrap();
    registry.collect_garbage().unwrap();
}

/// Destruction requested while several queues are busy waits for the
/// slowest one.
#[rstest]
#[case::graphics(QueueKind::Graphics)]
#[case::compute(QueueKind::Compute)]
#[case::transfer(QueueKind::Transfer)]
fn test_slowest_queue_bounds_reclamation(#[case] slow: QueueKind) {
    let (driver, registry) = test_registry(small_limits());

    let buffer = registry.create_buffer(&buffer_desc(32)).unwrap();
    let mut values = Vec::new();
    for queue in QueueKind::ALL {
        values.push((
            queue,
            registry
                .record_submission(queue, &[buffer.into()])
                .unwrap(),
        ));
    }
    registry.destroy_buffer(buffer).unwrap();

    // Every queue but `slow` finishes.
    for (queue, value) in &values {
        if *queue != slow {
            driver.signal_completed(*queue, *value).unwrap();
        }
    }
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 0);

    let slow_value = values.iter().find(|(q, _)| *q == slow).unwrap().1;
    driver.signal_completed(slow, slow_value).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);
}

/// With no submissions at all, collection reclaims immediately.
#[test]
fn test_unsubmitted_work_collects_immediately() {
    let (driver, registry) = test_registry(small_limits());
    let sampler = registry.create_sampler(&SamplerDescriptor::linear()).unwrap();
    registry.destroy_sampler(sampler).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Sampler), 1);
}

// ============================================================================
// Handle semantics
// ============================================================================

/// No (index, generation) pair is ever issued twice, across many
/// create/destroy/collect cycles that force index reuse.
#[test]
fn test_handle_uniqueness_across_recycling() {
    let limits = RegistryLimits {
        max_buffers: 4,
        ..small_limits()
    };
    let (_, registry) = test_registry(limits);

    let mut issued = HashSet::new();
    for _ in 0..16 {
        let handles: Vec<_> = (0..4)
            .map(|_| registry.create_buffer(&buffer_desc(16)).unwrap())
            .collect();
        for handle in &handles {
            assert!(
                issued.insert((handle.index(), handle.generation())),
                "handle {handle:?} was issued twice"
            );
        }
        for handle in handles {
            registry.destroy_buffer(handle).unwrap();
        }
        registry.collect_garbage().unwrap();
    }
}

#[test]
fn test_stale_and_foreign_handles_are_invalid() {
    let (_, registry) = test_registry(small_limits());
    let buffer = registry.create_buffer(&buffer_desc(16)).unwrap();

    // Validation is idempotent.
    for _ in 0..4 {
        assert!(registry.is_buffer_valid(buffer));
    }

    registry.destroy_buffer(buffer).unwrap();
    for _ in 0..4 {
        assert!(!registry.is_buffer_valid(buffer));
    }

    // Reading through a stale handle is an error, not a fault.
    assert_eq!(
        registry.buffer_size(buffer),
        Err(RegistryError::InvalidHandle(ResourceKind::Buffer))
    );
    registry.collect_garbage().unwrap();
}

/// Two threads race to destroy one handle: exactly one wins, exactly one
/// driver destruction happens.
#[test]
fn test_concurrent_destroy_single_winner() {
    for _ in 0..32 {
        let (driver, registry) = test_registry(small_limits());
        let registry = Arc::new(registry);
        let buffer = registry.create_buffer(&buffer_desc(16)).unwrap();

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.destroy_buffer(buffer).is_ok())
            })
            .collect();
        let wins: Vec<bool> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(wins.iter().filter(|w| **w).count(), 1);

        registry.collect_garbage().unwrap();
        assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);
    }
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn test_capacity_exhaustion_and_recovery() {
    let limits = RegistryLimits {
        max_buffers: 1,
        ..small_limits()
    };
    let (_, registry) = test_registry(limits);

    let first = registry.create_buffer(&buffer_desc(16)).unwrap();
    let err = registry.create_buffer(&buffer_desc(16)).unwrap_err();
    assert_eq!(
        err,
        RegistryError::OutOfCapacity {
            kind: ResourceKind::Buffer,
            capacity: 1,
        }
    );
    // The failure corrupted nothing.
    assert!(registry.is_buffer_valid(first));

    registry.destroy_buffer(first).unwrap();
    registry.collect_garbage().unwrap();
    let third = registry.create_buffer(&buffer_desc(16)).unwrap();
    assert!(registry.is_buffer_valid(third));
    registry.destroy_buffer(third).unwrap();
    registry.collect_garbage().unwrap();
}

/// A zombie still occupies its slot: capacity frees up only after
/// collection.
#[test]
fn test_zombie_holds_capacity_until_collected() {
    let limits = RegistryLimits {
        max_buffers: 1,
        ..small_limits()
    };
    let (_, registry) = test_registry(limits);

    let first = registry.create_buffer(&buffer_desc(16)).unwrap();
    registry
        .record_submission(QueueKind::Graphics, &[first.into()])
        .unwrap();
    registry.destroy_buffer(first).unwrap();

    // Still in flight, so the index has not recycled.
    assert!(registry.create_buffer(&buffer_desc(16)).is_err());

    registry
        .driver()
        .signal_completed(QueueKind::Graphics, 1)
        .unwrap();
    registry.collect_garbage().unwrap();
    let second = registry.create_buffer(&buffer_desc(16)).unwrap();
    registry.destroy_buffer(second).unwrap();
    registry.collect_garbage().unwrap();
}

// ============================================================================
// Submission validation
// ============================================================================

#[test]
fn test_record_submission_validates_all_references() {
    let (_, registry) = test_registry(small_limits());
    let live = registry.create_buffer(&buffer_desc(16)).unwrap();
    let stale = registry.create_buffer(&buffer_desc(16)).unwrap();
    registry.destroy_buffer(stale).unwrap();

    let err = registry
        .record_submission(QueueKind::Compute, &[live.into(), stale.into()])
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidHandle(ResourceKind::Buffer));

    // The failed submission consumed no timeline value.
    assert_eq!(registry.timeline_value(), 0);
    let ok = registry
        .record_submission(QueueKind::Compute, &[live.into()])
        .unwrap();
    assert_eq!(ok, 1);

    registry.destroy_buffer(live).unwrap();
    registry
        .driver()
        .signal_completed(QueueKind::Compute, ok)
        .unwrap();
    registry.collect_garbage().unwrap();
}

// ============================================================================
// Textures, views, and samplers
// ============================================================================

#[test]
fn test_texture_and_view_lifecycle() {
    let (driver, registry) = test_registry(small_limits());

    let texture = registry
        .create_texture(
            &TextureDescriptor::new_2d(
                256,
                256,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            )
            .with_label("albedo"),
        )
        .unwrap();
    let view = registry
        .create_texture_view(texture, &TextureViewDescriptor::default().with_label("albedo view"))
        .unwrap();

    assert!(registry.is_texture_valid(texture));
    assert!(registry.is_texture_view_valid(view));
    assert_eq!(registry.texture_view_texture(view).unwrap(), texture);
    assert_eq!(
        registry.texture_view_format(view).unwrap(),
        TextureFormat::Rgba8Unorm
    );

    // Views do not keep textures alive; both destroy independently.
    registry.destroy_texture_view(view).unwrap();
    registry.destroy_texture(texture).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::TextureView), 1);
    assert_eq!(driver.destroyed_count(ResourceKind::Texture), 1);

    // Creating a view over the dead texture fails cleanly.
    let err = registry
        .create_texture_view(texture, &TextureViewDescriptor::default())
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidHandle(ResourceKind::Texture));
}

// ============================================================================
// Acceleration structures
// ============================================================================

/// A BLAS owns its backing buffer; both are zombied under the same stamp
/// and reclaimed together.
#[test]
fn test_acceleration_structure_owns_backing_buffer() {
    let (driver, registry) = test_registry(small_limits());

    let blas = registry
        .create_blas(&AccelerationStructureDescriptor::new(4096).with_label("mesh"))
        .unwrap();
    assert_eq!(driver.created_count(ResourceKind::Blas), 1);
    assert_eq!(driver.created_count(ResourceKind::Buffer), 1);

    let backing = registry.blas_backing(blas).unwrap();
    assert!(registry.is_buffer_valid(backing));

    // The pair rides one submission.
    let submission = registry
        .record_submission(QueueKind::Graphics, &[blas.into()])
        .unwrap();
    registry.destroy_blas(blas).unwrap();
    // The backing buffer dies with its owner.
    assert!(!registry.is_buffer_valid(backing));

    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Blas), 0);
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 0);

    driver.signal_completed(QueueKind::Graphics, submission).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Blas), 1);
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);
}

#[test]
fn test_tlas_and_blas_pools_are_independent() {
    let limits = RegistryLimits {
        max_acceleration_structures: 1,
        ..small_limits()
    };
    let (_, registry) = test_registry(limits);

    let tlas = registry
        .create_tlas(&AccelerationStructureDescriptor::new(256))
        .unwrap();
    // The TLAS budget is spent, the BLAS budget is not.
    assert!(registry
        .create_tlas(&AccelerationStructureDescriptor::new(256))
        .is_err());
    let blas = registry
        .create_blas(&AccelerationStructureDescriptor::new(256))
        .unwrap();

    registry.destroy_tlas(tlas).unwrap();
    registry.destroy_blas(blas).unwrap();
    registry.collect_garbage().unwrap();
}

// ============================================================================
// Command pool arena
// ============================================================================

#[rstest]
#[case::graphics(QueueKind::Graphics)]
#[case::compute(QueueKind::Compute)]
fn test_command_pool_recycling(#[case] queue: QueueKind) {
    let (driver, registry) = test_registry(small_limits());

    let unit = registry.acquire_command_pool(queue).unwrap();
    assert_eq!(driver.live_command_pools(), 1);

    let submission = registry.record_submission(queue, &[]).unwrap();
    registry.retire_command_pool(queue, unit, submission);

    // Still pending: a second acquire allocates a fresh pool.
    registry.collect_garbage().unwrap();
    let other = registry.acquire_command_pool(queue).unwrap();
    assert_eq!(driver.live_command_pools(), 2);

    // Once the submission retires, the first unit is reused.
    driver.signal_completed(queue, submission).unwrap();
    registry.collect_garbage().unwrap();
    let reused = registry.acquire_command_pool(queue).unwrap();
    assert_eq!(driver.live_command_pools(), 2);

    let last = registry.record_submission(queue, &[]).unwrap();
    registry.retire_command_pool(queue, other, last);
    registry.retire_command_pool(queue, reused, last);
}

// ============================================================================
// Heaps
// ============================================================================

/// A heap-placed buffer holds a shared reference to its heap until the
/// slot is actually reclaimed, not merely destroyed.
#[test]
fn test_heap_reference_released_at_reclamation() {
    let (driver, registry) = test_registry(small_limits());
    let heap = Arc::new(driver.allocate_heap(1 << 16, "streaming heap"));

    let buffer = registry
        .create_buffer_in_heap(&buffer_desc(1024), &heap, 0)
        .unwrap();
    assert_eq!(Arc::strong_count(&heap), 2);
    assert!(registry.buffer_heap(buffer).is_ok());

    registry
        .record_submission(QueueKind::Transfer, &[buffer.into()])
        .unwrap();
    registry.destroy_buffer(buffer).unwrap();
    registry.collect_garbage().unwrap();
    // Still pinned by the in-flight submission.
    assert_eq!(Arc::strong_count(&heap), 2);

    driver.signal_completed(QueueKind::Transfer, 1).unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(Arc::strong_count(&heap), 1);
}

// ============================================================================
// Diagnostics and teardown
// ============================================================================

#[test]
fn test_memory_report_counts_live_resources() {
    let (_, registry) = test_registry(small_limits());
    let buffer = registry
        .create_buffer(&buffer_desc(512).with_label("vertices"))
        .unwrap();
    let texture = registry
        .create_texture(&TextureDescriptor::new_2d(
            16,
            16,
            TextureFormat::Rgba8Unorm,
            TextureUsage::COPY_DST,
        ))
        .unwrap();
    let zombie = registry.create_buffer(&buffer_desc(64)).unwrap();
    registry
        .record_submission(QueueKind::Graphics, &[zombie.into()])
        .unwrap();
    registry.destroy_buffer(zombie).unwrap();

    let report = registry.memory_report();
    assert_eq!(report.count_of(ResourceKind::Buffer), 1);
    assert_eq!(report.count_of(ResourceKind::Texture), 1);
    assert_eq!(report.total_bytes(), 512 + 16 * 16 * 4);

    registry.destroy_buffer(buffer).unwrap();
    registry.destroy_texture(texture).unwrap();
    registry
        .driver()
        .signal_completed(QueueKind::Graphics, 1)
        .unwrap();
    registry.collect_garbage().unwrap();
}

#[test]
fn test_shutdown_drains_pending_zombies() {
    let (driver, registry) = test_registry(small_limits());
    let buffer = registry.create_buffer(&buffer_desc(16)).unwrap();
    registry
        .record_submission(QueueKind::Graphics, &[buffer.into()])
        .unwrap();
    registry.destroy_buffer(buffer).unwrap();

    // Never collected while running; shutdown waits for idle and drains.
    registry.shutdown().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);
}

#[test]
fn test_shutdown_names_leaked_resources() {
    let (_, registry) = test_registry(small_limits());
    let _buffer = registry
        .create_buffer(&buffer_desc(16).with_label("forgotten"))
        .unwrap();
    let _sampler = registry
        .create_sampler(&SamplerDescriptor::new().with_label("shadow sampler"))
        .unwrap();

    match registry.shutdown().unwrap_err() {
        RegistryError::LeakedResources(names) => {
            assert_eq!(names.len(), 2);
            assert!(names.iter().any(|n| n.contains("forgotten")));
            assert!(names.iter().any(|n| n.contains("shadow sampler")));
        }
        other => panic!("expected leak report, got {other}"),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

/// Creates, validations, destroys, and collections from many threads at
/// once; the pool invariants hold throughout.
#[test]
fn test_parallel_churn() {
    let limits = RegistryLimits {
        max_buffers: 1024,
        ..small_limits()
    };
    let (driver, registry) = test_registry(limits);
    let registry = Arc::new(registry);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..128 {
                    let handle = registry.create_buffer(&buffer_desc(16)).unwrap();
                    assert!(registry.is_buffer_valid(handle));
                    registry.destroy_buffer(handle).unwrap();
                    assert!(!registry.is_buffer_valid(handle));
                }
            })
        })
        .collect();
    let collector = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || {
            for _ in 0..64 {
                registry.collect_garbage().unwrap();
                std::thread::yield_now();
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();
    registry.collect_garbage().unwrap();
    assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 4 * 128);
    assert_eq!(
        driver.created_count(ResourceKind::Buffer),
        driver.destroyed_count(ResourceKind::Buffer)
    );
}
