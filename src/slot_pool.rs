//! Generic paged slot pool with generation-checked handles.
//!
//! One pool exists per resource kind. Slots live in fixed-size pages that
//! are allocated on demand and never freed before the pool itself, so a
//! published slot address stays stable for the pool's whole lifetime.
//!
//! # Concurrency
//!
//! ```text
//! try_create            is_valid / get            try_mark_zombie
//!     │                       │                          │
//!     ▼                       ▼                          ▼
//! free-list pop ──► payload write ──► generation     generation CAS
//! (lock-free)       (exclusive)       store (Release)  (single winner)
//!                                          │
//!                              Acquire load pairs with it
//! ```
//!
//! Validation and dereference never take a lock: they read the published
//! page count with Acquire ordering and compare the slot's atomic
//! generation against the handle. Only page growth takes a mutex, and only
//! around "allocate one page and publish it". The free-list is a bounded
//! lock-free MPMC queue, since create/destroy are the hottest operations
//! in the system.
//!
//! A slot's stored generation encodes its state:
//! - `0`: never allocated
//! - `g` (zombie bit clear): live, issued as generation `g`
//! - `(g + 1) | ZOMBIE_BIT`: destroyed as generation `g`, awaiting
//!   reclamation; the next occupant of the slot is issued `g + 1`

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;

use crate::handle::{Handle, HandleKind, GENERATION_MAX, ZOMBIE_BIT};

/// Slots per page. Power of two so the page/offset split is a shift and a
/// mask.
pub(crate) const PAGE_SIZE: u32 = 1024;

/// Hard ceiling on a pool's capacity, independent of the configured limit.
pub(crate) const MAX_POOL_CAPACITY: u32 = 1 << 20;

/// Returned by [`SlotPool::try_create`] when the pool is full; carries the
/// rejected payload back to the caller so the driver object inside it can
/// be released.
pub struct CapacityError<T>(pub T);

struct Slot<T> {
    generation: AtomicU64,
    payload: UnsafeCell<Option<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            payload: UnsafeCell::new(None),
        }
    }
}

type Page<T> = Box<[Slot<T>]>;

/// Paged slot storage for one resource kind.
pub struct SlotPool<K: HandleKind, T> {
    /// Page table, sized up front for the full capacity. Entries are
    /// populated under the growth lock and observed through `page_count`.
    pages: Box<[OnceLock<Page<T>>]>,
    /// Number of published pages. Stored with Release after a page is set;
    /// readers load with Acquire and then `pages[i].get()` is infallible
    /// for `i < page_count`.
    page_count: AtomicUsize,
    growth: Mutex<()>,
    /// Recycled indices. Sized to a power of two at or above capacity, so
    /// a push can never fail.
    free_indices: ArrayQueue<u32>,
    /// Next never-used index. u64 so concurrent overshoot past capacity
    /// cannot wrap; an overshot value is only ever compared, never used.
    next_index: AtomicU64,
    /// Slots currently holding a payload (live + zombies).
    occupied: AtomicU32,
    /// Indices permanently retired at generation saturation.
    retired: AtomicU32,
    capacity: u32,
    _kind: PhantomData<K>,
}

// SAFETY: the UnsafeCell payload is only written while the writing thread
// has exclusive claim to the slot (between a free-list pop / fresh-index
// bump and the generation publish, or after winning the zombie CAS), so
// sharing the pool across threads is sound whenever T itself is.
unsafe impl<K: HandleKind, T: Send> Send for SlotPool<K, T> {}
unsafe impl<K: HandleKind, T: Send + Sync> Sync for SlotPool<K, T> {}

impl<K: HandleKind, T> SlotPool<K, T> {
    /// Create a pool with the given maximum live-resource count.
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.min(MAX_POOL_CAPACITY);
        let max_pages = capacity.div_ceil(PAGE_SIZE) as usize;
        let pages = (0..max_pages)
            .map(|_| OnceLock::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            pages,
            page_count: AtomicUsize::new(0),
            growth: Mutex::new(()),
            free_indices: ArrayQueue::new(capacity.next_power_of_two().max(1) as usize),
            next_index: AtomicU64::new(0),
            occupied: AtomicU32::new(0),
            retired: AtomicU32::new(0),
            capacity,
            _kind: PhantomData,
        }
    }

    /// Configured maximum live-resource count.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots currently holding a payload, zombies included.
    pub fn occupied(&self) -> u32 {
        self.occupied.load(Ordering::Relaxed)
    }

    /// Indices permanently retired at generation saturation.
    pub fn retired(&self) -> u32 {
        self.retired.load(Ordering::Relaxed)
    }

    fn slot(&self, index: u32) -> Option<&Slot<T>> {
        let page_index = (index / PAGE_SIZE) as usize;
        if page_index >= self.page_count.load(Ordering::Acquire) {
            return None;
        }
        let page = self.pages[page_index].get()?;
        Some(&page[(index % PAGE_SIZE) as usize])
    }

    /// Publish pages up to and including `page_index`. Narrow critical
    /// section; lookups on already-published pages proceed concurrently.
    fn ensure_page(&self, page_index: usize) {
        if page_index < self.page_count.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.growth.lock();
        let mut count = self.page_count.load(Ordering::Relaxed);
        while count <= page_index {
            let page: Page<T> = (0..PAGE_SIZE).map(|_| Slot::new()).collect();
            let published = self.pages[count].set(page).is_ok();
            debug_assert!(published, "page published twice under the growth lock");
            count += 1;
            self.page_count.store(count, Ordering::Release);
        }
    }

    fn bump_fresh_index(&self) -> Option<u32> {
        let next = self.next_index.fetch_add(1, Ordering::Relaxed);
        if next >= u64::from(self.capacity) {
            return None;
        }
        let index = next as u32;
        self.ensure_page((index / PAGE_SIZE) as usize);
        Some(index)
    }

    /// Allocate a slot, write `payload` into it, and return a handle whose
    /// generation is strictly greater than any the slot carried before.
    ///
    /// The payload is fully written before the generation is published, so
    /// any thread that observes the handle as valid also observes the
    /// payload.
    pub fn try_create(&self, payload: T) -> Result<Handle<K>, CapacityError<T>> {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None => match self.bump_fresh_index() {
                Some(index) => index,
                None => return Err(CapacityError(payload)),
            },
        };
        let slot = self
            .slot(index)
            .expect("allocated index points at an unpublished page");

        let stored = slot.generation.load(Ordering::Relaxed);
        debug_assert!(
            stored == 0 || stored & ZOMBIE_BIT != 0,
            "allocated a slot that is still live"
        );
        let generation = (stored & !ZOMBIE_BIT).max(1);
        debug_assert!(generation < GENERATION_MAX);

        // SAFETY: between the pop/bump above and the generation store
        // below this thread has exclusive claim to the slot; no valid
        // handle for it exists.
        unsafe {
            *slot.payload.get() = Some(payload);
        }
        slot.generation.store(generation, Ordering::Release);
        self.occupied.fetch_add(1, Ordering::Relaxed);
        Ok(Handle::new(index, generation))
    }

    /// O(1), non-blocking validity check. Out-of-range indices and zombied
    /// slots are invalid, not faults.
    pub fn is_valid(&self, handle: Handle<K>) -> bool {
        if handle.generation() == 0 {
            return false;
        }
        match self.slot(handle.index()) {
            Some(slot) => slot.generation.load(Ordering::Acquire) == handle.generation(),
            None => false,
        }
    }

    /// Validated payload access.
    ///
    /// The caller must not let the returned reference outlive the point
    /// where this handle's zombie could be reclaimed (reclamation is the
    /// only thing that ever unwrites a published payload).
    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        if handle.generation() == 0 {
            return None;
        }
        let slot = self.slot(handle.index())?;
        if slot.generation.load(Ordering::Acquire) != handle.generation() {
            return None;
        }
        // SAFETY: the generation matched, so the payload was published
        // (Release/Acquire pair) and has not been reclaimed.
        unsafe { (*slot.payload.get()).as_ref() }
    }

    /// Payload access for a handle the caller has already validated.
    ///
    /// # Safety
    ///
    /// `handle` must be valid in this pool, and the slot must not be
    /// reclaimed while the returned reference is held. A stale handle
    /// reads a recycled or empty slot.
    pub unsafe fn get_unchecked(&self, handle: Handle<K>) -> &T {
        let slot = self
            .slot(handle.index())
            .expect("get_unchecked on an unpublished page");
        (*slot.payload.get())
            .as_ref()
            .expect("get_unchecked on an empty slot")
    }

    /// Payload access for a handle this caller has zombied and not yet
    /// reclaimed.
    ///
    /// # Safety
    ///
    /// The caller must have won `try_mark_zombie` for exactly this handle
    /// and must not have reclaimed it yet; until reclamation the payload
    /// stays in place and the zombie winner is its only reader.
    pub(crate) unsafe fn zombie_payload(&self, handle: Handle<K>) -> &T {
        let slot = self
            .slot(handle.index())
            .expect("zombie_payload on an unpublished page");
        debug_assert_eq!(
            slot.generation.load(Ordering::Acquire),
            (handle.generation() + 1) | ZOMBIE_BIT,
            "zombie_payload on a slot this handle did not zombie"
        );
        (*slot.payload.get())
            .as_ref()
            .expect("zombie_payload on an empty slot")
    }

    /// Flip the slot from live to zombie. Exactly one of any number of
    /// concurrent callers with the same handle succeeds; the slot's handle
    /// stops validating immediately, while the payload stays in place for
    /// the eventual reclamation.
    pub fn try_mark_zombie(&self, handle: Handle<K>) -> bool {
        if handle.generation() == 0 || handle.generation() & ZOMBIE_BIT != 0 {
            return false;
        }
        let Some(slot) = self.slot(handle.index()) else {
            return false;
        };
        let zombied = (handle.generation() + 1) | ZOMBIE_BIT;
        slot.generation
            .compare_exchange(
                handle.generation(),
                zombied,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Take the payload out of a zombied slot and recycle its index.
    ///
    /// The index returns to the free-list unless its generation counter
    /// saturated, in which case it is permanently retired so an
    /// (index, generation) pair can never repeat.
    ///
    /// # Safety
    ///
    /// A successful [`try_mark_zombie`](Self::try_mark_zombie) for
    /// `handle` must have happened before, and no reference into the slot
    /// (from [`get`](Self::get) or [`get_unchecked`](Self::get_unchecked))
    /// may still be live. Calling this for a non-zombied handle is a
    /// contract violation.
    pub unsafe fn reclaim_zombie(&self, handle: Handle<K>) -> T {
        let slot = self
            .slot(handle.index())
            .expect("reclaiming a handle from an unpublished page");
        debug_assert_eq!(
            slot.generation.load(Ordering::Acquire),
            (handle.generation() + 1) | ZOMBIE_BIT,
            "reclaiming a slot that is not this handle's zombie"
        );
        let payload = (*slot.payload.get())
            .take()
            .expect("reclaiming an empty slot");
        self.occupied.fetch_sub(1, Ordering::Relaxed);

        let next_generation = handle.generation() + 1;
        if next_generation == GENERATION_MAX {
            self.retired.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "{} slot {} retired at generation saturation",
                K::KIND.name(),
                handle.index()
            );
        } else {
            // Sized to hold every index, so the push cannot fail.
            let _ = self.free_indices.push(handle.index());
        }
        payload
    }

    /// Visit every live (non-zombie) slot. Must not race reclamation of
    /// the visited slots; see the registry's diagnostics contract.
    pub fn for_each_live(&self, mut f: impl FnMut(Handle<K>, &T)) {
        let pages = self.page_count.load(Ordering::Acquire);
        for page_index in 0..pages {
            let Some(page) = self.pages[page_index].get() else {
                continue;
            };
            for (offset, slot) in page.iter().enumerate() {
                let generation = slot.generation.load(Ordering::Acquire);
                if generation == 0 || generation & ZOMBIE_BIT != 0 {
                    continue;
                }
                let index = page_index as u32 * PAGE_SIZE + offset as u32;
                // SAFETY: the slot was observed live, so its payload is
                // published; the caller guarantees no concurrent
                // reclamation.
                if let Some(payload) = unsafe { (*slot.payload.get()).as_ref() } {
                    f(Handle::new(index, generation), payload);
                }
            }
        }
    }
}

static_assertions::assert_impl_all!(SlotPool<crate::handle::BufferKind, u64>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::BufferKind;

    type Pool = SlotPool<BufferKind, String>;

    #[test]
    fn test_create_and_validate() {
        let pool = Pool::new(16);
        let handle = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.generation(), 1);
        assert!(pool.is_valid(handle));
        assert_eq!(pool.get(handle).map(String::as_str), Some("a"));
        assert_eq!(pool.occupied(), 1);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let pool = Pool::new(16);
        let handle = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        for _ in 0..8 {
            assert!(pool.is_valid(handle));
        }
    }

    #[test]
    fn test_out_of_range_handle_is_invalid() {
        let pool = Pool::new(16);
        let _ = pool.try_create("a".into());
        let bogus = Handle::<BufferKind>::new(999_999, 1);
        assert!(!pool.is_valid(bogus));
        assert!(pool.get(bogus).is_none());
        assert!(!pool.try_mark_zombie(bogus));
    }

    #[test]
    fn test_zombie_invalidates_handle() {
        let pool = Pool::new(16);
        let handle = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        assert!(pool.try_mark_zombie(handle));
        assert!(!pool.is_valid(handle));
        assert!(pool.get(handle).is_none());
        // The loser of a double destroy just fails.
        assert!(!pool.try_mark_zombie(handle));
        // Payload stays in place until reclamation.
        assert_eq!(pool.occupied(), 1);
        let payload = unsafe { pool.reclaim_zombie(handle) };
        assert_eq!(payload, "a");
        assert_eq!(pool.occupied(), 0);
    }

    #[test]
    fn test_recycled_index_gets_greater_generation() {
        let pool = Pool::new(16);
        let first = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        assert!(pool.try_mark_zombie(first));
        unsafe { pool.reclaim_zombie(first) };

        let second = pool.try_create("b".into()).map_err(|_| ()).unwrap();
        assert_eq!(second.index(), first.index());
        assert!(second.generation() > first.generation());
        assert!(!pool.is_valid(first));
        assert!(pool.is_valid(second));
    }

    #[test]
    fn test_capacity_exhaustion_is_recoverable() {
        let pool = Pool::new(1);
        let first = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        let rejected = match pool.try_create("b".into()) {
            Err(CapacityError(payload)) => payload,
            Ok(_) => panic!("pool of capacity 1 allowed a second resource"),
        };
        assert_eq!(rejected, "b");

        assert!(pool.try_mark_zombie(first));
        unsafe { pool.reclaim_zombie(first) };
        let third = pool.try_create("c".into()).map_err(|_| ()).unwrap();
        assert!(pool.is_valid(third));
    }

    #[test]
    fn test_saturated_slot_is_retired() {
        let pool = Pool::new(16);
        let first = pool.try_create("a".into()).map_err(|_| ()).unwrap();
        // Age the slot to one destroy short of saturation.
        let slot = &pool.pages[0].get().unwrap()[0];
        slot.generation.store(GENERATION_MAX - 1, Ordering::Release);
        let aged = Handle::<BufferKind>::new(first.index(), GENERATION_MAX - 1);

        assert!(pool.try_mark_zombie(aged));
        unsafe { pool.reclaim_zombie(aged) };
        assert_eq!(pool.retired(), 1);

        // The retired index is never reused; growth continues on a fresh one.
        let next = pool.try_create("b".into()).map_err(|_| ()).unwrap();
        assert_ne!(next.index(), aged.index());
    }

    #[test]
    fn test_page_growth() {
        let pool = SlotPool::<BufferKind, u32>::new(PAGE_SIZE * 2 + 4);
        let mut handles = Vec::new();
        for i in 0..(PAGE_SIZE * 2 + 4) {
            handles.push(pool.try_create(i).map_err(|_| ()).unwrap());
        }
        assert!(pool.try_create(0).is_err());
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(pool.get(*handle), Some(&(i as u32)));
        }
    }

    #[test]
    fn test_for_each_live_skips_zombies() {
        let pool = Pool::new(16);
        let keep = pool.try_create("keep".into()).map_err(|_| ()).unwrap();
        let drop = pool.try_create("drop".into()).map_err(|_| ()).unwrap();
        assert!(pool.try_mark_zombie(drop));

        let mut seen = Vec::new();
        pool.for_each_live(|handle, payload| seen.push((handle, payload.clone())));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, keep);
        assert_eq!(seen[0].1, "keep");
    }

    #[test]
    fn test_concurrent_create_destroy() {
        use std::sync::Arc;

        let pool = Arc::new(SlotPool::<BufferKind, u64>::new(4096));
        let mut threads = Vec::new();
        for t in 0..4u64 {
            let pool = Arc::clone(&pool);
            threads.push(std::thread::spawn(move || {
                for i in 0..512u64 {
                    let handle = pool.try_create(t * 10_000 + i).map_err(|_| ()).unwrap();
                    assert!(pool.is_valid(handle));
                    assert!(pool.try_mark_zombie(handle));
                    unsafe { pool.reclaim_zombie(handle) };
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(pool.occupied(), 0);
    }

    #[test]
    fn test_concurrent_destroy_single_winner() {
        use std::sync::atomic::AtomicU32;
        use std::sync::Arc;

        for _ in 0..64 {
            let pool = Arc::new(Pool::new(4));
            let handle = pool.try_create("contested".into()).map_err(|_| ()).unwrap();
            let wins = Arc::new(AtomicU32::new(0));

            let threads: Vec<_> = (0..2)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    let wins = Arc::clone(&wins);
                    std::thread::spawn(move || {
                        if pool.try_mark_zombie(handle) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }
            assert_eq!(wins.load(Ordering::Relaxed), 1);
            unsafe { pool.reclaim_zombie(handle) };
        }
    }
}
