//! Copy-on-write snapshot manager.
//!
//! A single writer mutates a private draft while any number of readers keep
//! observing the previously published tree; `cow_finish` atomically swaps
//! the published pointer, then reclaims the old tree's pages once every
//! reader that might still be holding it has dropped its reference.
//!
//! The published pointer is a `parking_lot::RwLock<Arc<TrieState>>`.
//! `cow_start` clones the `Arc` (an atomic refcount bump) and then builds the
//! draft as a full [`TrieState::deep_clone`] rather than sharing pages with
//! the published tree via path copying. This trades some memory efficiency
//! for an implementation that cannot alias published and draft pages at
//! all: nothing the draft mutates is ever shared, so no in-place branch
//! shrink can ever observe a still-shared page. See `DESIGN.md` for the
//! full tradeoff discussion.
//!
//! The grace period before reclaiming an old published tree works as a
//! later list: `cow_finish` spins briefly on the old `Arc`'s strong count,
//! and anything still referenced after that is parked on a list drained by
//! the next `compact()` or an explicit [`TrieHandle::reclaim_pending`] call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{Result, TrieError};
use crate::gc::{self, GcStats, MemoryStats};
use crate::key::Key;
use crate::name::DomainName;
use crate::region::RegionAllocator;
use crate::trie::{Neighbours, TrieState};

/// How many spin iterations `cow_finish` waits for straggling readers
/// before giving up and deferring reclamation.
const RECLAIM_SPIN_ITERS: u32 = 64;

/// Clears a handle's outstanding-draft flag when its `Draft` goes away,
/// whether that happens via `cow_finish` or by simply dropping the draft.
struct DraftGuard(Arc<AtomicBool>);

impl Drop for DraftGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A private, mutable copy of the trie, obtained from [`TrieHandle::cow_start`].
///
/// Mutations here are invisible to readers of the published tree until the
/// draft is handed back to [`TrieHandle::cow_finish`]. At most one draft can
/// be outstanding per handle at a time; dropping a draft without finishing
/// it (abandoning it) frees the slot for a new `cow_start`.
pub struct Draft<N, V> {
    state: TrieState<N, V>,
    _guard: DraftGuard,
}

impl<N, V> Draft<N, V>
where
    N: DomainName + Clone,
    V: Clone,
{
    pub fn get(&self, key: &Key) -> Option<&V> {
        self.state.get(key)
    }

    pub fn find_le(&self, key: &Key) -> Option<(&N, &V)> {
        self.state.find_le(key)
    }

    pub fn add(&mut self, name: N, value: V) -> Result<Neighbours<N>> {
        self.state.add(name, value)
    }

    pub fn del(&mut self, key: &Key) -> Option<V> {
        self.state.del(key)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// A handle to a published, copy-on-write trie.
///
/// Cheap to clone and share across threads (`Send + Sync`): cloning bumps a
/// reference count rather than copying the tree. Readers call `get`,
/// `find_le`, and `for_each` directly; a writer calls `cow_start`, mutates
/// the returned [`Draft`], and publishes it with `cow_finish`. Concurrent
/// writers on the same handle are not supported; serializing writers is
/// the caller's responsibility.
pub struct TrieHandle<N, V> {
    published: RwLock<Arc<TrieState<N, V>>>,
    later: Mutex<Vec<Arc<TrieState<N, V>>>>,
    region: Arc<dyn RegionAllocator>,
    clock: Arc<dyn Clock>,
    gc_stats: Mutex<GcStats>,
    draft_outstanding: Arc<AtomicBool>,
}

impl<N, V> TrieHandle<N, V>
where
    N: DomainName + Clone,
    V: Clone,
{
    /// Create an empty trie.
    pub fn new(region: Arc<dyn RegionAllocator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            published: RwLock::new(Arc::new(TrieState::new(region.clone()))),
            later: Mutex::new(Vec::new()),
            region,
            clock,
            gc_stats: Mutex::new(GcStats::default()),
            draft_outstanding: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of keys in the currently published tree.
    pub fn count(&self) -> usize {
        self.published.read().len()
    }

    /// Borrow the currently published tree for any number of reads. The
    /// returned `Arc` keeps that exact snapshot alive even if a concurrent
    /// `cow_finish` publishes a newer one underneath it.
    pub fn snapshot(&self) -> Arc<TrieState<N, V>> {
        self.published.read().clone()
    }

    pub fn get(&self, key: &Key) -> Option<V> {
        self.snapshot().get(key).cloned()
    }

    pub fn find_le(&self, key: &Key) -> Option<(N, V)> {
        self.snapshot()
            .find_le(key)
            .map(|(n, v)| (n.clone(), v.clone()))
    }

    pub fn for_each<F: FnMut(&N, &V)>(&self, f: F) {
        self.snapshot().for_each(f);
    }

    /// Begin a copy-on-write draft: an independent, mutable copy of the
    /// currently published tree.
    ///
    /// At most one draft may be outstanding per handle; calling this again
    /// before the first draft is finished (or dropped) returns
    /// [`TrieError::InvalidArgument`].
    pub fn cow_start(&self) -> Result<(Arc<TrieState<N, V>>, Draft<N, V>)> {
        if self.draft_outstanding.swap(true, Ordering::AcqRel) {
            return Err(TrieError::InvalidArgument(
                "a copy-on-write draft is already outstanding for this handle".to_string(),
            ));
        }
        let base = self.snapshot();
        let state = base.deep_clone(self.region.clone());
        trace!(count = state.len(), "started copy-on-write draft");
        Ok((
            base,
            Draft {
                state,
                _guard: DraftGuard(self.draft_outstanding.clone()),
            },
        ))
    }

    /// Publish a draft, atomically replacing the published tree, then try
    /// to reclaim the superseded tree's pages.
    pub fn cow_finish(&self, base: Arc<TrieState<N, V>>, draft: Draft<N, V>) {
        let Draft { state, .. } = draft;
        let new_arc = Arc::new(state);
        {
            let mut guard = self.published.write();
            *guard = new_arc;
        }
        self.retire(base);
    }

    /// One-shot add: start a draft, insert, publish. Convenience for
    /// callers that don't need to batch several mutations into one
    /// publish.
    pub fn add(&self, name: N, value: V) -> Result<Neighbours<N>> {
        let (base, mut draft) = self.cow_start()?;
        let neighbours = draft.add(name, value)?;
        self.cow_finish(base, draft);
        Ok(neighbours)
    }

    /// One-shot delete: start a draft, remove, publish.
    pub fn del(&self, key: &Key) -> Option<V> {
        let (base, mut draft) = self
            .cow_start()
            .expect("del: no draft already outstanding for this handle");
        let removed = draft.del(key);
        self.cow_finish(base, draft);
        removed
    }

    fn retire(&self, old: Arc<TrieState<N, V>>) {
        for _ in 0..RECLAIM_SPIN_ITERS {
            if Arc::strong_count(&old) == 1 {
                debug!("reclaimed superseded snapshot immediately");
                return;
            }
            std::hint::spin_loop();
        }
        self.later.lock().push(old);
    }

    /// Drop any previously superseded snapshots whose last reader has since
    /// finished. Returns how many were reclaimed. Called automatically by
    /// `compact`; exposed so a host can poll it on an idle timer too.
    pub fn reclaim_pending(&self) -> usize {
        let mut later = self.later.lock();
        let before = later.len();
        later.retain(|arc| Arc::strong_count(arc) > 1);
        before - later.len()
    }

    /// Run a garbage collection pass over the published tree, then opportunistically
    /// drain the later-list.
    pub fn compact(&self) {
        self.reclaim_pending();
        let mut guard = self.published.write();
        let mut state = Arc::try_unwrap(std::mem::replace(&mut *guard, Arc::new(TrieState::new(self.region.clone()))))
            .unwrap_or_else(|shared| shared.deep_clone(self.region.clone()));
        let mut stats = self.gc_stats.lock();
        gc::compact(&mut state, &mut stats, self.clock.as_ref(), self.region.clone());
        *guard = Arc::new(state);
    }

    /// Memory and GC diagnostics.
    pub fn memory_stats(&self) -> MemoryStats {
        let state = self.snapshot();
        let alloc = state.allocator();
        let pages = alloc.page_count();
        let average_page_usage = if pages == 0 {
            0.0
        } else {
            (0..pages).map(|p| alloc.usage(p).live_ratio()).sum::<f64>() / pages as f64
        };
        MemoryStats {
            pages_in_use: pages,
            live_twigs: alloc.total_live(),
            free_twigs: alloc.total_free(),
            average_page_usage,
            gc: self.gc_stats.lock().clone(),
        }
    }
}
