//! Copying, Cheney-style garbage collector and memory statistics.
//!
//! A compaction pass walks the live tree, evacuating every reachable node
//! into a freshly allocated set of pages, then drops the old pages
//! entirely. Because the trie never aliases two live references to the
//! same twig, a recursive copy cannot create cycles or duplicate work.
//!
//! The running-mean/variance accumulator reports pass duration and
//! pages-freed distributions alongside raw counters.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::alloc::Allocator;
use crate::clock::Clock;
use crate::key::BRANCH_MAX_TWIGS;
use crate::name::DomainName;
use crate::node::{BranchData, Node};
use crate::region::RegionAllocator;
use crate::trie::TrieState;

/// Welford's online algorithm for a running mean and variance, avoiding the
/// numerical instability of accumulating `sum` and `sum_of_squares`
/// separately over a long-running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Accumulated statistics across every `compact()` call on one trie.
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    pub runs: u64,
    pub pass_duration: RunningStat,
    pub pages_freed: RunningStat,
}

/// A snapshot of current memory usage, backing `Trie::memory_stats()`.
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub pages_in_use: usize,
    pub live_twigs: u32,
    pub free_twigs: u32,
    pub average_page_usage: f64,
    pub gc: GcStats,
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

impl MemoryStats {
    pub fn approx_bytes_per_twig() -> usize {
        // Rough estimate: cells are boxed/enum-tagged rather than packed,
        // so the true figure depends on N and V; callers after exact sizing
        // should use `std::mem::size_of` on their own concrete Node<N, V>.
        24
    }

    pub fn approx_megabytes(&self) -> f64 {
        megabytes(self.live_twigs as u64 * Self::approx_bytes_per_twig() as u64)
    }
}

/// Run a Cheney-style copying compaction over `trie`, evacuating live nodes
/// into a fresh allocator and discarding the old pages.
///
/// Pages whose live ratio is already at or above
/// `crate::alloc::MIN_USAGE_RATIO` could in principle be left untouched;
/// this pass always re-evacuates everything reachable instead, since the
/// safe-Rust ownership model makes "leave a page in place" hard to express
/// without aliasing between old and new allocators. Per-page usage is still
/// tracked so future work could reintroduce the distinction.
pub fn compact<N, V>(trie: &mut TrieState<N, V>, stats: &mut GcStats, clock: &dyn Clock, region: Arc<dyn RegionAllocator>)
where
    N: DomainName + Clone,
    V: Clone,
{
    let start = clock.now_monotonic();
    let pages_before = trie.allocator().page_count();

    let mut fresh: Allocator<N, V> = Allocator::new(region);
    let new_root = trie.root().map(|root| evacuate(root, trie, &mut fresh));

    let pages_after = fresh.page_count();
    trie.replace_allocator(fresh, new_root);

    let elapsed = clock.now_monotonic().saturating_sub(start);
    let freed = pages_before.saturating_sub(pages_after);
    stats.runs += 1;
    stats.pass_duration.observe(elapsed.as_secs_f64());
    stats.pages_freed.observe(freed as f64);

    info!(
        pages_before,
        pages_after,
        freed,
        elapsed_ms = elapsed.as_millis() as u64,
        "garbage collection pass complete"
    );
}

pub(crate) fn evacuate<N, V>(node: &Node<N, V>, src: &TrieState<N, V>, dst: &mut Allocator<N, V>) -> Node<N, V>
where
    N: DomainName + Clone,
    V: Clone,
{
    match node {
        Node::Leaf(leaf) => Node::new_leaf(leaf.name.clone(), leaf.key.clone(), leaf.value.clone()),
        Node::Branch(b) => {
            debug_assert!(b.twig_max() >= 2 && b.twig_max() <= BRANCH_MAX_TWIGS);
            let mut children = Vec::with_capacity(b.twig_max());
            for pos in 0..b.twig_max() {
                let child = src.allocator().deref(b.twigs + pos as u32);
                children.push(evacuate(child, src, dst));
            }
            let base = dst
                .alloc_contiguous(children)
                .expect("evacuating fewer than BRANCH_MAX_TWIGS nodes always fits a fresh page");
            Node::Branch(BranchData {
                offset: b.offset,
                bitmap: b.bitmap,
                twigs: base,
            })
        }
    }
}
