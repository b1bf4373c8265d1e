//! Page-indexed slab allocator for node cells.
//!
//! Nodes never move except during garbage collection, so they can be
//! referenced by a plain 32-bit index instead of a pointer: the low bits
//! select a twig within a page, the high bits select the page. Allocation
//! is a bump pointer within the current page; when a page fills, a new one
//! is appended to the page table, growing the table itself by roughly 1.5x
//! when it runs out of room.
//!
//! A parallel usage table tracks, per page, how many twigs are still
//! referenced by the live tree (`used - free`) and how many predate the
//! page's last compaction (`keep`, the floor a copying GC must preserve
//! because a snapshot still reaches them). The garbage collector consults
//! this table to decide which pages are worth evacuating.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::{Result, TrieError};
use crate::key::Key;
use crate::node::Node;
use crate::region::RegionAllocator;

/// Twigs held per page before a new one is appended.
pub const PAGE_SIZE: u32 = 4096;

/// Total free (retired but not yet reclaimed) twigs across all pages above
/// which a garbage collection pass is worth running.
pub const MAX_GARBAGE_TWIGS: u32 = 1_000_000;

/// A page is worth evacuating during compaction once its live twigs drop
/// below this fraction of its capacity.
pub const MIN_USAGE_RATIO: f64 = 0.5;

/// A reference to a twig: `page_index * PAGE_SIZE + twig_index`.
pub type TwigRef = u32;

fn page_of(r: TwigRef) -> usize {
    (r / PAGE_SIZE) as usize
}

fn index_in_page(r: TwigRef) -> usize {
    (r % PAGE_SIZE) as usize
}

fn make_ref(page: usize, index: usize) -> TwigRef {
    page as u32 * PAGE_SIZE + index as u32
}

struct Page<N, V> {
    cells: Vec<Node<N, V>>,
}

impl<N, V> Page<N, V> {
    fn new() -> Self {
        Self {
            cells: Vec::with_capacity(PAGE_SIZE as usize),
        }
    }

    fn is_full(&self) -> bool {
        self.cells.len() as u32 >= PAGE_SIZE
    }
}

/// Per-page live/garbage bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageUsage {
    /// Twigs present before this page's most recent compaction; a floor the
    /// next compaction must not shrink below without evacuating.
    pub keep: u32,
    /// Twigs ever allocated in this page (the bump pointer's position).
    pub used: u32,
    /// Twigs retired (overwritten or deleted) since allocation.
    pub free: u32,
}

impl PageUsage {
    pub fn live(&self) -> u32 {
        self.used.saturating_sub(self.free)
    }

    pub fn live_ratio(&self) -> f64 {
        if self.used == 0 {
            1.0
        } else {
            self.live() as f64 / self.used as f64
        }
    }
}

/// The page-indexed slab allocator.
pub struct Allocator<N, V> {
    region: Arc<dyn RegionAllocator>,
    pages: Vec<Page<N, V>>,
    usage: Vec<PageUsage>,
    total_free: u32,
}

impl<N, V> Allocator<N, V> {
    pub fn new(region: Arc<dyn RegionAllocator>) -> Self {
        Self {
            region,
            pages: Vec::new(),
            usage: Vec::new(),
            total_free: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn usage(&self, page: usize) -> PageUsage {
        self.usage[page]
    }

    pub fn total_free(&self) -> u32 {
        self.total_free
    }

    pub fn total_live(&self) -> u32 {
        self.usage.iter().map(|u| u.live()).sum()
    }

    pub fn needs_compaction(&self) -> bool {
        self.total_free >= MAX_GARBAGE_TWIGS
    }

    fn grow_page_table(&mut self) {
        if self.pages.len() == self.pages.capacity() {
            let new_cap = ((self.pages.capacity() * 3) / 2).max(self.pages.len() + 1);
            self.pages.reserve_exact(new_cap - self.pages.len());
            self.usage.reserve_exact(new_cap - self.usage.len());
            // Bookkeeping buffers for the page/usage tables themselves are
            // sized through the region allocator; the pages' node storage
            // is ordinary heap allocation, independent of this trait.
            let _ = self
                .region
                .allocate(new_cap * std::mem::size_of::<PageUsage>());
            debug!(new_capacity = new_cap, "grew page table");
        }
    }

    fn current_page_mut(&mut self) -> usize {
        if self.pages.is_empty() || self.pages.last().unwrap().is_full() {
            self.grow_page_table();
            self.pages.push(Page::new());
            self.usage.push(PageUsage::default());
        }
        self.pages.len() - 1
    }

    /// Allocate a new twig, returning its reference.
    pub fn alloc(&mut self, node: Node<N, V>) -> Result<TwigRef> {
        let page = self.current_page_mut();
        let index = self.pages[page].cells.len();
        self.pages[page].cells.push(node);
        self.usage[page].used += 1;
        let r = make_ref(page, index);
        trace!(twig_ref = r, "allocated twig");
        Ok(r)
    }

    /// Mark a twig as no longer reachable from the live tree.
    pub fn retire(&mut self, r: TwigRef) {
        let page = page_of(r);
        self.usage[page].free += 1;
        self.total_free += 1;
    }

    pub fn deref(&self, r: TwigRef) -> &Node<N, V> {
        &self.pages[page_of(r)].cells[index_in_page(r)]
    }

    pub fn deref_mut(&mut self, r: TwigRef) -> &mut Node<N, V> {
        &mut self.pages[page_of(r)].cells[index_in_page(r)]
    }

    /// Allocate `count` contiguous twigs in one page, used when growing a
    /// branch's twig array. Fails only if the host allocator cannot supply
    /// a page; this is fatal and propagated rather than retried.
    pub fn alloc_contiguous(&mut self, nodes: Vec<Node<N, V>>) -> Result<TwigRef> {
        if nodes.len() as u32 > PAGE_SIZE {
            let err = TrieError::AllocationFailed(format!(
                "requested {} contiguous twigs exceeds page size {}",
                nodes.len(),
                PAGE_SIZE
            ));
            error!(%err, "allocation request cannot be satisfied");
            return Err(err);
        }
        // Contiguity requires a page with enough remaining room; start a
        // fresh page rather than splitting across a boundary.
        if self.pages.last().map(|p| p.cells.len() as u32 + nodes.len() as u32 > PAGE_SIZE).unwrap_or(true) {
            self.grow_page_table();
            self.pages.push(Page::new());
            self.usage.push(PageUsage::default());
        }
        let page = self.pages.len() - 1;
        let start = self.pages[page].cells.len();
        let n = nodes.len() as u32;
        self.pages[page].cells.extend(nodes);
        self.usage[page].used += n;
        Ok(make_ref(page, start))
    }
}
