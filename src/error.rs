//! Error handling for qp-trie operations.
//!
//! This module defines the error type used throughout the crate. Public
//! APIs that can fail return `Result<T, TrieError>`; operations that are
//! total (lookups, deletes of absent keys) return plain values instead:
//! absent keys and no-op deletes are not errors, only allocator failure and
//! misuse of the copy-on-write protocol are.
//!
//! # Error Types
//!
//! - [`TrieError`] - error enum covering allocator and invariant failures
//! - [`Result`] - result alias for convenience

use thiserror::Error;

/// Result type for qp-trie operations.
pub type Result<T> = std::result::Result<T, TrieError>;

/// Errors that can occur during trie operations.
///
/// Most trie operations (`get`, `find_le`, `del`, `for_each`) cannot fail and
/// return plain values. The error type exists for the allocator, GC, and
/// snapshot machinery, where a failure genuinely means the trie cannot
/// uphold its invariants.
#[derive(Debug, Error)]
pub enum TrieError {
    /// The host could not supply a fresh page for the slab allocator.
    ///
    /// This is fatal: the trie cannot grow, and an in-flight insertion or
    /// GC evacuation cannot complete.
    #[error("allocator exhausted: {0}")]
    AllocationFailed(String),

    /// A COW draft was requested while one was already outstanding.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
