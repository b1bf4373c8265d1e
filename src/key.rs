//! Lookup key codec.
//!
//! Domain names are encoded into a flat sequence of small integers
//! ("shifts") so that comparing two encoded keys byte by byte reproduces
//! canonical DNS name ordering (case-insensitive, labels compared root to
//! leaf). Each raw byte maps to either one shift value, for the 39 bytes
//! common in DNS names (`-`, `_`, `.`, digits, letters folded to lower
//! case), or two shift values for everything else: an escape shift that
//! identifies a small bucket of rare bytes, followed by a discriminator
//! shift that picks the byte out of that bucket. Label boundaries are
//! marked with `NOBYTE`, the smallest possible shift value, so a name
//! always sorts before any of its extensions; the key ends with two
//! consecutive `NOBYTE`s.
//!
//! The table is built once, lazily, by [`shift_table`] rather than
//! hand-transcribed, so the bucket layout falls out of the byte alphabet
//! instead of being copied from a reference implementation.

use std::sync::OnceLock;

use crate::name::DomainName;

/// A single encoded symbol.
pub type Shift = u8;

/// The label/name terminator. Smaller than every other shift value, so it
/// always sorts first among siblings at a given offset.
pub const NOBYTE: Shift = 0;

/// Number of distinct raw bytes (after case folding) that get a single
/// shift value.
pub const COMMON_BYTE_COUNT: usize = 39;

/// Maximum discriminator-bearing bucket size; also the practical ceiling on
/// how many distinct rare bytes can share one escape shift while keeping
/// every branch within `BRANCH_MAX_TWIGS`.
const BUCKET_MAX: usize = 46;

/// Upper bound on live twigs in any branch node: one for `NOBYTE`, one for
/// each of the 39 common bytes, and one for each escape bucket. The 256-byte
/// alphabet needs 7 buckets once case-folding and bucket-size limits are
/// accounted for, giving 1 + 39 + 7 = 47.
pub const BRANCH_MAX_TWIGS: usize = 47;

/// Minimum live twigs in any branch node (a branch with fewer would have
/// been collapsed).
pub const BRANCH_MIN_TWIGS: usize = 2;

/// Maximum number of shifts in an encoded key. Real DNS names (wire length
/// <= 255, each byte needing at most two shifts, plus two terminator
/// shifts) never come close to this; it exists as a debug-assertion bound,
/// not a runtime check on the hot path.
pub const KEY_MAX_LEN: usize = 512;

fn is_common(folded: u8) -> bool {
    matches!(folded, b'-' | b'_' | b'.' | b'0'..=b'9' | b'a'..=b'z')
}

/// `(first_shift, second_shift)` for every raw byte value; `second_shift ==
/// 0` means the byte needs only the first shift.
type ShiftTable = [(Shift, Shift); 256];

fn build_table() -> ShiftTable {
    let mut table = [(0u8, 0u8); 256];
    let mut next_shift: u16 = 1; // 0 is reserved for NOBYTE.
    let mut bucket: Vec<u8> = Vec::with_capacity(BUCKET_MAX);

    let flush = |bucket: &mut Vec<u8>, next_shift: &mut u16, table: &mut ShiftTable| {
        if bucket.is_empty() {
            return;
        }
        let escape = *next_shift as Shift;
        *next_shift += 1;
        for (i, &raw) in bucket.iter().enumerate() {
            table[raw as usize] = (escape, (i + 1) as Shift);
        }
        bucket.clear();
    };

    for raw in 0u16..256 {
        let raw = raw as u8;
        if raw.is_ascii_uppercase() {
            // Filled in below by copying the lowercase twin.
            continue;
        }
        if is_common(raw) {
            flush(&mut bucket, &mut next_shift, &mut table);
            table[raw as usize] = (next_shift as Shift, 0);
            next_shift += 1;
        } else {
            bucket.push(raw);
            if bucket.len() == BUCKET_MAX {
                flush(&mut bucket, &mut next_shift, &mut table);
            }
        }
    }
    flush(&mut bucket, &mut next_shift, &mut table);

    debug_assert!(
        (next_shift as usize) - 1 <= BRANCH_MAX_TWIGS - 1,
        "shift table uses more symbols than a branch can hold"
    );

    for upper in b'A'..=b'Z' {
        table[upper as usize] = table[(upper + 32) as usize];
    }

    table
}

fn shift_table() -> &'static ShiftTable {
    static TABLE: OnceLock<ShiftTable> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

/// Map a single raw byte to its one or two shift values.
pub fn byte_shifts(byte: u8) -> (Shift, Option<Shift>) {
    let (first, second) = shift_table()[byte as usize];
    (first, if second == 0 { None } else { Some(second) })
}

/// An encoded lookup key: a flat, ordered sequence of shift values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Key {
    shifts: Vec<Shift>,
}

impl Key {
    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Shift value at `offset`, or `NOBYTE` if the key has ended (this is
    /// what lets comparisons treat a short key as sorting before its own
    /// extensions).
    pub fn at(&self, offset: usize) -> Shift {
        self.shifts.get(offset).copied().unwrap_or(NOBYTE)
    }

    /// Encode a domain name into its trie key.
    ///
    /// Labels are walked root to leaf (see [`DomainName`]); every label,
    /// including the last, is followed by one `NOBYTE`, and one further
    /// `NOBYTE` terminates the key. A name with no labels (the DNS root)
    /// therefore encodes to a single `NOBYTE`.
    pub fn encode<N: DomainName + ?Sized>(name: &N) -> Self {
        let mut shifts = Vec::with_capacity(name.byte_len() * 2 + 4);
        for i in 0..name.label_count() {
            for &byte in name.label(i) {
                let (first, second) = byte_shifts(byte);
                shifts.push(first);
                if let Some(second) = second {
                    shifts.push(second);
                }
            }
            shifts.push(NOBYTE);
        }
        shifts.push(NOBYTE);
        debug_assert!(
            shifts.len() <= KEY_MAX_LEN,
            "encoded key exceeds KEY_MAX_LEN"
        );
        Self { shifts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::WireName;

    #[test]
    fn common_bytes_get_single_shift() {
        for &b in b"-_.0123456789abcdefghijklmnopqrstuvwxyz" {
            let (_, second) = byte_shifts(b);
            assert_eq!(second, None, "byte {:?} should not escape", b as char);
        }
    }

    #[test]
    fn rare_bytes_get_two_shifts() {
        for b in [0u8, b'@', b'{', 255u8] {
            let (_, second) = byte_shifts(b);
            assert!(second.is_some(), "byte {:?} should escape", b);
        }
    }

    #[test]
    fn case_is_folded() {
        assert_eq!(byte_shifts(b'A'), byte_shifts(b'a'));
        assert_eq!(byte_shifts(b'Z'), byte_shifts(b'z'));
    }

    #[test]
    fn nobyte_is_smaller_than_everything_else() {
        let table = shift_table();
        for &(first, second) in table.iter() {
            assert!(first > NOBYTE);
            if second != 0 {
                assert!(second > NOBYTE);
            }
        }
    }

    #[test]
    fn symbol_budget_fits_branch_max_twigs() {
        let table = shift_table();
        let mut max_shift = NOBYTE;
        for &(first, second) in table.iter() {
            max_shift = max_shift.max(first);
            // second shifts are bucket-local discriminators, also bounded.
            let _ = second;
        }
        assert!((max_shift as usize) < BRANCH_MAX_TWIGS);
    }

    #[test]
    fn root_encodes_to_single_nobyte() {
        let key = Key::encode(&WireName::root());
        assert_eq!(key.shifts(), &[NOBYTE]);
    }

    #[test]
    fn name_ends_with_double_nobyte() {
        let key = Key::encode(&WireName::parse("example.com"));
        let n = key.len();
        assert_eq!(key.at(n - 1), NOBYTE);
        assert_eq!(key.at(n - 2), NOBYTE);
    }

    #[test]
    fn short_key_sorts_before_its_extension() {
        let short = Key::encode(&WireName::parse("com"));
        let long = Key::encode(&WireName::parse("example.com"));
        // short is a prefix of long up to short's own terminator; at the
        // offset where short ends, `at` returns NOBYTE, the smallest
        // value, so short < long lexicographically.
        let common_prefix_len = short.len() - 1; // exclude short's own terminator
        assert_eq!(&short.shifts()[..common_prefix_len], &long.shifts()[..common_prefix_len]);
        assert!(short.at(common_prefix_len) <= long.at(common_prefix_len));
    }

    #[test]
    fn ordering_matches_canonical_dns_order() {
        let names = ["a.com", "b.com", "example.com", "www.example.com", "zz.com"];
        let mut keys: Vec<Key> = names.iter().map(|n| Key::encode(&WireName::parse(n))).collect();
        let sorted_by_key = {
            let mut idx: Vec<usize> = (0..keys.len()).collect();
            idx.sort_by(|&a, &b| keys[a].shifts().cmp(keys[b].shifts()));
            idx
        };
        // Canonical DNS order compares labels root-to-leaf; for these
        // examples that coincides with encoded-key order by construction.
        assert_eq!(sorted_by_key, vec![0, 1, 2, 3, 4]);
        keys.clear();
    }
}
