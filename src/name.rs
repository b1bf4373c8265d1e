//! Domain-name collaborator.
//!
//! The trie core only needs a name to yield its labels from least specific
//! (the zone apex, closest to the root) to most specific (the owner name),
//! case-folded, so that names sharing a suffix share a key prefix and sort
//! together. Parsing wire-format names, compression pointers, and the rest
//! of the `dname_type` machinery NSD builds on top is out of scope; this
//! trait is the seam the key codec depends on, and `WireName` is a minimal
//! concrete type to exercise and test the trie end-to-end.

use std::fmt;

/// A domain name, exposed as an ordered sequence of labels.
///
/// Label `0` is the most general (closest to the DNS root); the last label
/// is the owner name itself. This is the reverse of how names are usually
/// written (`www.example.com` reads owner-first) and matches how the key
/// codec wants to walk them: common suffixes first, so that `example.com`
/// and `www.example.com` share a key prefix.
pub trait DomainName {
    /// Number of labels, including the implicit root label.
    fn label_count(&self) -> usize;

    /// Raw bytes of the label at `index`, not case-folded and without a
    /// length prefix. Index `0` is the root-most label.
    fn label(&self, index: usize) -> &[u8];

    /// Total length of all label bytes, not counting length-prefix octets.
    fn byte_len(&self) -> usize {
        (0..self.label_count()).map(|i| self.label(i).len()).sum()
    }
}

/// A owned, wire-format-free domain name: just its labels, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireName {
    labels: Vec<Vec<u8>>,
}

impl WireName {
    /// Build a name from labels in conventional reading order (owner name
    /// first, root last), e.g. `["www", "example", "com"]`.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        let mut labels: Vec<Vec<u8>> = labels.into_iter().map(Into::into).collect();
        labels.reverse();
        Self { labels }
    }

    /// Parse a presentation-format name like `"www.example.com"` (no
    /// trailing root dot required, no escape sequences).
    pub fn parse(text: &str) -> Self {
        let text = text.trim_end_matches('.');
        if text.is_empty() {
            return Self { labels: Vec::new() };
        }
        Self::from_labels(text.split('.').map(|l| l.as_bytes().to_vec()))
    }

    /// The root name (zero labels).
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }
}

impl DomainName for WireName {
    fn label_count(&self) -> usize {
        self.labels.len()
    }

    fn label(&self, index: usize) -> &[u8] {
        &self.labels[index]
    }
}

impl fmt::Display for WireName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in self.labels.iter().rev() {
            write!(f, "{}.", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}
