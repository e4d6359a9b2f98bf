//! Cursor over the positions of one term within one document.

use crate::types::TermPos;

/// Sorted positions with forward iteration and `skip_to`.
///
/// Predicates without a positional concept hand out
/// [`PositionList::empty`] rather than failing.
#[derive(Debug, Clone, Default)]
pub struct PositionList {
    positions: Vec<TermPos>,
    next: usize,
}

impl PositionList {
    /// Create a position list, sorting and de-duplicating `positions` if
    /// they are not already strictly increasing.
    pub fn new(mut positions: Vec<TermPos>) -> Self {
        if !positions.windows(2).all(|w| w[0] < w[1]) {
            positions.sort_unstable();
            positions.dedup();
        }
        PositionList { positions, next: 0 }
    }

    /// A list with no positions.
    pub fn empty() -> Self {
        PositionList::default()
    }

    /// Merge several sorted lists into one, dropping duplicates.
    pub fn union<I: IntoIterator<Item = PositionList>>(lists: I) -> Self {
        PositionList::new(lists.into_iter().flat_map(|l| l.positions).collect())
    }

    /// Total number of positions (consumed or not).
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the list has no positions at all.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether every position has been consumed.
    pub fn at_end(&self) -> bool {
        self.next >= self.positions.len()
    }

    /// Consume and return the first remaining position `>= target`.
    pub fn skip_to(&mut self, target: TermPos) -> Option<TermPos> {
        let rest = &self.positions[self.next..];
        self.next += rest.partition_point(|&p| p < target);
        Iterator::next(self)
    }

    /// All positions as a slice.
    pub fn as_slice(&self) -> &[TermPos] {
        &self.positions
    }
}

impl Iterator for PositionList {
    type Item = TermPos;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.positions.get(self.next).copied()?;
        self.next += 1;
        Some(pos)
    }
}
