//! Posting lists: pull-based cursors over the documents matching a
//! predicate.
//!
//! Every predicate (term occurrence, value-range membership, boolean
//! combination) implements the same [`PostingList`] protocol, so a matcher
//! can compose and drive trees of them without knowing what each leaf is.
//!
//! # State machine
//!
//! A cursor starts *unstarted*. Each advancing call moves it to a strictly
//! greater docid or to the *terminated* state, which is absorbing. After a
//! [`CheckResult::NotMatched`] a cursor may instead be *parked* at the
//! probed docid: it knows that docid does not match, and the next
//! [`PostingList::advance`] yields the first match after it.
//!
//! # Weights
//!
//! [`PostingList::max_weight`] bounds what any document can contribute.
//! When a caller asks for a `min_weight` above that bound, the cursor
//! terminates at once. Leaves also skip individual postings whose weight
//! falls below `min_weight`.
//!
//! # Examples
//!
//! ```
//! use tessera::postlist::{LeafPostList, Posting, PostingList};
//! use tessera::postlist::weight::BoolWeight;
//! use std::sync::Arc;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let postings = vec![Posting::new(2, 1, 10), Posting::new(5, 3, 12)];
//! let mut pl = LeafPostList::new(b"fox".to_vec(), postings, Arc::new(BoolWeight));
//!
//! pl.advance(0.0)?;
//! assert_eq!(pl.current_docid()?, 2);
//! pl.skip_to(3, 0.0)?;
//! assert_eq!(pl.current_docid()?, 5);
//! pl.advance(0.0)?;
//! assert!(pl.at_end());
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;

use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::types::{DocCount, DocId, DocLength, TermCount, Weight};

pub mod and;
pub mod empty;
pub mod leaf;
pub mod or;
pub mod value_range;
pub mod weight;

pub use and::AndPostList;
pub use empty::EmptyPostList;
pub use leaf::{LeafPostList, Posting};
pub use or::OrPostList;
pub use value_range::ValueRangePostList;

/// Answer of a cheap membership probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    /// The probed docid matches; the cursor is positioned on it.
    Matched,
    /// The probed docid definitely does not match. The cursor is either
    /// parked at it or still positioned on a docid beyond it.
    NotMatched,
    /// The cursor could not decide cheaply and has not moved; fall back to
    /// [`PostingList::skip_to`].
    Unknown,
}

impl CheckResult {
    /// Whether the answer can be relied upon.
    pub fn is_definite(self) -> bool {
        self != CheckResult::Unknown
    }
}

/// The posting-list iteration protocol.
pub trait PostingList: Send + Debug {
    /// Lower bound on the number of documents this cursor yields.
    fn estimate_min(&self) -> DocCount;

    /// Best guess at the number of documents this cursor yields.
    fn estimate(&self) -> DocCount;

    /// Upper bound on the number of documents this cursor yields.
    fn estimate_max(&self) -> DocCount;

    /// Upper bound on [`PostingList::current_weight`] for any document.
    fn max_weight(&self) -> Weight;

    /// Recompute the weight bound, which may have tightened.
    fn recalc_max_weight(&mut self) -> Weight;

    /// The docid the cursor is positioned on.
    fn current_docid(&self) -> Result<DocId>;

    /// The weight of the current document.
    fn current_weight(&self) -> Result<Weight>;

    /// The length of the current document.
    fn current_doc_length(&self) -> Result<DocLength>;

    /// Within-document frequency of the predicate's term(s) in the current
    /// document. Predicates without terms report 0.
    fn current_wdf(&self) -> Result<TermCount>;

    /// Move to the next document whose weight could reach `min_weight`.
    fn advance(&mut self, min_weight: Weight) -> Result<()>;

    /// Move to the first document `>= target` whose weight could reach
    /// `min_weight`. No-op if already positioned at or past `target`.
    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()>;

    /// Probe whether `target` matches.
    ///
    /// The default answers definitely by way of `skip_to`.
    fn check(&mut self, target: DocId, min_weight: Weight) -> Result<CheckResult> {
        self.skip_to(target, min_weight)?;
        if !self.at_end() && self.current_docid()? == target {
            Ok(CheckResult::Matched)
        } else {
            Ok(CheckResult::NotMatched)
        }
    }

    /// Whether the cursor has terminated.
    fn at_end(&self) -> bool;

    /// Positions of the predicate's term(s) in the current document. Empty
    /// for predicates without positions.
    fn open_position_list(&self) -> Result<PositionList>;

    /// Human-readable description for diagnostics.
    fn description(&self) -> String;
}

impl PostingList for Box<dyn PostingList> {
    fn estimate_min(&self) -> DocCount {
        (**self).estimate_min()
    }

    fn estimate(&self) -> DocCount {
        (**self).estimate()
    }

    fn estimate_max(&self) -> DocCount {
        (**self).estimate_max()
    }

    fn max_weight(&self) -> Weight {
        (**self).max_weight()
    }

    fn recalc_max_weight(&mut self) -> Weight {
        (**self).recalc_max_weight()
    }

    fn current_docid(&self) -> Result<DocId> {
        (**self).current_docid()
    }

    fn current_weight(&self) -> Result<Weight> {
        (**self).current_weight()
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        (**self).current_doc_length()
    }

    fn current_wdf(&self) -> Result<TermCount> {
        (**self).current_wdf()
    }

    fn advance(&mut self, min_weight: Weight) -> Result<()> {
        (**self).advance(min_weight)
    }

    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()> {
        (**self).skip_to(target, min_weight)
    }

    fn check(&mut self, target: DocId, min_weight: Weight) -> Result<CheckResult> {
        (**self).check(target, min_weight)
    }

    fn at_end(&self) -> bool {
        (**self).at_end()
    }

    fn open_position_list(&self) -> Result<PositionList> {
        (**self).open_position_list()
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

/// Error for accessors called while the cursor is not positioned.
pub(crate) fn not_positioned(description: &str) -> TesseraError {
    TesseraError::invalid_operation(format!("{description} is not positioned on a document"))
}

/// Whether no document of a cursor bounded by `max_weight` can reach
/// `min_weight`.
pub(crate) fn below_threshold(max_weight: Weight, min_weight: Weight) -> bool {
    min_weight > max_weight
}

/// Drain a cursor, collecting every docid it yields.
pub fn collect_docids<P: PostingList + ?Sized>(pl: &mut P, min_weight: Weight) -> Result<Vec<DocId>> {
    let mut docids = Vec::new();
    pl.advance(min_weight)?;
    while !pl.at_end() {
        docids.push(pl.current_docid()?);
        pl.advance(min_weight)?;
    }
    Ok(docids)
}
