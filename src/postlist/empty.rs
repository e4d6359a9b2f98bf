//! A posting list that matches nothing.

use crate::error::Result;
use crate::positionlist::PositionList;
use crate::postlist::{CheckResult, PostingList, not_positioned};
use crate::types::{DocCount, DocId, DocLength, TermCount, Weight};

/// Returned for terms a backend does not contain, so that "absent here"
/// looks exactly like "present with no postings" to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPostList;

impl EmptyPostList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        EmptyPostList
    }
}

impl PostingList for EmptyPostList {
    fn estimate_min(&self) -> DocCount {
        0
    }

    fn estimate(&self) -> DocCount {
        0
    }

    fn estimate_max(&self) -> DocCount {
        0
    }

    fn max_weight(&self) -> Weight {
        0.0
    }

    fn recalc_max_weight(&mut self) -> Weight {
        0.0
    }

    fn current_docid(&self) -> Result<DocId> {
        Err(not_positioned("EmptyPostList"))
    }

    fn current_weight(&self) -> Result<Weight> {
        Err(not_positioned("EmptyPostList"))
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        Err(not_positioned("EmptyPostList"))
    }

    fn current_wdf(&self) -> Result<TermCount> {
        Err(not_positioned("EmptyPostList"))
    }

    fn advance(&mut self, _min_weight: Weight) -> Result<()> {
        Ok(())
    }

    fn skip_to(&mut self, _target: DocId, _min_weight: Weight) -> Result<()> {
        Ok(())
    }

    fn check(&mut self, _target: DocId, _min_weight: Weight) -> Result<CheckResult> {
        Ok(CheckResult::NotMatched)
    }

    fn at_end(&self) -> bool {
        true
    }

    fn open_position_list(&self) -> Result<PositionList> {
        Err(not_positioned("EmptyPostList"))
    }

    fn description(&self) -> String {
        "EmptyPostList".to_string()
    }
}
