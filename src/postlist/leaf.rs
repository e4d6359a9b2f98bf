//! Posting list for a single term.
//!
//! The postings are a snapshot taken when the list is opened, so later
//! changes to the backend never show up in an open cursor. Postings are
//! grouped into fixed-size skip blocks that record their last docid;
//! `skip_to` binary-searches the blocks and then the one block it lands in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::positionlist::PositionList;
use crate::postlist::weight::Weighting;
use crate::postlist::{CheckResult, PostingList, below_threshold, not_positioned};
use crate::types::{DocCount, DocId, DocLength, TermCount, TermPos, Weight, display_term};

/// Number of postings per skip block.
const BLOCK_SIZE: usize = 64;

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Document ID.
    pub docid: DocId,
    /// Within-document frequency of the term.
    pub wdf: TermCount,
    /// Length of the document.
    pub doc_length: DocLength,
    /// Positions of the term in the document (sorted).
    pub positions: Vec<TermPos>,
}

impl Posting {
    /// Create a posting without positions.
    pub fn new(docid: DocId, wdf: TermCount, doc_length: DocLength) -> Self {
        Posting {
            docid,
            wdf,
            doc_length,
            positions: Vec::new(),
        }
    }

    /// Attach positions to this posting.
    pub fn with_positions(mut self, positions: Vec<TermPos>) -> Self {
        self.positions = positions;
        self
    }
}

/// Summary of one run of [`BLOCK_SIZE`] postings.
#[derive(Debug, Clone, Copy)]
struct SkipBlock {
    last_docid: DocId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Unstarted,
    /// Positioned on the posting at this index.
    At(usize),
    /// Not positioned; the next candidate is the posting at this index.
    Parked(usize),
    Ended,
}

/// Cursor over the postings of one term.
#[derive(Debug)]
pub struct LeafPostList {
    term: Vec<u8>,
    postings: Vec<Posting>,
    blocks: Vec<SkipBlock>,
    weighting: Arc<dyn Weighting>,
    max_wdf: TermCount,
    cursor: Cursor,
}

impl LeafPostList {
    /// Create a cursor over `postings`, which are sorted and de-duplicated
    /// by docid if they are not already.
    pub fn new(term: Vec<u8>, mut postings: Vec<Posting>, weighting: Arc<dyn Weighting>) -> Self {
        if !postings.windows(2).all(|w| w[0].docid < w[1].docid) {
            postings.sort_by_key(|p| p.docid);
            postings.dedup_by_key(|p| p.docid);
        }
        let blocks = postings
            .chunks(BLOCK_SIZE)
            .filter_map(|chunk| chunk.last())
            .map(|last| SkipBlock {
                last_docid: last.docid,
            })
            .collect();
        let max_wdf = postings.iter().map(|p| p.wdf).max().unwrap_or(0);

        LeafPostList {
            term,
            postings,
            blocks,
            weighting,
            max_wdf,
            cursor: Cursor::Unstarted,
        }
    }

    /// The term this list is for.
    pub fn term(&self) -> &[u8] {
        &self.term
    }

    fn weight_at(&self, idx: usize) -> Weight {
        let posting = &self.postings[idx];
        self.weighting.weight(posting.wdf, posting.doc_length)
    }

    fn current(&self) -> Result<&Posting> {
        match self.cursor {
            Cursor::At(idx) => Ok(&self.postings[idx]),
            _ => Err(not_positioned(&self.description())),
        }
    }

    /// Index of the first posting at or after `from` with docid `>= target`.
    fn lower_bound(&self, from: usize, target: DocId) -> usize {
        if from >= self.postings.len() {
            return self.postings.len();
        }
        let first_block = from / BLOCK_SIZE;
        let block =
            first_block + self.blocks[first_block..].partition_point(|b| b.last_docid < target);
        if block == self.blocks.len() {
            return self.postings.len();
        }
        let start = from.max(block * BLOCK_SIZE);
        let end = ((block + 1) * BLOCK_SIZE).min(self.postings.len());
        start + self.postings[start..end].partition_point(|p| p.docid < target)
    }

    /// Position on the first posting at or after `from` whose weight
    /// reaches `min_weight`.
    fn seek(&mut self, from: usize, min_weight: Weight) {
        let found = (from..self.postings.len()).find(|&idx| self.weight_at(idx) >= min_weight);
        self.cursor = match found {
            Some(idx) => Cursor::At(idx),
            None => Cursor::Ended,
        };
    }

    /// Where the next forward scan starts, or `None` once terminated.
    fn next_candidate(&self) -> Option<usize> {
        match self.cursor {
            Cursor::Unstarted => Some(0),
            Cursor::At(idx) => Some(idx + 1),
            Cursor::Parked(idx) => Some(idx),
            Cursor::Ended => None,
        }
    }

    fn positioned_at_or_past(&self, target: DocId) -> Option<DocId> {
        match self.cursor {
            Cursor::At(idx) if self.postings[idx].docid >= target => Some(self.postings[idx].docid),
            _ => None,
        }
    }
}

impl PostingList for LeafPostList {
    fn estimate_min(&self) -> DocCount {
        self.postings.len() as DocCount
    }

    fn estimate(&self) -> DocCount {
        self.postings.len() as DocCount
    }

    fn estimate_max(&self) -> DocCount {
        self.postings.len() as DocCount
    }

    fn max_weight(&self) -> Weight {
        self.weighting.max_weight(self.max_wdf)
    }

    fn recalc_max_weight(&mut self) -> Weight {
        let from = match self.cursor {
            Cursor::Unstarted => 0,
            Cursor::At(idx) | Cursor::Parked(idx) => idx,
            Cursor::Ended => self.postings.len(),
        };
        self.max_wdf = self.postings[from..].iter().map(|p| p.wdf).max().unwrap_or(0);
        self.max_weight()
    }

    fn current_docid(&self) -> Result<DocId> {
        Ok(self.current()?.docid)
    }

    fn current_weight(&self) -> Result<Weight> {
        let posting = self.current()?;
        Ok(self.weighting.weight(posting.wdf, posting.doc_length))
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        Ok(self.current()?.doc_length)
    }

    fn current_wdf(&self) -> Result<TermCount> {
        Ok(self.current()?.wdf)
    }

    fn advance(&mut self, min_weight: Weight) -> Result<()> {
        let Some(from) = self.next_candidate() else {
            return Ok(());
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.cursor = Cursor::Ended;
            return Ok(());
        }
        self.seek(from, min_weight);
        Ok(())
    }

    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()> {
        if self.positioned_at_or_past(target).is_some() {
            return Ok(());
        }
        let Some(from) = self.next_candidate() else {
            return Ok(());
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.cursor = Cursor::Ended;
            return Ok(());
        }
        let idx = self.lower_bound(from, target);
        self.seek(idx, min_weight);
        Ok(())
    }

    fn check(&mut self, target: DocId, min_weight: Weight) -> Result<CheckResult> {
        if let Some(docid) = self.positioned_at_or_past(target) {
            if docid != target {
                return Ok(CheckResult::NotMatched);
            }
            if let Cursor::At(idx) = self.cursor {
                if self.weight_at(idx) < min_weight {
                    // Too light for this threshold: park just past it.
                    self.cursor = if idx + 1 < self.postings.len() {
                        Cursor::Parked(idx + 1)
                    } else {
                        Cursor::Ended
                    };
                    return Ok(CheckResult::NotMatched);
                }
            }
            return Ok(CheckResult::Matched);
        }
        let Some(from) = self.next_candidate() else {
            return Ok(CheckResult::NotMatched);
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.cursor = Cursor::Ended;
            return Ok(CheckResult::NotMatched);
        }

        let idx = self.lower_bound(from, target);
        let on_target = idx < self.postings.len() && self.postings[idx].docid == target;
        if on_target && self.weight_at(idx) >= min_weight {
            self.cursor = Cursor::At(idx);
            return Ok(CheckResult::Matched);
        }
        let next = if on_target { idx + 1 } else { idx };
        self.cursor = if next < self.postings.len() {
            Cursor::Parked(next)
        } else {
            Cursor::Ended
        };
        Ok(CheckResult::NotMatched)
    }

    fn at_end(&self) -> bool {
        self.cursor == Cursor::Ended
    }

    fn open_position_list(&self) -> Result<PositionList> {
        Ok(PositionList::new(self.current()?.positions.clone()))
    }

    fn description(&self) -> String {
        format!(
            "LeafPostList({}, {} docs, {})",
            display_term(&self.term),
            self.postings.len(),
            self.weighting.name()
        )
    }
}
