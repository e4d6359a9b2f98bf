//! Disjunction of two posting lists.

use crate::error::Result;
use crate::positionlist::PositionList;
use crate::postlist::{CheckResult, PostingList, below_threshold, not_positioned};
use crate::types::{DocCount, DocId, DocLength, TermCount, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrState {
    Unstarted,
    Positioned(DocId),
    Terminated,
}

/// Documents matched by either child.
///
/// `check` only answers for docids at or behind the current position;
/// anything further ahead would need both branches repositioned, so it
/// reports [`CheckResult::Unknown`].
#[derive(Debug)]
pub struct OrPostList {
    left: Box<dyn PostingList>,
    right: Box<dyn PostingList>,
    left_max: Weight,
    right_max: Weight,
    db_size: DocCount,
    state: OrState,
}

impl OrPostList {
    /// Combine two cursors over a collection of `db_size` documents.
    pub fn new(left: Box<dyn PostingList>, right: Box<dyn PostingList>, db_size: DocCount) -> Self {
        let left_max = left.max_weight();
        let right_max = right.max_weight();
        OrPostList {
            left,
            right,
            left_max,
            right_max,
            db_size,
            state: OrState::Unstarted,
        }
    }

    fn head(pl: &dyn PostingList) -> Result<Option<DocId>> {
        if pl.at_end() {
            Ok(None)
        } else {
            pl.current_docid().map(Some)
        }
    }

    /// Recompute the position from the children's heads.
    fn settle(&mut self) -> Result<()> {
        self.state = match (Self::head(&*self.left)?, Self::head(&*self.right)?) {
            (None, None) => OrState::Terminated,
            (Some(l), None) => OrState::Positioned(l),
            (None, Some(r)) => OrState::Positioned(r),
            (Some(l), Some(r)) => OrState::Positioned(l.min(r)),
        };
        Ok(())
    }

    fn current(&self) -> Result<DocId> {
        match self.state {
            OrState::Positioned(did) => Ok(did),
            _ => Err(not_positioned(&self.description())),
        }
    }

    /// The children positioned on the current docid.
    fn contributors(&self) -> Result<Vec<&dyn PostingList>> {
        let did = self.current()?;
        let mut out = Vec::with_capacity(2);
        for child in [&*self.left, &*self.right] {
            if Self::head(child)? == Some(did) {
                out.push(child);
            }
        }
        Ok(out)
    }
}

impl PostingList for OrPostList {
    fn estimate_min(&self) -> DocCount {
        self.left.estimate_min().max(self.right.estimate_min())
    }

    fn estimate(&self) -> DocCount {
        let l = self.left.estimate() as f64;
        let r = self.right.estimate() as f64;
        let est = if self.db_size == 0 {
            l + r
        } else {
            l + r - l * r / self.db_size as f64
        };
        (est.round() as DocCount).clamp(self.estimate_min(), self.estimate_max())
    }

    fn estimate_max(&self) -> DocCount {
        let sum = self.left.estimate_max().saturating_add(self.right.estimate_max());
        sum.min(self.db_size).max(self.estimate_min())
    }

    fn max_weight(&self) -> Weight {
        self.left_max + self.right_max
    }

    fn recalc_max_weight(&mut self) -> Weight {
        self.left_max = self.left.recalc_max_weight();
        self.right_max = self.right.recalc_max_weight();
        self.max_weight()
    }

    fn current_docid(&self) -> Result<DocId> {
        self.current()
    }

    fn current_weight(&self) -> Result<Weight> {
        let mut total = 0.0;
        for child in self.contributors()? {
            total += child.current_weight()?;
        }
        Ok(total)
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        match self.contributors()?.first() {
            Some(child) => child.current_doc_length(),
            None => Err(not_positioned(&self.description())),
        }
    }

    fn current_wdf(&self) -> Result<TermCount> {
        let mut total = 0;
        for child in self.contributors()? {
            total += child.current_wdf()?;
        }
        Ok(total)
    }

    fn advance(&mut self, min_weight: Weight) -> Result<()> {
        let current = match self.state {
            OrState::Terminated => return Ok(()),
            OrState::Unstarted => None,
            OrState::Positioned(did) => Some(did),
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.state = OrState::Terminated;
            return Ok(());
        }
        let left_min = min_weight - self.right_max;
        let right_min = min_weight - self.left_max;
        match current {
            None => {
                self.left.advance(left_min)?;
                self.right.advance(right_min)?;
            }
            Some(did) => {
                if Self::head(&*self.left)? == Some(did) {
                    self.left.advance(left_min)?;
                }
                if Self::head(&*self.right)? == Some(did) {
                    self.right.advance(right_min)?;
                }
            }
        }
        self.settle()
    }

    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()> {
        match self.state {
            OrState::Terminated => return Ok(()),
            OrState::Positioned(did) if did >= target => return Ok(()),
            _ => {}
        }
        if below_threshold(self.max_weight(), min_weight) {
            self.state = OrState::Terminated;
            return Ok(());
        }
        self.left.skip_to(target, min_weight - self.right_max)?;
        self.right.skip_to(target, min_weight - self.left_max)?;
        self.settle()
    }

    fn check(&mut self, target: DocId, _min_weight: Weight) -> Result<CheckResult> {
        match self.state {
            OrState::Terminated => Ok(CheckResult::NotMatched),
            OrState::Positioned(did) if did == target => Ok(CheckResult::Matched),
            OrState::Positioned(did) if did > target => Ok(CheckResult::NotMatched),
            _ => Ok(CheckResult::Unknown),
        }
    }

    fn at_end(&self) -> bool {
        self.state == OrState::Terminated
    }

    fn open_position_list(&self) -> Result<PositionList> {
        let mut lists = Vec::with_capacity(2);
        for child in self.contributors()? {
            lists.push(child.open_position_list()?);
        }
        Ok(PositionList::union(lists))
    }

    fn description(&self) -> String {
        format!(
            "({} OR {})",
            self.left.description(),
            self.right.description()
        )
    }
}
