//! Conjunction of two posting lists.
//!
//! The two sides leapfrog: the left side proposes a candidate, the right
//! side is probed with `check` (falling back to `skip_to` when the probe is
//! not definite), and whichever side is behind skips forward to the other.

use crate::error::Result;
use crate::positionlist::PositionList;
use crate::postlist::{CheckResult, PostingList, below_threshold, not_positioned};
use crate::types::{DocCount, DocId, DocLength, TermCount, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AndState {
    Unstarted,
    Positioned(DocId),
    Parked(DocId),
    Terminated,
}

/// Documents matched by both children.
#[derive(Debug)]
pub struct AndPostList {
    left: Box<dyn PostingList>,
    right: Box<dyn PostingList>,
    left_max: Weight,
    right_max: Weight,
    db_size: DocCount,
    state: AndState,
}

impl AndPostList {
    /// Combine two cursors over a collection of `db_size` documents. Put
    /// the more selective cursor on the left.
    pub fn new(left: Box<dyn PostingList>, right: Box<dyn PostingList>, db_size: DocCount) -> Self {
        let left_max = left.max_weight();
        let right_max = right.max_weight();
        AndPostList {
            left,
            right,
            left_max,
            right_max,
            db_size,
            state: AndState::Unstarted,
        }
    }

    fn current(&self) -> Result<DocId> {
        match self.state {
            AndState::Positioned(did) => Ok(did),
            _ => Err(not_positioned(&self.description())),
        }
    }

    /// Leapfrog until both sides agree or one runs out. The left side must
    /// already be positioned or terminated.
    fn find_match(&mut self, min_weight: Weight) -> Result<()> {
        let left_min = min_weight - self.right_max;
        let right_min = min_weight - self.left_max;
        loop {
            if self.left.at_end() {
                self.state = AndState::Terminated;
                return Ok(());
            }
            let candidate = self.left.current_docid()?;
            match self.right.check(candidate, right_min)? {
                CheckResult::Matched => {
                    self.state = AndState::Positioned(candidate);
                    return Ok(());
                }
                CheckResult::NotMatched => {
                    self.right.skip_to(candidate.saturating_add(1), right_min)?
                }
                CheckResult::Unknown => self.right.skip_to(candidate, right_min)?,
            }
            if self.right.at_end() {
                self.state = AndState::Terminated;
                return Ok(());
            }
            let right_did = self.right.current_docid()?;
            if right_did == candidate {
                self.state = AndState::Positioned(candidate);
                return Ok(());
            }
            self.left.skip_to(right_did, left_min)?;
        }
    }

    fn park_or_terminate(&mut self, target: DocId) -> CheckResult {
        self.state = if self.left.at_end() || self.right.at_end() {
            AndState::Terminated
        } else {
            AndState::Parked(target)
        };
        CheckResult::NotMatched
    }
}

impl PostingList for AndPostList {
    fn estimate_min(&self) -> DocCount {
        let sum = self.left.estimate_min() as u64 + self.right.estimate_min() as u64;
        sum.saturating_sub(self.db_size as u64) as DocCount
    }

    fn estimate(&self) -> DocCount {
        let est = if self.db_size == 0 {
            0
        } else {
            let product = self.left.estimate() as f64 * self.right.estimate() as f64;
            (product / self.db_size as f64).round() as DocCount
        };
        est.clamp(self.estimate_min(), self.estimate_max())
    }

    fn estimate_max(&self) -> DocCount {
        self.left.estimate_max().min(self.right.estimate_max())
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
        self.current()?;
        Ok(self.left.current_weight()? + self.right.current_weight()?)
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        self.current()?;
        self.left.current_doc_length()
    }

    fn current_wdf(&self) -> Result<TermCount> {
        self.current()?;
        Ok(self.left.current_wdf()? + self.right.current_wdf()?)
    }

    fn advance(&mut self, min_weight: Weight) -> Result<()> {
        if self.state == AndState::Terminated {
            return Ok(());
        }
        if below_threshold(self.max_weight(), min_weight) {
            self.state = AndState::Terminated;
            return Ok(());
        }
        let left_min = min_weight - self.right_max;
        match self.state {
            AndState::Parked(did) => self.left.skip_to(did.saturating_add(1), left_min)?,
            _ => self.left.advance(left_min)?,
        }
        self.find_match(min_weight)
    }

    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()> {
        let target = match self.state {
            AndState::Terminated => return Ok(()),
            AndState::Positioned(did) if did >= target => return Ok(()),
            AndState::Parked(did) => target.max(did.saturating_add(1)),
            _ => target,
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.state = AndState::Terminated;
            return Ok(());
        }
        self.left.skip_to(target, min_weight - self.right_max)?;
        self.find_match(min_weight)
    }

    fn check(&mut self, target: DocId, min_weight: Weight) -> Result<CheckResult> {
        match self.state {
            AndState::Terminated => return Ok(CheckResult::NotMatched),
            AndState::Positioned(did) if did >= target => {
                return Ok(if did == target {
                    CheckResult::Matched
                } else {
                    CheckResult::NotMatched
                });
            }
            AndState::Parked(did) if did >= target => return Ok(CheckResult::NotMatched),
            _ => {}
        }
        if below_threshold(self.max_weight(), min_weight) {
            self.state = AndState::Terminated;
            return Ok(CheckResult::NotMatched);
        }

        let left_min = min_weight - self.right_max;
        let right_min = min_weight - self.left_max;
        match self.left.check(target, left_min)? {
            CheckResult::Unknown => return Ok(CheckResult::Unknown),
            CheckResult::NotMatched => return Ok(self.park_or_terminate(target)),
            CheckResult::Matched => {}
        }
        let right_matched = match self.right.check(target, right_min)? {
            CheckResult::Matched => true,
            CheckResult::NotMatched => false,
            CheckResult::Unknown => {
                self.right.skip_to(target, right_min)?;
                !self.right.at_end() && self.right.current_docid()? == target
            }
        };
        if right_matched {
            self.state = AndState::Positioned(target);
            Ok(CheckResult::Matched)
        } else {
            Ok(self.park_or_terminate(target))
        }
    }

    fn at_end(&self) -> bool {
        self.state == AndState::Terminated
    }

    fn open_position_list(&self) -> Result<PositionList> {
        self.current()?;
        Ok(PositionList::union([
            self.left.open_position_list()?,
            self.right.open_position_list()?,
        ]))
    }

    fn description(&self) -> String {
        format!(
            "({} AND {})",
            self.left.description(),
            self.right.description()
        )
    }
}
