//! Posting list of documents whose value in a slot lies in a byte range.
//!
//! There is no index over values, so the cursor walks docids from 1 up to
//! the backend's last docid and loads each document lazily. Documents that
//! vanish between enumeration and lookup are skipped; only real failures
//! propagate.

use std::sync::Arc;

use log::{debug, trace};

use crate::backend::Database;
use crate::error::Result;
use crate::positionlist::PositionList;
use crate::postlist::{CheckResult, PostingList, below_threshold, not_positioned};
use crate::types::{DocCount, DocId, DocLength, TermCount, ValueSlot, Weight, display_term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeState {
    Unstarted,
    Positioned(DocId),
    /// Known not to match at this docid; the scan resumes after it.
    Parked(DocId),
    Terminated,
}

/// Matches documents with `begin <= value(slot) <= end` under byte order.
///
/// An absent slot never matches. A present empty value matches exactly
/// when `begin` is empty.
#[derive(Debug)]
pub struct ValueRangePostList {
    db: Arc<dyn Database>,
    slot: ValueSlot,
    begin: Vec<u8>,
    end: Vec<u8>,
    db_size: DocCount,
    last_docid: DocId,
    state: RangeState,
}

impl ValueRangePostList {
    /// Create a cursor over `db`.
    ///
    /// Backends with revisions are pinned to the revision current at this
    /// point, so a later `reopen` does not change what the cursor yields.
    pub fn new(db: Arc<dyn Database>, slot: ValueSlot, begin: Vec<u8>, end: Vec<u8>) -> Result<Self> {
        let db = db.snapshot()?.unwrap_or(db);
        let db_size = db.doc_count()?;
        let last_docid = db.last_docid()?;

        Ok(ValueRangePostList {
            db,
            slot,
            begin,
            end,
            db_size,
            last_docid,
            state: RangeState::Unstarted,
        })
    }

    fn in_range(&self, value: Option<&[u8]>) -> bool {
        value.is_some_and(|v| v >= self.begin.as_slice() && v <= self.end.as_slice())
    }

    /// Whether `did` exists and matches. A missing document is an ordinary
    /// `false`.
    fn probe(&self, did: DocId) -> Result<bool> {
        let handle = match self.db.open_document(did, true) {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => {
                trace!("value range: docid {did} vanished before lookup");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        match handle.probe()? {
            Some(doc) => Ok(self.in_range(doc.value(self.slot))),
            None => {
                trace!("value range: docid {did} vanished before lookup");
                Ok(false)
            }
        }
    }

    /// Position on the first match strictly after `after`.
    fn scan_after(&mut self, after: DocId) -> Result<()> {
        let mut did = after;
        while did < self.last_docid {
            did += 1;
            if self.probe(did)? {
                self.state = RangeState::Positioned(did);
                return Ok(());
            }
        }
        self.terminate();
        Ok(())
    }

    /// Docid the scan last examined, or `None` once terminated.
    fn scanned_up_to(&self) -> Option<DocId> {
        match self.state {
            RangeState::Unstarted => Some(0),
            RangeState::Positioned(did) | RangeState::Parked(did) => Some(did),
            RangeState::Terminated => None,
        }
    }

    fn terminate(&mut self) {
        if self.state != RangeState::Terminated {
            debug!("{} terminated", self.description());
        }
        self.state = RangeState::Terminated;
    }

    fn current(&self) -> Result<DocId> {
        match self.state {
            RangeState::Positioned(did) => Ok(did),
            _ => Err(not_positioned(&self.description())),
        }
    }
}

impl PostingList for ValueRangePostList {
    fn estimate_min(&self) -> DocCount {
        0
    }

    fn estimate(&self) -> DocCount {
        self.db_size / 2
    }

    fn estimate_max(&self) -> DocCount {
        self.db_size
    }

    fn max_weight(&self) -> Weight {
        0.0
    }

    fn recalc_max_weight(&mut self) -> Weight {
        0.0
    }

    fn current_docid(&self) -> Result<DocId> {
        self.current()
    }

    fn current_weight(&self) -> Result<Weight> {
        self.current()?;
        Ok(0.0)
    }

    fn current_doc_length(&self) -> Result<DocLength> {
        self.db.doc_length(self.current()?)
    }

    fn current_wdf(&self) -> Result<TermCount> {
        self.current()?;
        Ok(0)
    }

    fn advance(&mut self, min_weight: Weight) -> Result<()> {
        let Some(after) = self.scanned_up_to() else {
            return Ok(());
        };
        if below_threshold(self.max_weight(), min_weight) {
            self.terminate();
            return Ok(());
        }
        self.scan_after(after)
    }

    fn skip_to(&mut self, target: DocId, min_weight: Weight) -> Result<()> {
        let Some(after) = self.scanned_up_to() else {
            return Ok(());
        };
        if matches!(self.state, RangeState::Positioned(did) if did >= target) {
            return Ok(());
        }
        if below_threshold(self.max_weight(), min_weight) {
            self.terminate();
            return Ok(());
        }
        self.scan_after(after.max(target.saturating_sub(1)))
    }

    fn check(&mut self, target: DocId, min_weight: Weight) -> Result<CheckResult> {
        let Some(after) = self.scanned_up_to() else {
            return Ok(CheckResult::NotMatched);
        };
        if let RangeState::Positioned(did) = self.state {
            if did >= target {
                return Ok(if did == target {
                    CheckResult::Matched
                } else {
                    CheckResult::NotMatched
                });
            }
        }
        if below_threshold(self.max_weight(), min_weight) || target > self.last_docid {
            self.terminate();
            return Ok(CheckResult::NotMatched);
        }
        if target <= after {
            // Parked beyond the target: nothing at or before it can match.
            return Ok(CheckResult::NotMatched);
        }
        if self.probe(target)? {
            self.state = RangeState::Positioned(target);
            Ok(CheckResult::Matched)
        } else {
            self.state = RangeState::Parked(target);
            Ok(CheckResult::NotMatched)
        }
    }

    fn at_end(&self) -> bool {
        self.state == RangeState::Terminated
    }

    fn open_position_list(&self) -> Result<PositionList> {
        self.current()?;
        Ok(PositionList::empty())
    }

    fn description(&self) -> String {
        format!(
            "ValueRangePostList({}, {}, {})",
            self.slot,
            display_term(&self.begin),
            display_term(&self.end)
        )
    }
}
