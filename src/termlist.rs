//! Term lists: cursors over terms in byte order.
//!
//! Two shapes exist. A [`DocumentTermList`] walks the terms indexed in one
//! document and knows their wdf and positions; an [`AllTermsList`] walks
//! every term in a backend, optionally restricted to a prefix, and only
//! knows collection-level statistics.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::types::{DocCount, DocId, TermCount, TermPos, display_term};

/// Single-pass cursor over terms in ascending byte order.
pub trait TermList: Send + Debug {
    /// Number of terms the list will yield in total.
    fn approx_size(&self) -> usize;

    /// Move to the next term.
    fn advance(&mut self) -> Result<()>;

    /// Move to the first term `>= term`. No-op if already there or past.
    fn skip_to(&mut self, term: &[u8]) -> Result<()>;

    /// Whether the list is exhausted.
    fn at_end(&self) -> bool;

    /// The term the cursor is on.
    fn current_term(&self) -> Result<&[u8]>;

    /// Within-document frequency of the current term.
    fn current_wdf(&self) -> Result<TermCount>;

    /// Number of documents indexed by the current term.
    fn current_term_frequency(&self) -> Result<DocCount>;

    /// Total occurrences of the current term across the collection.
    fn current_collection_frequency(&self) -> Result<TermCount>;

    /// Positions of the current term in the list's document.
    fn open_position_list(&self) -> Result<PositionList>;
}

/// One row of a term list snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermListEntry {
    pub term: Vec<u8>,
    pub wdf: TermCount,
    pub term_frequency: DocCount,
    pub collection_frequency: TermCount,
    pub positions: Vec<TermPos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Unstarted,
    At(usize),
    Ended,
}

/// Sorted entries plus a cursor; shared by both list shapes.
#[derive(Debug)]
struct Entries {
    entries: Vec<TermListEntry>,
    cursor: Cursor,
}

impl Entries {
    fn new(mut entries: Vec<TermListEntry>) -> Self {
        entries.sort_by(|a, b| a.term.cmp(&b.term));
        entries.dedup_by(|a, b| a.term == b.term);
        Entries {
            entries,
            cursor: Cursor::Unstarted,
        }
    }

    fn place(&mut self, idx: usize) {
        self.cursor = if idx < self.entries.len() {
            Cursor::At(idx)
        } else {
            Cursor::Ended
        };
    }

    fn advance(&mut self) {
        match self.cursor {
            Cursor::Unstarted => self.place(0),
            Cursor::At(idx) => self.place(idx + 1),
            Cursor::Ended => {}
        }
    }

    fn skip_to(&mut self, term: &[u8]) {
        let from = match self.cursor {
            Cursor::Unstarted => 0,
            Cursor::At(idx) if self.entries[idx].term.as_slice() >= term => return,
            Cursor::At(idx) => idx,
            Cursor::Ended => return,
        };
        let offset = self.entries[from..].partition_point(|e| e.term.as_slice() < term);
        self.place(from + offset);
    }

    fn current(&self) -> Option<&TermListEntry> {
        match self.cursor {
            Cursor::At(idx) => Some(&self.entries[idx]),
            _ => None,
        }
    }
}

/// Terms of a single document.
#[derive(Debug)]
pub struct DocumentTermList {
    did: DocId,
    entries: Entries,
}

impl DocumentTermList {
    pub fn new(did: DocId, entries: Vec<TermListEntry>) -> Self {
        DocumentTermList {
            did,
            entries: Entries::new(entries),
        }
    }

    /// The document these terms belong to.
    pub fn docid(&self) -> DocId {
        self.did
    }

    fn entry(&self) -> Result<&TermListEntry> {
        self.entries.current().ok_or_else(|| {
            TesseraError::invalid_operation(format!(
                "term list of document {} is not positioned on a term",
                self.did
            ))
        })
    }
}

impl TermList for DocumentTermList {
    fn approx_size(&self) -> usize {
        self.entries.entries.len()
    }

    fn advance(&mut self) -> Result<()> {
        self.entries.advance();
        Ok(())
    }

    fn skip_to(&mut self, term: &[u8]) -> Result<()> {
        self.entries.skip_to(term);
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.entries.cursor == Cursor::Ended
    }

    fn current_term(&self) -> Result<&[u8]> {
        Ok(&self.entry()?.term)
    }

    fn current_wdf(&self) -> Result<TermCount> {
        Ok(self.entry()?.wdf)
    }

    fn current_term_frequency(&self) -> Result<DocCount> {
        Ok(self.entry()?.term_frequency)
    }

    fn current_collection_frequency(&self) -> Result<TermCount> {
        Ok(self.entry()?.collection_frequency)
    }

    fn open_position_list(&self) -> Result<PositionList> {
        let entry = self.entry()?;
        Ok(PositionList::new(entry.positions.clone()))
    }
}

/// Every term of a backend, optionally restricted to a prefix.
#[derive(Debug)]
pub struct AllTermsList {
    prefix: Vec<u8>,
    entries: Entries,
}

impl AllTermsList {
    /// Build the list from `entries`, keeping only terms that start with
    /// `prefix`.
    pub fn new(prefix: &[u8], entries: Vec<TermListEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| e.term.starts_with(prefix))
            .collect();
        AllTermsList {
            prefix: prefix.to_vec(),
            entries: Entries::new(entries),
        }
    }

    fn entry(&self) -> Result<&TermListEntry> {
        self.entries.current().ok_or_else(|| {
            TesseraError::invalid_operation(format!(
                "all-terms list for prefix {} is not positioned on a term",
                display_term(&self.prefix)
            ))
        })
    }
}

impl TermList for AllTermsList {
    fn approx_size(&self) -> usize {
        self.entries.entries.len()
    }

    fn advance(&mut self) -> Result<()> {
        self.entries.advance();
        Ok(())
    }

    fn skip_to(&mut self, term: &[u8]) -> Result<()> {
        // Nothing below the prefix can be in the list.
        let target = if term < self.prefix.as_slice() {
            self.prefix.as_slice()
        } else {
            term
        };
        self.entries.skip_to(target);
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.entries.cursor == Cursor::Ended
    }

    fn current_term(&self) -> Result<&[u8]> {
        Ok(&self.entry()?.term)
    }

    fn current_wdf(&self) -> Result<TermCount> {
        Err(TesseraError::invalid_operation(
            "wdf is not meaningful on an all-terms list",
        ))
    }

    fn current_term_frequency(&self) -> Result<DocCount> {
        Ok(self.entry()?.term_frequency)
    }

    fn current_collection_frequency(&self) -> Result<TermCount> {
        Ok(self.entry()?.collection_frequency)
    }

    fn open_position_list(&self) -> Result<PositionList> {
        Err(TesseraError::invalid_operation(
            "positions are not meaningful on an all-terms list",
        ))
    }
}

/// Drain a term list into its terms.
pub fn collect_terms<T: TermList + ?Sized>(tl: &mut T) -> Result<Vec<Vec<u8>>> {
    let mut terms = Vec::new();
    tl.advance()?;
    while !tl.at_end() {
        terms.push(tl.current_term()?.to_vec());
        tl.advance()?;
    }
    Ok(terms)
}
