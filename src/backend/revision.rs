//! Immutable index revisions and the store that publishes them.
//!
//! A [`Revision`] is a complete, self-consistent copy of a backend's
//! contents. Writers edit a private copy and publish it as a new
//! `Arc<Revision>`; every cursor and snapshot view keeps the `Arc` it was
//! opened against, so nothing it reads can change underneath it. Lazy
//! document handles of a live backend are the exception: they read through
//! the [`RevisionStore`] when first loaded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::backend::Database;
use crate::document::{Document, DocumentHandle, DocumentSource};
use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::postlist::weight::Weighting;
use crate::postlist::{LeafPostList, Posting, PostingList};
use crate::termlist::{AllTermsList, DocumentTermList, TermList, TermListEntry};
use crate::types::{DocCount, DocId, DocLength, TermCount, validate_docid, validate_term};

/// Postings of one term inside a revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermPostings {
    /// wdf per document.
    pub postings: BTreeMap<DocId, TermCount>,
    /// Sum of the wdfs.
    pub collection_frequency: TermCount,
}

/// One published state of a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    number: u64,
    documents: BTreeMap<DocId, Document>,
    postings: BTreeMap<Vec<u8>, TermPostings>,
    total_length: u64,
    last_docid: DocId,
}

impl Revision {
    pub fn new() -> Self {
        Revision::default()
    }

    /// Monotonic revision number; bumped on every published edit.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn doc_count(&self) -> DocCount {
        self.documents.len() as DocCount
    }

    /// Highest docid ever assigned, including deleted ones.
    pub fn last_docid(&self) -> DocId {
        self.last_docid
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn average_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.documents.len() as f64
        }
    }

    pub fn document(&self, did: DocId) -> Option<&Document> {
        self.documents.get(&did)
    }

    pub fn contains(&self, did: DocId) -> bool {
        self.documents.contains_key(&did)
    }

    pub fn term_postings(&self, term: &[u8]) -> Option<&TermPostings> {
        self.postings.get(term)
    }

    pub fn term_frequency(&self, term: &[u8]) -> DocCount {
        self.postings
            .get(term)
            .map_or(0, |tp| tp.postings.len() as DocCount)
    }

    pub fn collection_frequency(&self, term: &[u8]) -> TermCount {
        self.postings.get(term).map_or(0, |tp| tp.collection_frequency)
    }

    /// Postings of `term` with document lengths and positions filled in.
    pub fn postings_for(&self, term: &[u8]) -> Vec<Posting> {
        let Some(tp) = self.postings.get(term) else {
            return Vec::new();
        };
        tp.postings
            .iter()
            .map(|(&did, &wdf)| {
                let doc = self.documents.get(&did);
                let doc_length = doc.map_or(0, Document::length);
                let positions = doc
                    .and_then(|d| d.term(term))
                    .map(|e| e.positions.clone())
                    .unwrap_or_default();
                Posting::new(did, wdf, doc_length).with_positions(positions)
            })
            .collect()
    }

    /// Term list rows for document `did`.
    pub fn term_list_entries(&self, did: DocId) -> Option<Vec<TermListEntry>> {
        let doc = self.documents.get(&did)?;
        Some(
            doc.terms()
                .map(|(term, entry)| TermListEntry {
                    term: term.to_vec(),
                    wdf: entry.wdf,
                    term_frequency: self.term_frequency(term),
                    collection_frequency: self.collection_frequency(term),
                    positions: entry.positions.clone(),
                })
                .collect(),
        )
    }

    /// All-terms rows for every term starting with `prefix`.
    pub fn all_term_entries(&self, prefix: &[u8]) -> Vec<TermListEntry> {
        self.postings
            .range(prefix.to_vec()..)
            .take_while(|(term, _)| term.starts_with(prefix))
            .map(|(term, tp)| TermListEntry {
                term: term.clone(),
                wdf: 0,
                term_frequency: tp.postings.len() as DocCount,
                collection_frequency: tp.collection_frequency,
                positions: Vec::new(),
            })
            .collect()
    }

    /// Add `doc` under the next free docid.
    pub(crate) fn add(&mut self, doc: Document) -> Result<DocId> {
        let did = self
            .last_docid
            .checked_add(1)
            .ok_or_else(|| TesseraError::invalid_operation("docid space exhausted"))?;
        self.insert(did, doc);
        Ok(did)
    }

    /// Store `doc` at `did`, replacing whatever was there.
    pub(crate) fn insert(&mut self, did: DocId, doc: Document) {
        self.remove(did);
        for (term, entry) in doc.terms() {
            let tp = self.postings.entry(term.to_vec()).or_default();
            tp.postings.insert(did, entry.wdf);
            tp.collection_frequency += entry.wdf;
        }
        self.total_length += doc.length();
        self.last_docid = self.last_docid.max(did);
        self.documents.insert(did, doc);
    }

    /// Remove document `did`, returning it if it existed.
    pub(crate) fn remove(&mut self, did: DocId) -> Option<Document> {
        let doc = self.documents.remove(&did)?;
        for (term, entry) in doc.terms() {
            if let Some(tp) = self.postings.get_mut(term) {
                tp.postings.remove(&did);
                tp.collection_frequency = tp.collection_frequency.saturating_sub(entry.wdf);
                if tp.postings.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_length = self.total_length.saturating_sub(doc.length());
        Some(doc)
    }

    pub(crate) fn set_number(&mut self, number: u64) {
        self.number = number;
    }

    pub(crate) fn raise_last_docid(&mut self, did: DocId) {
        self.last_docid = self.last_docid.max(did);
    }
}

impl DocumentSource for Revision {
    fn fetch_document(&self, did: DocId) -> Result<Option<Document>> {
        Ok(self.documents.get(&did).cloned())
    }
}

/// The current revision of a backend, swapped atomically on publish.
#[derive(Debug)]
pub struct RevisionStore {
    current: RwLock<Arc<Revision>>,
    closed: AtomicBool,
}

impl RevisionStore {
    pub fn new(revision: Revision) -> Self {
        RevisionStore {
            current: RwLock::new(Arc::new(revision)),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TesseraError::Closed);
        }
        Ok(())
    }

    /// The revision readers should use right now.
    pub fn snapshot(&self) -> Result<Arc<Revision>> {
        self.ensure_open()?;
        Ok(Arc::clone(&self.current.read()))
    }

    /// Apply `edit` and publish the result as a new revision.
    ///
    /// `edit` must check its preconditions before mutating anything; on
    /// error the revision number is left alone.
    ///
    /// The revision is edited in place when nothing else holds it. While a
    /// cursor or snapshot view keeps the current `Arc`, the next edit copies
    /// the whole revision, so bulk loads should not run with long-lived
    /// cursors open.
    pub fn edit<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Revision) -> Result<T>,
    {
        self.ensure_open()?;
        let mut current = self.current.write();
        let revision = Arc::make_mut(&mut *current);
        let out = edit(revision)?;
        revision.number += 1;
        debug!("published revision {}", revision.number);
        Ok(out)
    }

    /// Build a replacement from the current revision and publish it, with
    /// no edit able to land in between.
    pub fn restore<F>(&self, restore: F) -> Result<()>
    where
        F: FnOnce(&Revision) -> Result<Revision>,
    {
        self.ensure_open()?;
        let mut current = self.current.write();
        let restored = restore(&current)?;
        debug!("restored revision {}", restored.number);
        *current = Arc::new(restored);
        Ok(())
    }

    /// Open a handle on document `did` that loads from whichever revision
    /// is current when it is first read.
    pub fn open_document(self: &Arc<Self>, did: DocId, lazy: bool) -> Result<DocumentHandle> {
        self.ensure_open()?;
        validate_docid(did)?;
        let source: Arc<dyn DocumentSource> = self.clone();
        if lazy {
            Ok(DocumentHandle::lazy(did, source))
        } else {
            DocumentHandle::open(did, source)
        }
    }

    /// Publish `revision` as is, e.g. after loading a newer one from disk.
    pub fn replace(&self, revision: Arc<Revision>) -> Result<()> {
        self.ensure_open()?;
        debug!("switched to revision {}", revision.number);
        *self.current.write() = revision;
        Ok(())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Reads through to whatever revision is current at load time, so lazy
/// handles see deletes made after they were opened.
impl DocumentSource for RevisionStore {
    fn fetch_document(&self, did: DocId) -> Result<Option<Document>> {
        self.snapshot()?.fetch_document(did)
    }
}

/// Read-only [`Database`] over one revision.
///
/// This is what `snapshot()` hands out, and what the writable backends
/// delegate their reads to.
#[derive(Debug, Clone)]
pub struct RevisionView {
    revision: Arc<Revision>,
    weighting: Arc<dyn Weighting>,
}

impl RevisionView {
    pub fn new(revision: Arc<Revision>, weighting: Arc<dyn Weighting>) -> Self {
        RevisionView { revision, weighting }
    }

    pub fn revision(&self) -> &Arc<Revision> {
        &self.revision
    }
}

impl Database for RevisionView {
    fn doc_count(&self) -> Result<DocCount> {
        Ok(self.revision.doc_count())
    }

    fn average_length(&self) -> Result<f64> {
        Ok(self.revision.average_length())
    }

    fn doc_length(&self, did: DocId) -> Result<DocLength> {
        validate_docid(did)?;
        self.revision
            .document(did)
            .map(Document::length)
            .ok_or(TesseraError::DocNotFound(did))
    }

    fn term_frequency(&self, term: &[u8]) -> Result<DocCount> {
        validate_term(term)?;
        Ok(self.revision.term_frequency(term))
    }

    fn collection_frequency(&self, term: &[u8]) -> Result<TermCount> {
        validate_term(term)?;
        Ok(self.revision.collection_frequency(term))
    }

    fn term_exists(&self, term: &[u8]) -> Result<bool> {
        validate_term(term)?;
        Ok(self.revision.term_postings(term).is_some())
    }

    fn last_docid(&self) -> Result<DocId> {
        Ok(self.revision.last_docid())
    }

    fn open_leaf_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>> {
        validate_term(term)?;
        Ok(Box::new(LeafPostList::new(
            term.to_vec(),
            self.revision.postings_for(term),
            Arc::clone(&self.weighting),
        )))
    }

    fn open_term_list(&self, did: DocId) -> Result<Box<dyn TermList>> {
        validate_docid(did)?;
        let entries = self
            .revision
            .term_list_entries(did)
            .ok_or(TesseraError::DocNotFound(did))?;
        Ok(Box::new(DocumentTermList::new(did, entries)))
    }

    fn open_all_terms_with_prefix(&self, prefix: &[u8]) -> Result<Box<dyn TermList>> {
        Ok(Box::new(AllTermsList::new(
            prefix,
            self.revision.all_term_entries(prefix),
        )))
    }

    fn open_position_list(&self, did: DocId, term: &[u8]) -> Result<PositionList> {
        validate_docid(did)?;
        validate_term(term)?;
        let doc = self
            .revision
            .document(did)
            .ok_or(TesseraError::DocNotFound(did))?;
        Ok(doc
            .term(term)
            .map(|e| PositionList::new(e.positions.clone()))
            .unwrap_or_default())
    }

    fn open_document(&self, did: DocId, lazy: bool) -> Result<DocumentHandle> {
        validate_docid(did)?;
        let source: Arc<dyn DocumentSource> = self.revision.clone();
        if lazy {
            Ok(DocumentHandle::lazy(did, source))
        } else {
            DocumentHandle::open(did, source)
        }
    }

    fn snapshot(&self) -> Result<Option<Arc<dyn Database>>> {
        Ok(Some(Arc::new(self.clone())))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
