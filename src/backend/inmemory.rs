//! In-memory backend.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::Database;
use crate::backend::revision::{Revision, RevisionStore, RevisionView};
use crate::backend::transaction::TransactionState;
use crate::document::{Document, DocumentHandle};
use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::postlist::PostingList;
use crate::postlist::weight::{Weighting, WeightingScheme};
use crate::termlist::TermList;
use crate::types::{DocCount, DocId, DocLength, TermCount, validate_docid};

/// Configuration for [`InMemoryDatabase`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Weighting used by leaf posting lists.
    pub weighting: WeightingScheme,
}

impl InMemoryConfig {
    pub fn new(weighting: WeightingScheme) -> Self {
        InMemoryConfig { weighting }
    }
}

/// A writable backend held entirely in memory.
///
/// Every mutation publishes a new revision immediately; `flush` has nothing
/// to persist.
#[derive(Debug)]
pub struct InMemoryDatabase {
    store: Arc<RevisionStore>,
    weighting: Arc<dyn Weighting>,
    transaction: Mutex<TransactionState>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::with_config(InMemoryConfig::default())
    }

    pub fn with_config(config: InMemoryConfig) -> Self {
        InMemoryDatabase {
            store: Arc::new(RevisionStore::new(Revision::new())),
            weighting: config.weighting.build(),
            transaction: Mutex::new(TransactionState::new()),
        }
    }

    fn view(&self) -> Result<RevisionView> {
        Ok(RevisionView::new(
            self.store.snapshot()?,
            Arc::clone(&self.weighting),
        ))
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for InMemoryDatabase {
    fn doc_count(&self) -> Result<DocCount> {
        self.view()?.doc_count()
    }

    fn average_length(&self) -> Result<f64> {
        self.view()?.average_length()
    }

    fn doc_length(&self, did: DocId) -> Result<DocLength> {
        self.view()?.doc_length(did)
    }

    fn term_frequency(&self, term: &[u8]) -> Result<DocCount> {
        self.view()?.term_frequency(term)
    }

    fn collection_frequency(&self, term: &[u8]) -> Result<TermCount> {
        self.view()?.collection_frequency(term)
    }

    fn term_exists(&self, term: &[u8]) -> Result<bool> {
        self.view()?.term_exists(term)
    }

    fn last_docid(&self) -> Result<DocId> {
        self.view()?.last_docid()
    }

    fn open_leaf_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>> {
        self.view()?.open_leaf_posting_list(term)
    }

    fn open_term_list(&self, did: DocId) -> Result<Box<dyn TermList>> {
        self.view()?.open_term_list(did)
    }

    fn open_all_terms_with_prefix(&self, prefix: &[u8]) -> Result<Box<dyn TermList>> {
        self.view()?.open_all_terms_with_prefix(prefix)
    }

    fn open_position_list(&self, did: DocId, term: &[u8]) -> Result<PositionList> {
        self.view()?.open_position_list(did, term)
    }

    fn open_document(&self, did: DocId, lazy: bool) -> Result<DocumentHandle> {
        self.store.open_document(did, lazy)
    }

    fn snapshot(&self) -> Result<Option<Arc<dyn Database>>> {
        Ok(Some(Arc::new(self.view()?)))
    }

    fn close(&self) -> Result<()> {
        self.store.close();
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn add_document(&self, document: &Document) -> Result<DocId> {
        let document = document.clone();
        self.store.edit(|rev| rev.add(document))
    }

    fn delete_document(&self, did: DocId) -> Result<()> {
        validate_docid(did)?;
        self.store.edit(|rev| {
            rev.remove(did).ok_or(TesseraError::DocNotFound(did))?;
            Ok(())
        })
    }

    fn replace_document(&self, did: DocId, document: &Document) -> Result<()> {
        validate_docid(did)?;
        let document = document.clone();
        self.store.edit(|rev| {
            rev.insert(did, document);
            Ok(())
        })
    }

    fn begin_transaction(&self) -> Result<()> {
        let mut txn = self.transaction.lock();
        txn.begin(self.store.snapshot()?)?;
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        self.store.snapshot()?;
        self.transaction.lock().commit()?;
        Ok(())
    }

    fn cancel_transaction(&self) -> Result<()> {
        let mut txn = self.transaction.lock();
        self.store.restore(|current| txn.cancel(current))
    }

    fn flush(&self) -> Result<()> {
        self.store.snapshot()?;
        self.transaction.lock().ensure_idle("flush")
    }
}
