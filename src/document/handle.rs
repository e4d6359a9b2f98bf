//! Two-phase document handles.
//!
//! Constructing a lazy handle never touches storage. The first content read
//! goes to the [`DocumentSource`], and that is where a missing document is
//! reported. Non-lazy handles do the same load at construction time.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::document::Document;
use crate::error::{Result, TesseraError};
use crate::types::{DocId, ValueSlot, validate_docid};

/// Something that can load a document by id.
///
/// `Ok(None)` means the document does not exist. `Err` is reserved for real
/// failures (I/O, an unreachable remote, a closed database) so that callers
/// can tell "skip and continue" apart from "stop".
pub trait DocumentSource: Send + Sync + std::fmt::Debug {
    /// Load the document with id `did`.
    fn fetch_document(&self, did: DocId) -> Result<Option<Document>>;
}

/// A handle on one document of a backend.
#[derive(Debug)]
pub struct DocumentHandle {
    did: DocId,
    source: Option<Arc<dyn DocumentSource>>,
    loaded: Mutex<Option<Arc<Document>>>,
}

impl DocumentHandle {
    /// A handle that loads on first read.
    pub fn lazy(did: DocId, source: Arc<dyn DocumentSource>) -> Self {
        DocumentHandle {
            did,
            source: Some(source),
            loaded: Mutex::new(None),
        }
    }

    /// A handle whose document is loaded (and checked) immediately.
    pub fn open(did: DocId, source: Arc<dyn DocumentSource>) -> Result<Self> {
        validate_docid(did)?;
        let handle = Self::lazy(did, source);
        handle.document()?;
        Ok(handle)
    }

    /// A handle around a document that has already been fetched.
    pub fn from_document(did: DocId, document: Document) -> Self {
        DocumentHandle {
            did,
            source: None,
            loaded: Mutex::new(Some(Arc::new(document))),
        }
    }

    /// The document id this handle refers to.
    pub fn docid(&self) -> DocId {
        self.did
    }

    /// Whether the content has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }

    /// Load the document if necessary. `Ok(None)` if it does not exist.
    pub fn probe(&self) -> Result<Option<Arc<Document>>> {
        let mut loaded = self.loaded.lock();
        if let Some(doc) = loaded.as_ref() {
            return Ok(Some(Arc::clone(doc)));
        }
        let Some(source) = self.source.as_ref() else {
            return Ok(None);
        };
        if self.did == 0 {
            return Ok(None);
        }
        match source.fetch_document(self.did)? {
            Some(doc) => {
                let doc = Arc::new(doc);
                *loaded = Some(Arc::clone(&doc));
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// The loaded document, or [`TesseraError::DocNotFound`].
    pub fn document(&self) -> Result<Arc<Document>> {
        self.probe()?.ok_or(TesseraError::DocNotFound(self.did))
    }

    /// A copy of the data blob.
    pub fn data(&self) -> Result<Vec<u8>> {
        Ok(self.document()?.data().to_vec())
    }

    /// The value at `slot`, `None` if the slot is absent.
    pub fn value(&self, slot: ValueSlot) -> Result<Option<Vec<u8>>> {
        Ok(self.document()?.value(slot).map(<[u8]>::to_vec))
    }

    /// All present values in slot order.
    pub fn values(&self) -> Result<Vec<(ValueSlot, Vec<u8>)>> {
        Ok(self
            .document()?
            .values()
            .map(|(slot, v)| (slot, v.to_vec()))
            .collect())
    }

    /// The portable byte form of the document.
    pub fn serialise(&self) -> Result<Vec<u8>> {
        self.document()?.serialise()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    impl DocumentSource for CountingSource {
        fn fetch_document(&self, did: DocId) -> Result<Option<Document>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if did == 1 {
                let mut doc = Document::new();
                doc.set_data(b"one".to_vec());
                doc.add_value(0, b"v".to_vec());
                Ok(Some(doc))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn test_lazy_handle_defers_load() {
        let source = Arc::new(CountingSource::default());
        let handle = DocumentHandle::lazy(99, source.clone());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(!handle.is_loaded());

        let err = handle.data().unwrap_err();
        assert!(matches!(err, TesseraError::DocNotFound(99)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_eager_handle_checks_existence() {
        let source = Arc::new(CountingSource::default());
        let err = DocumentHandle::open(2, source.clone()).unwrap_err();
        assert!(err.is_not_found());

        let handle = DocumentHandle::open(1, source.clone()).unwrap();
        assert!(handle.is_loaded());
        assert_eq!(handle.data().unwrap(), b"one");
        assert_eq!(handle.value(0).unwrap(), Some(b"v".to_vec()));
        assert_eq!(handle.value(1).unwrap(), None);
        // cached after the first load
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_probe_reports_absence_without_error() {
        let source = Arc::new(CountingSource::default());
        let handle = DocumentHandle::lazy(5, source);
        assert!(handle.probe().unwrap().is_none());
    }

    #[test]
    fn test_from_document_serialises() {
        let mut doc = Document::new();
        doc.set_data(b"x".to_vec());
        let handle = DocumentHandle::from_document(3, doc.clone());
        let bytes = handle.serialise().unwrap();
        assert_eq!(Document::unserialise(&bytes).unwrap(), doc);
    }
}
