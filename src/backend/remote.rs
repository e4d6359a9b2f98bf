//! Remote backend.
//!
//! [`RemoteDatabase`] speaks to a server through the [`RemoteConnection`]
//! trait; how the calls travel is up to the transport. Documents cross the
//! connection in their serialised byte form. Fetching them is the slow part,
//! so `request_document` starts the fetch on the rayon pool and
//! `collect_document` picks up the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ahash::AHashMap;
use crossbeam_channel::{Receiver, bounded};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::Database;
use crate::document::{Document, DocumentHandle, DocumentSource};
use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::postlist::weight::{Weighting, WeightingScheme};
use crate::postlist::{LeafPostList, Posting, PostingList};
use crate::termlist::{AllTermsList, DocumentTermList, TermList, TermListEntry};
use crate::types::{
    DocCount, DocId, DocLength, TermCount, TermPos, Weight, validate_docid, validate_term,
};

/// Collection-wide statistics reported by a server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemoteStats {
    pub doc_count: DocCount,
    pub last_docid: DocId,
    pub average_length: f64,
}

/// Statistics of one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    pub term_frequency: DocCount,
    pub collection_frequency: TermCount,
}

/// Transport to a database server.
///
/// A server that cannot be reached reports [`TesseraError::Unavailable`].
pub trait RemoteConnection: Send + Sync + std::fmt::Debug {
    fn stats(&self) -> Result<RemoteStats>;

    fn doc_length(&self, did: DocId) -> Result<DocLength>;

    /// `None` if the term does not exist.
    fn term_stats(&self, term: &[u8]) -> Result<Option<TermStats>>;

    fn postings(&self, term: &[u8]) -> Result<Vec<Posting>>;

    fn term_list(&self, did: DocId) -> Result<Vec<TermListEntry>>;

    fn all_terms(&self, prefix: &[u8]) -> Result<Vec<TermListEntry>>;

    fn positions(&self, did: DocId, term: &[u8]) -> Result<Vec<TermPos>>;

    /// The serialised document, `None` if it does not exist.
    fn fetch_document(&self, did: DocId) -> Result<Option<Vec<u8>>>;

    fn keep_alive(&self) -> Result<()>;

    fn reopen(&self) -> Result<bool>;

    /// A connection that keeps answering from the server's current revision
    /// after later reopens. `None` if the server cannot hold a revision.
    fn pin(&self) -> Result<Option<Arc<dyn RemoteConnection>>> {
        Ok(None)
    }
}

/// Configuration for [`RemoteDatabase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteDatabaseConfig {
    /// Upper bound on fetches started by `request_document` and not yet
    /// collected. Requests beyond it are fetched on collect instead.
    pub max_pending_requests: usize,
    /// Weighting used by leaf posting lists.
    pub weighting: WeightingScheme,
}

impl Default for RemoteDatabaseConfig {
    fn default() -> Self {
        RemoteDatabaseConfig {
            max_pending_requests: num_cpus::get() * 4,
            weighting: WeightingScheme::default(),
        }
    }
}

impl RemoteDatabaseConfig {
    pub fn new(max_pending_requests: usize) -> Self {
        RemoteDatabaseConfig {
            max_pending_requests,
            ..Default::default()
        }
    }
}

fn decode_document(did: DocId, bytes: Option<Vec<u8>>) -> Result<Option<Document>> {
    match bytes {
        Some(bytes) => Document::unserialise(&bytes)
            .map(Some)
            .inspect_err(|e| warn!("document {did} arrived undecodable: {e}")),
        None => Ok(None),
    }
}

/// Loads documents for lazy handles handed out by [`RemoteDatabase`].
#[derive(Debug)]
struct RemoteDocumentSource {
    connection: Arc<dyn RemoteConnection>,
}

impl DocumentSource for RemoteDocumentSource {
    fn fetch_document(&self, did: DocId) -> Result<Option<Document>> {
        decode_document(did, self.connection.fetch_document(did)?)
    }
}

type FetchResult = Result<Option<Vec<u8>>>;

/// A read-only backend behind a [`RemoteConnection`].
///
/// Statistics and postings are fetched per call, so two consecutive calls
/// may observe different server revisions. A posting list is stable once
/// opened. `snapshot` pins a revision when the connection supports it.
#[derive(Debug)]
pub struct RemoteDatabase {
    connection: Arc<dyn RemoteConnection>,
    config: RemoteDatabaseConfig,
    weighting: Arc<dyn Weighting>,
    pending: Mutex<AHashMap<DocId, Receiver<FetchResult>>>,
    closed: AtomicBool,
}

impl RemoteDatabase {
    pub fn new(connection: Arc<dyn RemoteConnection>, config: RemoteDatabaseConfig) -> Self {
        RemoteDatabase {
            weighting: config.weighting.build(),
            connection,
            config,
            pending: Mutex::new(AHashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// The transport this backend talks through.
    pub fn connection(&self) -> &Arc<dyn RemoteConnection> {
        &self.connection
    }

    /// Number of fetches requested and not yet collected.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TesseraError::Closed);
        }
        Ok(())
    }

    fn source(&self) -> Arc<dyn DocumentSource> {
        Arc::new(RemoteDocumentSource {
            connection: Arc::clone(&self.connection),
        })
    }
}

impl Database for RemoteDatabase {
    fn doc_count(&self) -> Result<DocCount> {
        self.ensure_open()?;
        Ok(self.connection.stats()?.doc_count)
    }

    fn average_length(&self) -> Result<f64> {
        self.ensure_open()?;
        Ok(self.connection.stats()?.average_length)
    }

    fn doc_length(&self, did: DocId) -> Result<DocLength> {
        self.ensure_open()?;
        validate_docid(did)?;
        self.connection.doc_length(did)
    }

    fn term_frequency(&self, term: &[u8]) -> Result<DocCount> {
        self.ensure_open()?;
        validate_term(term)?;
        Ok(self
            .connection
            .term_stats(term)?
            .map_or(0, |s| s.term_frequency))
    }

    fn collection_frequency(&self, term: &[u8]) -> Result<TermCount> {
        self.ensure_open()?;
        validate_term(term)?;
        Ok(self
            .connection
            .term_stats(term)?
            .map_or(0, |s| s.collection_frequency))
    }

    fn term_exists(&self, term: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        validate_term(term)?;
        Ok(self.connection.term_stats(term)?.is_some())
    }

    fn last_docid(&self) -> Result<DocId> {
        self.ensure_open()?;
        Ok(self.connection.stats()?.last_docid)
    }

    fn open_leaf_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>> {
        self.ensure_open()?;
        validate_term(term)?;
        let postings = self.connection.postings(term)?;
        Ok(Box::new(LeafPostList::new(
            term.to_vec(),
            postings,
            Arc::clone(&self.weighting),
        )))
    }

    fn open_term_list(&self, did: DocId) -> Result<Box<dyn TermList>> {
        self.ensure_open()?;
        validate_docid(did)?;
        Ok(Box::new(DocumentTermList::new(
            did,
            self.connection.term_list(did)?,
        )))
    }

    fn open_all_terms_with_prefix(&self, prefix: &[u8]) -> Result<Box<dyn TermList>> {
        self.ensure_open()?;
        Ok(Box::new(AllTermsList::new(
            prefix,
            self.connection.all_terms(prefix)?,
        )))
    }

    fn open_position_list(&self, did: DocId, term: &[u8]) -> Result<PositionList> {
        self.ensure_open()?;
        validate_docid(did)?;
        validate_term(term)?;
        Ok(PositionList::new(self.connection.positions(did, term)?))
    }

    fn open_document(&self, did: DocId, lazy: bool) -> Result<DocumentHandle> {
        self.ensure_open()?;
        validate_docid(did)?;
        if lazy {
            Ok(DocumentHandle::lazy(did, self.source()))
        } else {
            DocumentHandle::open(did, self.source())
        }
    }

    fn request_document(&self, did: DocId) -> Result<()> {
        self.ensure_open()?;
        validate_docid(did)?;
        let mut pending = self.pending.lock();
        if pending.contains_key(&did) {
            return Ok(());
        }
        if pending.len() >= self.config.max_pending_requests {
            debug!("{} fetches pending, docid {did} will be fetched on collect", pending.len());
            return Ok(());
        }
        let (tx, rx) = bounded(1);
        let connection = Arc::clone(&self.connection);
        rayon::spawn(move || {
            // The receiver may be gone if the database was closed meanwhile.
            let _ = tx.send(connection.fetch_document(did));
        });
        pending.insert(did, rx);
        Ok(())
    }

    fn collect_document(&self, did: DocId) -> Result<DocumentHandle> {
        self.ensure_open()?;
        validate_docid(did)?;
        let requested = self.pending.lock().remove(&did);
        let fetched = match requested {
            Some(rx) => rx.recv().map_err(|_| {
                TesseraError::unavailable(format!("fetch of document {did} was abandoned"))
            })?,
            None => self.connection.fetch_document(did),
        };
        let bytes = fetched.inspect_err(|e| warn!("fetching document {did} failed: {e}"))?;
        match decode_document(did, bytes)? {
            Some(document) => Ok(DocumentHandle::from_document(did, document)),
            None => Err(TesseraError::DocNotFound(did)),
        }
    }

    fn snapshot(&self) -> Result<Option<Arc<dyn Database>>> {
        self.ensure_open()?;
        Ok(self.connection.pin()?.map(|connection| {
            Arc::new(RemoteDatabase::new(connection, self.config.clone())) as Arc<dyn Database>
        }))
    }

    fn reopen(&self) -> Result<bool> {
        self.ensure_open()?;
        self.connection.reopen()
    }

    fn keep_alive(&self) -> Result<()> {
        self.ensure_open()?;
        self.connection.keep_alive()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.pending.lock().clear();
        Ok(())
    }

    fn as_remote(&self) -> Option<&RemoteDatabase> {
        Some(self)
    }
}

/// Serves a local [`Database`] as if it were remote.
///
/// Everything goes through the same serialised forms a network transport
/// would use. The connection can be taken offline to simulate an
/// unreachable server. Pinned connections share the online switch and
/// the counters of the connection they were pinned from.
#[derive(Debug)]
pub struct LoopbackConnection {
    db: Arc<dyn Database>,
    online: Arc<AtomicBool>,
    keep_alives: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
}

impl LoopbackConnection {
    pub fn new(db: Arc<dyn Database>) -> Self {
        LoopbackConnection {
            db,
            online: Arc::new(AtomicBool::new(true)),
            keep_alives: Arc::new(AtomicU64::new(0)),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Number of `keep_alive` calls served.
    pub fn keep_alive_count(&self) -> u64 {
        self.keep_alives.load(Ordering::Acquire)
    }

    /// Number of documents served.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Acquire)
    }

    fn ensure_online(&self) -> Result<()> {
        if !self.online.load(Ordering::Acquire) {
            return Err(TesseraError::unavailable("loopback connection is offline"));
        }
        Ok(())
    }
}

impl RemoteConnection for LoopbackConnection {
    fn stats(&self) -> Result<RemoteStats> {
        self.ensure_online()?;
        Ok(RemoteStats {
            doc_count: self.db.doc_count()?,
            last_docid: self.db.last_docid()?,
            average_length: self.db.average_length()?,
        })
    }

    fn doc_length(&self, did: DocId) -> Result<DocLength> {
        self.ensure_online()?;
        self.db.doc_length(did)
    }

    fn term_stats(&self, term: &[u8]) -> Result<Option<TermStats>> {
        self.ensure_online()?;
        if !self.db.term_exists(term)? {
            return Ok(None);
        }
        Ok(Some(TermStats {
            term_frequency: self.db.term_frequency(term)?,
            collection_frequency: self.db.collection_frequency(term)?,
        }))
    }

    fn postings(&self, term: &[u8]) -> Result<Vec<Posting>> {
        self.ensure_online()?;
        let mut pl = self.db.open_posting_list(term)?;
        let mut postings = Vec::with_capacity(pl.estimate() as usize);
        pl.advance(Weight::NEG_INFINITY)?;
        while !pl.at_end() {
            let positions = pl.open_position_list()?.as_slice().to_vec();
            postings.push(
                Posting::new(pl.current_docid()?, pl.current_wdf()?, pl.current_doc_length()?)
                    .with_positions(positions),
            );
            pl.advance(Weight::NEG_INFINITY)?;
        }
        Ok(postings)
    }

    fn term_list(&self, did: DocId) -> Result<Vec<TermListEntry>> {
        self.ensure_online()?;
        let mut tl = self.db.open_term_list(did)?;
        let mut entries = Vec::with_capacity(tl.approx_size());
        tl.advance()?;
        while !tl.at_end() {
            entries.push(TermListEntry {
                term: tl.current_term()?.to_vec(),
                wdf: tl.current_wdf()?,
                term_frequency: tl.current_term_frequency()?,
                collection_frequency: tl.current_collection_frequency()?,
                positions: tl.open_position_list()?.as_slice().to_vec(),
            });
            tl.advance()?;
        }
        Ok(entries)
    }

    fn all_terms(&self, prefix: &[u8]) -> Result<Vec<TermListEntry>> {
        self.ensure_online()?;
        let mut tl = self.db.open_all_terms_with_prefix(prefix)?;
        let mut entries = Vec::with_capacity(tl.approx_size());
        tl.advance()?;
        while !tl.at_end() {
            entries.push(TermListEntry {
                term: tl.current_term()?.to_vec(),
                wdf: 0,
                term_frequency: tl.current_term_frequency()?,
                collection_frequency: tl.current_collection_frequency()?,
                positions: Vec::new(),
            });
            tl.advance()?;
        }
        Ok(entries)
    }

    fn positions(&self, did: DocId, term: &[u8]) -> Result<Vec<TermPos>> {
        self.ensure_online()?;
        Ok(self.db.open_position_list(did, term)?.as_slice().to_vec())
    }

    fn fetch_document(&self, did: DocId) -> Result<Option<Vec<u8>>> {
        self.ensure_online()?;
        self.fetches.fetch_add(1, Ordering::AcqRel);
        match self.db.open_document(did, false) {
            Ok(handle) => handle.serialise().map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn keep_alive(&self) -> Result<()> {
        self.ensure_online()?;
        self.keep_alives.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn reopen(&self) -> Result<bool> {
        self.ensure_online()?;
        self.db.reopen()
    }

    fn pin(&self) -> Result<Option<Arc<dyn RemoteConnection>>> {
        self.ensure_online()?;
        Ok(self.db.snapshot()?.map(|db| {
            Arc::new(LoopbackConnection {
                db,
                online: Arc::clone(&self.online),
                keep_alives: Arc::clone(&self.keep_alives),
                fetches: Arc::clone(&self.fetches),
            }) as Arc<dyn RemoteConnection>
        }))
    }
}
