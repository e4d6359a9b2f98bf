//! Storage backends.
//!
//! Every backend implements [`Database`]: collection statistics, factories
//! for posting lists, term lists, position lists and document handles, and
//! (for writable backends) the mutation and transaction surface. Callers
//! hold backends as `Arc<dyn Database>` and never need to know which
//! variant they have; the one exception is [`Database::as_remote`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tessera::backend::{Database, inmemory::InMemoryDatabase};
//! use tessera::document::Document;
//! use tessera::postlist::collect_docids;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let db = InMemoryDatabase::new();
//! let mut doc = Document::new();
//! doc.add_term(b"fox", 1)?;
//! db.add_document(&doc)?;
//! db.add_document(&Document::new())?;
//! db.add_document(&doc)?;
//!
//! let db: Arc<dyn Database> = Arc::new(db);
//! let mut pl = db.open_posting_list(b"fox")?;
//! assert_eq!(collect_docids(&mut pl, 0.0)?, vec![1, 3]);
//! assert!(db.open_posting_list(b"wolf")?.at_end());
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentHandle};
use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::postlist::{EmptyPostList, PostingList};
use crate::termlist::TermList;
use crate::types::{DocCount, DocId, DocLength, TermCount, display_term, validate_term};

pub mod disk;
pub mod format;
pub mod inmemory;
pub mod remote;
pub mod revision;
pub mod transaction;

pub use disk::{DiskDatabase, DiskDatabaseConfig};
pub use inmemory::{InMemoryConfig, InMemoryDatabase};
pub use remote::{LoopbackConnection, RemoteConnection, RemoteDatabase, RemoteDatabaseConfig};

/// The storage-backend interface.
pub trait Database: Send + Sync + Debug {
    /// Number of documents.
    fn doc_count(&self) -> Result<DocCount>;

    /// Mean document length, 0 for an empty backend.
    fn average_length(&self) -> Result<f64>;

    /// Length of document `did`.
    fn doc_length(&self, did: DocId) -> Result<DocLength>;

    /// Number of documents indexed by `term`. Never an undercount.
    fn term_frequency(&self, term: &[u8]) -> Result<DocCount>;

    /// Total number of occurrences of `term`.
    fn collection_frequency(&self, term: &[u8]) -> Result<TermCount>;

    /// Whether any document is indexed by `term`.
    fn term_exists(&self, term: &[u8]) -> Result<bool>;

    /// Highest docid ever assigned.
    fn last_docid(&self) -> Result<DocId>;

    /// Posting list of a term known to exist.
    fn open_leaf_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>>;

    /// Posting list of `term`. An absent term yields an empty cursor.
    fn open_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>> {
        validate_term(term)?;
        if !self.term_exists(term)? {
            debug!("term {} not present, using an empty posting list", display_term(term));
            return Ok(Box::new(EmptyPostList::new()));
        }
        self.open_leaf_posting_list(term)
    }

    /// Terms of document `did`.
    fn open_term_list(&self, did: DocId) -> Result<Box<dyn TermList>>;

    /// Every term in the backend.
    fn open_all_terms(&self) -> Result<Box<dyn TermList>> {
        self.open_all_terms_with_prefix(b"")
    }

    /// Every term starting with `prefix`.
    fn open_all_terms_with_prefix(&self, prefix: &[u8]) -> Result<Box<dyn TermList>>;

    /// Positions of `term` in document `did`; empty if the document does not
    /// contain the term.
    fn open_position_list(&self, did: DocId, term: &[u8]) -> Result<PositionList>;

    /// A handle on document `did`. With `lazy` the existence check is
    /// deferred to the first content read.
    fn open_document(&self, did: DocId, lazy: bool) -> Result<DocumentHandle>;

    /// Hint that `did` will be collected soon. Backends with expensive
    /// fetches start fetching here.
    fn request_document(&self, _did: DocId) -> Result<()> {
        Ok(())
    }

    /// Receive a document announced by `request_document`, or fetch it now.
    fn collect_document(&self, did: DocId) -> Result<DocumentHandle> {
        self.open_document(did, false)
    }

    /// A read-only backend frozen at the current revision, for backends
    /// that have revisions.
    fn snapshot(&self) -> Result<Option<Arc<dyn Database>>> {
        Ok(None)
    }

    /// Move to the newest revision. Returns whether anything changed.
    fn reopen(&self) -> Result<bool> {
        Ok(false)
    }

    /// Keep an idle connection from timing out.
    fn keep_alive(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources; every later access fails with
    /// [`TesseraError::Closed`].
    fn close(&self) -> Result<()>;

    fn is_writable(&self) -> bool {
        false
    }

    fn add_document(&self, _document: &Document) -> Result<DocId> {
        Err(read_only("add_document"))
    }

    fn delete_document(&self, _did: DocId) -> Result<()> {
        Err(read_only("delete_document"))
    }

    /// Store `document` at `did`, creating it if it does not exist.
    fn replace_document(&self, _did: DocId, _document: &Document) -> Result<()> {
        Err(read_only("replace_document"))
    }

    fn begin_transaction(&self) -> Result<()> {
        Err(read_only("begin_transaction"))
    }

    fn commit_transaction(&self) -> Result<()> {
        Err(read_only("commit_transaction"))
    }

    fn cancel_transaction(&self) -> Result<()> {
        Err(read_only("cancel_transaction"))
    }

    fn flush(&self) -> Result<()> {
        Err(read_only("flush"))
    }

    fn as_remote(&self) -> Option<&RemoteDatabase> {
        None
    }

    fn is_remote(&self) -> bool {
        self.as_remote().is_some()
    }
}

pub(crate) fn read_only(operation: &str) -> TesseraError {
    TesseraError::unsupported(format!("{operation} on a read-only database"))
}

/// Which backend to open, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DatabaseConfig {
    InMemory(InMemoryConfig),
    Disk(DiskDatabaseConfig),
    Remote(RemoteDatabaseConfig),
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::InMemory(InMemoryConfig::default())
    }
}

impl DatabaseConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Opens backends from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseFactory;

impl DatabaseFactory {
    /// Open a local backend. Remote configs need a transport and go through
    /// [`DatabaseFactory::connect`].
    pub fn open(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
        match config {
            DatabaseConfig::InMemory(config) => Ok(Arc::new(InMemoryDatabase::with_config(config.clone()))),
            DatabaseConfig::Disk(config) => Ok(Arc::new(DiskDatabase::open(config.clone())?)),
            DatabaseConfig::Remote(_) => Err(TesseraError::invalid_argument(
                "remote databases need a connection, use DatabaseFactory::connect",
            )),
        }
    }

    /// Open a remote backend over `connection`.
    pub fn connect(
        config: &DatabaseConfig,
        connection: Arc<dyn RemoteConnection>,
    ) -> Result<Arc<dyn Database>> {
        match config {
            DatabaseConfig::Remote(config) => {
                Ok(Arc::new(RemoteDatabase::new(connection, config.clone())))
            }
            _ => Err(TesseraError::invalid_argument(
                "only remote configs take a connection",
            )),
        }
    }
}
