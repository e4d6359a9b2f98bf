//! Single-directory on-disk backend.
//!
//! Each persisted revision is one file (see [`crate::backend::format`]).
//! A writable handle takes the directory's `LOCK` file, applies edits in
//! memory and writes a new revision file on `flush`, on transaction commit
//! and on close. Read-only handles see the revision that was current when
//! they were opened until `reopen` is called.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::format::{self, LOCK_FILE};
use crate::backend::revision::{Revision, RevisionStore, RevisionView};
use crate::backend::transaction::TransactionState;
use crate::backend::{Database, read_only};
use crate::document::{Document, DocumentHandle};
use crate::error::{Result, TesseraError};
use crate::positionlist::PositionList;
use crate::postlist::PostingList;
use crate::postlist::weight::{Weighting, WeightingScheme};
use crate::termlist::TermList;
use crate::types::{DocCount, DocId, DocLength, TermCount, validate_docid};

/// Configuration for [`DiskDatabase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskDatabaseConfig {
    /// Directory holding the revision files.
    pub path: PathBuf,
    /// Open for writing (takes the directory lock).
    pub writable: bool,
    /// Create the directory and an empty revision if none exists.
    pub create_if_missing: bool,
    /// fsync revision files before making them current.
    pub sync_on_flush: bool,
    /// Number of revision files kept after each write.
    pub keep_revisions: usize,
    /// Weighting used by leaf posting lists.
    pub weighting: WeightingScheme,
}

impl Default for DiskDatabaseConfig {
    fn default() -> Self {
        DiskDatabaseConfig {
            path: PathBuf::from("tessera-db"),
            writable: true,
            create_if_missing: true,
            sync_on_flush: true,
            keep_revisions: 2,
            weighting: WeightingScheme::default(),
        }
    }
}

impl DiskDatabaseConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        DiskDatabaseConfig {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }

    pub fn keep_revisions(mut self, keep: usize) -> Self {
        self.keep_revisions = keep;
        self
    }

    pub fn weighting(mut self, weighting: WeightingScheme) -> Self {
        self.weighting = weighting;
        self
    }
}

/// Exclusive writer lock on a database directory, released on drop.
#[derive(Debug)]
struct WriterLock {
    path: PathBuf,
    _file: File,
}

impl WriterLock {
    fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    TesseraError::invalid_operation(format!(
                        "{} is locked by another writer",
                        dir.display()
                    ))
                } else {
                    TesseraError::Io(e)
                }
            })?;
        Ok(WriterLock { path, _file: file })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release {}: {e}", self.path.display());
        }
    }
}

/// A backend stored as revision files in one directory.
#[derive(Debug)]
pub struct DiskDatabase {
    dir: PathBuf,
    config: DiskDatabaseConfig,
    store: Arc<RevisionStore>,
    weighting: Arc<dyn Weighting>,
    transaction: Mutex<TransactionState>,
    /// Number of the revision last written to disk.
    persisted: Mutex<u64>,
    lock: Mutex<Option<WriterLock>>,
}

impl DiskDatabase {
    /// Open (and, if configured, create) the database at `config.path`.
    pub fn open(config: DiskDatabaseConfig) -> Result<Self> {
        let dir = config.path.clone();
        if !dir.exists() {
            if config.writable && config.create_if_missing {
                fs::create_dir_all(&dir)?;
            } else {
                return Err(TesseraError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no database at {}", dir.display()),
                )));
            }
        }

        let lock = if config.writable {
            Some(WriterLock::acquire(&dir)?)
        } else {
            None
        };

        let (revision, persisted) = match format::current_revision_path(&dir)? {
            Some(path) => {
                let revision = format::read_revision_file(&path)?;
                let number = revision.number();
                (revision, number)
            }
            None if config.writable && config.create_if_missing => {
                let revision = Revision::new();
                format::write_revision(&dir, &revision, config.sync_on_flush)?;
                (revision, 0)
            }
            None => {
                return Err(TesseraError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} contains no revision", dir.display()),
                )));
            }
        };
        debug!(
            "opened {} at revision {persisted} ({})",
            dir.display(),
            if config.writable { "writable" } else { "read-only" }
        );

        Ok(DiskDatabase {
            dir,
            weighting: config.weighting.build(),
            config,
            store: Arc::new(RevisionStore::new(revision)),
            transaction: Mutex::new(TransactionState::new()),
            persisted: Mutex::new(persisted),
            lock: Mutex::new(lock),
        })
    }

    /// Open an existing database for reading only.
    pub fn open_readonly<P: Into<PathBuf>>(path: P) -> Result<Self> {
        Self::open(
            DiskDatabaseConfig::new(path)
                .writable(false)
                .create_if_missing(false),
        )
    }

    /// The database directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn view(&self) -> Result<RevisionView> {
        Ok(RevisionView::new(
            self.store.snapshot()?,
            Arc::clone(&self.weighting),
        ))
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if !self.config.writable {
            return Err(read_only(operation));
        }
        Ok(())
    }

    /// Write the current revision if it has not been written yet.
    ///
    /// The revision is taken under the `persisted` lock so a slower flush
    /// can never write an older revision over a newer one.
    fn persist(&self) -> Result<()> {
        let mut persisted = self.persisted.lock();
        let revision = self.store.snapshot()?;
        if revision.number() <= *persisted {
            return Ok(());
        }
        format::write_revision(&self.dir, &revision, self.config.sync_on_flush)?;
        let pruned = format::prune_revisions(&self.dir, self.config.keep_revisions)?;
        *persisted = revision.number();
        debug!(
            "persisted revision {} to {} (pruned {pruned})",
            revision.number(),
            self.dir.display()
        );
        Ok(())
    }
}

impl Database for DiskDatabase {
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

    fn reopen(&self) -> Result<bool> {
        let current = self.store.snapshot()?;
        if self.config.writable {
            return Ok(false);
        }
        let Some(path) = format::current_revision_path(&self.dir)? else {
            return Ok(false);
        };
        let newest = format::read_revision_file(&path)?;
        if newest.number() <= current.number() {
            return Ok(false);
        }
        debug!(
            "reopened {} at revision {} (was {})",
            self.dir.display(),
            newest.number(),
            current.number()
        );
        self.store.replace(Arc::new(newest))?;
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        if self.store.is_closed() {
            return Ok(());
        }
        let result = if self.config.writable && !self.transaction.lock().in_progress() {
            self.persist()
        } else {
            Ok(())
        };
        self.store.close();
        self.lock.lock().take();
        debug!("closed {}", self.dir.display());
        result
    }

    fn is_writable(&self) -> bool {
        self.config.writable
    }

    fn add_document(&self, document: &Document) -> Result<DocId> {
        self.ensure_writable("add_document")?;
        let document = document.clone();
        self.store.edit(|rev| rev.add(document))
    }

    fn delete_document(&self, did: DocId) -> Result<()> {
        self.ensure_writable("delete_document")?;
        validate_docid(did)?;
        self.store.edit(|rev| {
            rev.remove(did).ok_or(TesseraError::DocNotFound(did))?;
            Ok(())
        })
    }

    fn replace_document(&self, did: DocId, document: &Document) -> Result<()> {
        self.ensure_writable("replace_document")?;
        validate_docid(did)?;
        let document = document.clone();
        self.store.edit(|rev| {
            rev.insert(did, document);
            Ok(())
        })
    }

    fn begin_transaction(&self) -> Result<()> {
        self.ensure_writable("begin_transaction")?;
        let mut txn = self.transaction.lock();
        if !txn.in_progress() {
            self.persist()?;
        }
        txn.begin(self.store.snapshot()?)?;
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        self.ensure_writable("commit_transaction")?;
        self.store.snapshot()?;
        self.transaction.lock().commit()?;
        self.persist()
    }

    fn cancel_transaction(&self) -> Result<()> {
        self.ensure_writable("cancel_transaction")?;
        let mut txn = self.transaction.lock();
        self.store.restore(|current| txn.cancel(current))
    }

    fn flush(&self) -> Result<()> {
        self.ensure_writable("flush")?;
        self.store.snapshot()?;
        self.transaction.lock().ensure_idle("flush")?;
        self.persist()
    }
}

impl Drop for DiskDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("error closing {}: {e}", self.dir.display());
        }
    }
}
