//! # Tessera
//!
//! The execution core of a full-text search engine: a storage-backend
//! abstraction and the lazy, weight-pruned posting-list cursors that query
//! operators are built from.
//!
//! ## Features
//!
//! - One `Database` trait over in-memory, on-disk and remote backends
//! - Immutable revision snapshots shared by every open cursor
//! - Posting lists with cardinality and weight bounds, `skip_to` and `check`
//! - AND / OR composition and value-range scans
//! - Pipelined document fetches for remote backends
//! - Transactions on writable backends

pub mod backend;
pub mod document;
pub mod error;
pub mod letor;
pub mod positionlist;
pub mod postlist;
pub mod termlist;
pub mod types;

pub mod prelude {
    pub use crate::backend::{
        Database, DatabaseConfig, DatabaseFactory, DiskDatabase, DiskDatabaseConfig,
        InMemoryConfig, InMemoryDatabase, RemoteDatabase, RemoteDatabaseConfig,
    };
    pub use crate::document::{Document, DocumentHandle};
    pub use crate::error::{Result, TesseraError};
    pub use crate::letor::FeatureVector;
    pub use crate::positionlist::PositionList;
    pub use crate::postlist::{
        AndPostList, CheckResult, EmptyPostList, OrPostList, PostingList, ValueRangePostList,
    };
    pub use crate::termlist::TermList;
    pub use crate::types::{DocCount, DocId, DocLength, TermCount, ValueSlot, Weight};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
