//! Documents and document handles.
//!
//! A [`document::Document`] is the plain record stored by a backend: an
//! opaque data blob, numbered value slots and the terms (with wdf and
//! positions) it is indexed by. It also defines the serialised byte form
//! used whenever a document crosses a process boundary.
//!
//! A [`handle::DocumentHandle`] is what backends hand out from
//! `open_document`. Handles opened in lazy mode do not touch storage until
//! their content is first read, and report a missing document at that point.
//!
//! # Examples
//!
//! ```
//! use tessera::document::Document;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let mut doc = Document::new();
//! doc.set_data(b"hello world".to_vec());
//! doc.add_posting(b"hello", 1, 1)?;
//! doc.add_posting(b"world", 2, 1)?;
//! doc.add_value(3, b"150".to_vec());
//!
//! assert_eq!(doc.length(), 2);
//! assert_eq!(doc.value(3), Some(&b"150"[..]));
//!
//! let bytes = doc.serialise()?;
//! assert_eq!(Document::unserialise(&bytes)?, doc);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod handle;

pub use document::{Document, TermEntry};
pub use handle::{DocumentHandle, DocumentSource};
