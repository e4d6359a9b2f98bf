//! Scalar types shared by backends, posting lists and documents.

use crate::error::{Result, TesseraError};

/// Identity of a document within one backend. `0` means "no document".
pub type DocId = u32;

/// A count of documents (term frequency, collection size).
pub type DocCount = u32;

/// A count of term occurrences (wdf, collection frequency).
pub type TermCount = u64;

/// Sum of the within-document frequencies of every term in a document.
pub type DocLength = u64;

/// Number of a value slot on a document.
pub type ValueSlot = u32;

/// Position of a term within a document.
pub type TermPos = u32;

/// Contribution of a posting list to a ranking score.
pub type Weight = f64;

/// The reserved "no document" id.
pub const NO_DOCUMENT: DocId = 0;

/// Reject the empty term, which is never a valid posting key.
pub fn validate_term(term: &[u8]) -> Result<()> {
    if term.is_empty() {
        return Err(TesseraError::invalid_argument("empty term name"));
    }
    Ok(())
}

/// Reject the reserved docid.
pub fn validate_docid(did: DocId) -> Result<()> {
    if did == NO_DOCUMENT {
        return Err(TesseraError::invalid_argument("docid 0 is invalid"));
    }
    Ok(())
}

/// Lossy rendering of a term for log lines and descriptions.
pub fn display_term(term: &[u8]) -> String {
    String::from_utf8_lossy(term).into_owned()
}
