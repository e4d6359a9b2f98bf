//! Document record: data blob, value slots and indexed terms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::types::{DocLength, TermCount, TermPos, ValueSlot, display_term, validate_term};

/// Within-document information for one term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    /// Within-document frequency.
    pub wdf: TermCount,
    /// Sorted, de-duplicated positions.
    pub positions: Vec<TermPos>,
}

/// A document as stored by a backend.
///
/// Value slots keep an explicit presence bit: a slot set to the empty
/// string is present, a slot never set (or removed) is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    data: Vec<u8>,
    values: BTreeMap<ValueSlot, Vec<u8>>,
    terms: BTreeMap<Vec<u8>, TermEntry>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Document::default()
    }

    /// The opaque data blob.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the data blob.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// The value stored at `slot`, or `None` if the slot is absent.
    pub fn value(&self, slot: ValueSlot) -> Option<&[u8]> {
        self.values.get(&slot).map(Vec::as_slice)
    }

    /// The value at `slot`, with absence collapsed to the empty string.
    pub fn value_or_empty(&self, slot: ValueSlot) -> &[u8] {
        self.value(slot).unwrap_or_default()
    }

    /// Set the value at `slot`. An empty value is stored as present.
    pub fn add_value(&mut self, slot: ValueSlot, value: Vec<u8>) {
        self.values.insert(slot, value);
    }

    /// Remove any value at `slot`.
    pub fn remove_value(&mut self, slot: ValueSlot) {
        self.values.remove(&slot);
    }

    /// Remove every value.
    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Iterate over `(slot, value)` pairs in slot order.
    pub fn values(&self) -> impl Iterator<Item = (ValueSlot, &[u8])> {
        self.values.iter().map(|(slot, v)| (*slot, v.as_slice()))
    }

    /// Number of present value slots.
    pub fn values_count(&self) -> usize {
        self.values.len()
    }

    /// Index the document by `term`, raising its wdf by `wdf_inc`.
    pub fn add_term(&mut self, term: &[u8], wdf_inc: TermCount) -> Result<()> {
        validate_term(term)?;
        let entry = self.terms.entry(term.to_vec()).or_default();
        entry.wdf += wdf_inc;
        Ok(())
    }

    /// Index the document by `term` without affecting its length.
    pub fn add_boolean_term(&mut self, term: &[u8]) -> Result<()> {
        self.add_term(term, 0)
    }

    /// Record an occurrence of `term` at `pos`, raising its wdf by `wdf_inc`.
    pub fn add_posting(&mut self, term: &[u8], pos: TermPos, wdf_inc: TermCount) -> Result<()> {
        validate_term(term)?;
        let entry = self.terms.entry(term.to_vec()).or_default();
        entry.wdf += wdf_inc;
        if let Err(idx) = entry.positions.binary_search(&pos) {
            entry.positions.insert(idx, pos);
        }
        Ok(())
    }

    /// Remove the occurrence of `term` at `pos`, lowering its wdf by
    /// `wdf_dec` (saturating at zero).
    pub fn remove_posting(&mut self, term: &[u8], pos: TermPos, wdf_dec: TermCount) -> Result<()> {
        validate_term(term)?;
        let entry = self.terms.get_mut(term).ok_or_else(|| {
            TesseraError::invalid_argument(format!(
                "term '{}' is not in the document",
                display_term(term)
            ))
        })?;
        let idx = entry.positions.binary_search(&pos).map_err(|_| {
            TesseraError::invalid_argument(format!(
                "term '{}' has no posting at position {pos}",
                display_term(term)
            ))
        })?;
        entry.positions.remove(idx);
        entry.wdf = entry.wdf.saturating_sub(wdf_dec);
        Ok(())
    }

    /// Remove `term` and all its positions.
    pub fn remove_term(&mut self, term: &[u8]) -> Result<()> {
        validate_term(term)?;
        match self.terms.remove(term) {
            Some(_) => Ok(()),
            None => Err(TesseraError::invalid_argument(format!(
                "term '{}' is not in the document",
                display_term(term)
            ))),
        }
    }

    /// Remove every term.
    pub fn clear_terms(&mut self) {
        self.terms.clear();
    }

    /// Within-document information for `term`.
    pub fn term(&self, term: &[u8]) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    /// Iterate over the terms in byte order.
    pub fn terms(&self) -> impl Iterator<Item = (&[u8], &TermEntry)> {
        self.terms.iter().map(|(t, e)| (t.as_slice(), e))
    }

    /// Number of distinct terms.
    pub fn termlist_count(&self) -> usize {
        self.terms.len()
    }

    /// Document length: the sum of wdf over all terms.
    pub fn length(&self) -> DocLength {
        self.terms.values().map(|e| e.wdf).sum()
    }

    /// Encode the document into its portable byte form.
    pub fn serialise(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a document produced by [`Document::serialise`].
    pub fn unserialise(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
