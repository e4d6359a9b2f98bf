//! Per-posting weight bounds used by leaf posting lists.
//!
//! These are not relevance formulas: they exist so that leaves report a
//! meaningful `max_weight` and threshold pruning has something to act on.
//! Ranking schemes plug in through the [`Weighting`] trait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{DocLength, TermCount, Weight};

/// Turns a posting's statistics into a weight.
pub trait Weighting: Send + Sync + std::fmt::Debug {
    /// Weight of one posting.
    fn weight(&self, wdf: TermCount, doc_length: DocLength) -> Weight;

    /// Upper bound on [`Weighting::weight`] for postings with wdf at most
    /// `max_wdf`.
    fn max_weight(&self, max_wdf: TermCount) -> Weight;

    /// Short name for descriptions.
    fn name(&self) -> &'static str;
}

/// Every document weighs zero: pure boolean filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolWeight;

impl Weighting for BoolWeight {
    fn weight(&self, _wdf: TermCount, _doc_length: DocLength) -> Weight {
        0.0
    }

    fn max_weight(&self, _max_wdf: TermCount) -> Weight {
        0.0
    }

    fn name(&self) -> &'static str {
        "bool"
    }
}

/// Weight proportional to the within-document frequency.
#[derive(Debug, Clone, Copy)]
pub struct WdfWeight {
    factor: Weight,
}

impl WdfWeight {
    /// Create a wdf weighting; negative factors are clamped to zero.
    pub fn new(factor: Weight) -> Self {
        WdfWeight {
            factor: factor.max(0.0),
        }
    }
}

impl Default for WdfWeight {
    fn default() -> Self {
        WdfWeight::new(1.0)
    }
}

impl Weighting for WdfWeight {
    fn weight(&self, wdf: TermCount, _doc_length: DocLength) -> Weight {
        wdf as Weight * self.factor
    }

    fn max_weight(&self, max_wdf: TermCount) -> Weight {
        max_wdf as Weight * self.factor
    }

    fn name(&self) -> &'static str {
        "wdf"
    }
}

/// Serializable choice of weighting, used by backend configs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum WeightingScheme {
    /// [`BoolWeight`].
    #[default]
    Bool,
    /// [`WdfWeight`] with the given factor.
    Wdf { factor: Weight },
}

impl WeightingScheme {
    /// Build the weighting this scheme describes.
    pub fn build(&self) -> Arc<dyn Weighting> {
        match *self {
            WeightingScheme::Bool => Arc::new(BoolWeight),
            WeightingScheme::Wdf { factor } => Arc::new(WdfWeight::new(factor)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_weight() {
        assert_eq!(BoolWeight.weight(5, 10), 0.0);
        assert_eq!(BoolWeight.max_weight(5), 0.0);
    }

    #[test]
    fn test_wdf_weight_bounds() {
        let w = WdfWeight::new(0.5);
        assert_eq!(w.weight(4, 100), 2.0);
        assert_eq!(w.max_weight(6), 3.0);
        assert!(w.weight(3, 1) <= w.max_weight(3));
        assert_eq!(WdfWeight::new(-1.0).weight(10, 1), 0.0);
    }

    #[test]
    fn test_scheme_from_json() {
        let scheme: WeightingScheme =
            serde_json::from_str(r#"{"scheme":"wdf","factor":2.0}"#).unwrap();
        assert_eq!(scheme, WeightingScheme::Wdf { factor: 2.0 });
        assert_eq!(scheme.build().name(), "wdf");
        assert_eq!(WeightingScheme::default().build().name(), "bool");
    }
}
