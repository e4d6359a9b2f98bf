//! Learning-to-rank feature vectors.
//!
//! A [`FeatureVector`] pairs a document with the feature values a ranker
//! computed for it, plus an optional relevance label (training data) and a
//! score (model output). The text forms are the usual SVMlight-style lines:
//!
//! ```text
//! 1:0.5 2:3 3:0.25
//! <label> 1:0.5 2:3 3:0.25
//! <score> 1:0.5 2:3 3:0.25
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::types::DocId;

/// Features of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub docid: DocId,
    pub label: f64,
    pub score: f64,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(docid: DocId, values: Vec<f64>) -> Self {
        FeatureVector {
            docid,
            values,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: f64) -> Self {
        self.label = label;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn feature_count(&self) -> usize {
        self.values.len()
    }

    /// The `idx`-th feature, counting from 1.
    pub fn feature_value(&self, idx: usize) -> Result<f64> {
        idx.checked_sub(1)
            .and_then(|i| self.values.get(i))
            .copied()
            .ok_or_else(|| {
                TesseraError::invalid_argument(format!(
                    "feature {idx} out of range 1..={}",
                    self.values.len()
                ))
            })
    }

    /// The label followed by the feature values.
    pub fn label_feature_values(&self) -> Vec<f64> {
        std::iter::once(self.label)
            .chain(self.values.iter().copied())
            .collect()
    }

    /// The score followed by the feature values.
    pub fn score_feature_values(&self) -> Vec<f64> {
        std::iter::once(self.score)
            .chain(self.values.iter().copied())
            .collect()
    }

    /// `1:v1 2:v2 ... n:vn`
    pub fn feature_values_text(&self) -> String {
        let mut out = String::new();
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            // Writing to a String cannot fail.
            let _ = write!(out, "{}:{}", i + 1, value);
        }
        out
    }

    /// `<label> 1:v1 ... n:vn`
    pub fn label_feature_values_text(&self) -> String {
        prefixed(self.label, self.feature_values_text())
    }

    /// `<score> 1:v1 ... n:vn`
    pub fn score_feature_values_text(&self) -> String {
        prefixed(self.score, self.feature_values_text())
    }

    /// Parse a `<label> idx:value ...` line. Missing indices read as 0.
    pub fn parse_labelled(docid: DocId, line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let label = fields
            .next()
            .ok_or_else(|| TesseraError::invalid_argument("empty feature line"))?;
        let label = parse_number(label)?;
        let values = parse_features(fields)?;
        Ok(FeatureVector::new(docid, values).with_label(label))
    }

    /// Parse a bare `idx:value ...` line. Missing indices read as 0.
    pub fn parse_features(docid: DocId, line: &str) -> Result<Self> {
        Ok(FeatureVector::new(docid, parse_features(line.split_whitespace())?))
    }
}

fn prefixed(head: f64, features: String) -> String {
    if features.is_empty() {
        head.to_string()
    } else {
        format!("{head} {features}")
    }
}

fn parse_number(s: &str) -> Result<f64> {
    s.parse()
        .map_err(|_| TesseraError::invalid_argument(format!("not a number: {s:?}")))
}

fn parse_features<'a, I: Iterator<Item = &'a str>>(fields: I) -> Result<Vec<f64>> {
    let mut values = Vec::new();
    for field in fields {
        let (idx, value) = field
            .split_once(':')
            .ok_or_else(|| TesseraError::invalid_argument(format!("expected idx:value, got {field:?}")))?;
        let idx: usize = idx
            .parse()
            .ok()
            .filter(|&i| i > 0)
            .ok_or_else(|| TesseraError::invalid_argument(format!("bad feature index {idx:?}")))?;
        if idx > values.len() {
            values.resize(idx, 0.0);
        }
        values[idx - 1] = parse_number(value)?;
    }
    Ok(values)
}
