//! Prediction contract consumed from the NER layer.
//!
//! The model service emits one record per paragraph: the normalized
//! paragraph text it ran over, plus the labeled PII spans it found.
//! These types are read-only inputs to the anonymization core; the wire
//! field names of the attribute block are preserved via serde renames.

use serde::{Deserialize, Serialize};

/// Attributes attached to a labeled span by the prediction service.
///
/// `alt_*` fields carry an alternative surface form for the span (e.g. a
/// normalized date string standing in for the literal matched text) and,
/// when present, take precedence over the primary span fields during
/// label merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAttributes {
    /// Entity category, uppercase (e.g. "PER", "DNI", "DIRECCION").
    #[serde(rename = "aymurai_label")]
    pub label: String,

    /// Optional subcategory refinement of the label.
    #[serde(rename = "aymurai_label_subclass", default)]
    pub label_subclass: Option<Vec<String>>,

    /// Alternative surface form for the span.
    #[serde(rename = "aymurai_alt_text", default)]
    pub alt_text: Option<String>,

    /// Start character of the alternative span within the full text.
    #[serde(rename = "aymurai_alt_start_char", default)]
    pub alt_start_char: Option<usize>,

    /// Last character of the alternative span within the full text.
    #[serde(rename = "aymurai_alt_end_char", default)]
    pub alt_end_char: Option<usize>,

    /// Method that produced the prediction (model name, regex rule, ...).
    #[serde(rename = "aymurai_method", default)]
    pub method: Option<String>,

    /// Confidence score reported by the predictor.
    #[serde(rename = "aymurai_score", default)]
    pub score: Option<f64>,
}

/// One labeled PII span within a prediction's `document` text.
///
/// `start_char`/`end_char` are character offsets into the prediction's own
/// (normalized) document string, not into the raw XML. The merge routine
/// treats `end_char` as inclusive when re-slicing span text; the
/// substitution routine treats it as exclusive in its splice arithmetic.
/// Both conventions are observed upstream and reproduced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocLabel {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
    pub attrs: EntityAttributes,
}

impl DocLabel {
    /// Span text, preferring the alternative form when present.
    pub fn effective_text(&self) -> &str {
        self.attrs.alt_text.as_deref().unwrap_or(&self.text)
    }

    /// Span start, preferring the alternative span when present.
    pub fn effective_start(&self) -> usize {
        self.attrs.alt_start_char.unwrap_or(self.start_char)
    }

    /// Span end, preferring the alternative span when present.
    pub fn effective_end(&self) -> usize {
        self.attrs.alt_end_char.unwrap_or(self.end_char)
    }
}

/// A per-paragraph prediction: the text the NER model saw and the labeled
/// spans it produced over that text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParagraphPrediction {
    pub document: String,
    #[serde(default)]
    pub labels: Vec<DocLabel>,
}

impl ParagraphPrediction {
    pub fn new(document: impl Into<String>, labels: Vec<DocLabel>) -> Self {
        Self {
            document: document.into(),
            labels,
        }
    }
}
