//! Court Redaction Toolkit
//!
//! Anonymization core for judicial documents: indexes the text runs of a
//! DOCX with exact byte offsets, matches them against per-paragraph NER
//! predictions, aligns original and placeholder-substituted token streams,
//! and patches the underlying XML in place before repackaging the archive.
//!
//! This library provides:
//! - `xml_index`: byte-offset indexing of DOCX paragraph text runs
//! - `matching`: hash + CER paragraph/prediction matching
//! - `labels`: label span merging and placeholder substitution
//! - `seq_align` / `alignment_table`: token-level sequence alignment
//! - `xml_patch`: descending-offset XML splicing and normalization
//! - `docx_zip`: DOCX container extraction and repackaging
//! - `anonymize`: the orchestrating entry points
//!
//! Binaries:
//! - `doc-anon`: anonymize a document from a predictions JSON file

pub mod alignment_table;
pub mod anonymize;
pub mod docx_zip;
pub mod entities;
pub mod labels;
pub mod matching;
pub mod seq_align;
pub mod text_norm;
pub mod xml_index;
pub mod xml_patch;

pub use anonymize::{alignment_rows_for_docx, anonymize_docx, anonymize_txt, AnonymizeError};
pub use entities::{DocLabel, EntityAttributes, ParagraphPrediction};
