//! Top-level anonymization orchestration.
//!
//! `anonymize_docx` runs the full structural pipeline: extract the
//! archive, index every XML part, match paragraphs to predictions, patch
//! the XML in place, repackage. `anonymize_txt` is the degraded fallback
//! for non-DOCX inputs: it substitutes placeholders directly into the
//! prediction text and writes a flat text file, with no structural
//! rewrite.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

use crate::alignment_table::{gen_alignment_table, TokenRow};
use crate::docx_zip::{create_docx, unzip_document};
use crate::entities::ParagraphPrediction;
use crate::labels::{merge_consecutive_labels, replace_labels_in_text};
use crate::matching::match_paragraphs_with_predictions;
use crate::text_norm::xml_unescape_angles;
use crate::xml_index::{index_paragraphs, XmlParagraph};
use crate::xml_patch::replace_text_in_xml;

/// Failure taxonomy of the anonymization core.
///
/// A mis-anonymized legal document is a compliance failure, so
/// document-level errors always propagate; best-effort degradation exists
/// only at paragraph-matching granularity (CER fallback) and inside the
/// token aligner's ambiguity heuristic.
#[derive(Debug, Error)]
pub enum AnonymizeError {
    #[error("only `.docx` extension is allowed: {0}")]
    InvalidExtension(PathBuf),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("document has paragraphs but no predictions were supplied")]
    NoPredictions,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Recursively collect `.xml` parts under `dir` as paths relative to the
/// extraction root, sorted for deterministic processing order.
fn find_xml_parts(root: &Path, dir: &Path, parts: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_xml_parts(root, &path, parts)?;
        } else if path.extension().is_some_and(|ext| ext == "xml") {
            let relative = path
                .strip_prefix(root)
                .expect("walk stays under root")
                .to_string_lossy()
                .replace('\\', "/");
            parts.push(relative);
        }
    }
    Ok(())
}

fn index_document(extracted: &Path) -> Result<Vec<XmlParagraph>, AnonymizeError> {
    let mut xml_parts = Vec::new();
    find_xml_parts(extracted, extracted, &mut xml_parts)?;
    xml_parts.sort();

    let mut paragraphs = Vec::new();
    for part in &xml_parts {
        paragraphs.extend(index_paragraphs(extracted, part)?);
    }
    // Paragraphs empty after normalization have nothing to redact
    paragraphs.retain(|p| !p.plain_text.trim().is_empty());
    Ok(paragraphs)
}

/// Anonymize a DOCX document and write the result, with the same base
/// filename, into `output_dir`. Returns the output path.
///
/// The extraction directory is a scoped temporary resource: it is removed
/// on every exit path, success or failure.
pub fn anonymize_docx(
    path: &Path,
    predictions: &[ParagraphPrediction],
    output_dir: &Path,
) -> Result<PathBuf, AnonymizeError> {
    validate_docx_path(path)?;

    let tempdir = TempDir::new()?;
    unzip_document(path, tempdir.path())?;

    let source_paragraphs = index_document(tempdir.path())?;
    log::info!(
        "indexed {} non-empty paragraphs in {}",
        source_paragraphs.len(),
        path.display()
    );

    if !source_paragraphs.is_empty() {
        let matched = match_paragraphs_with_predictions(&source_paragraphs, predictions)?;
        replace_text_in_xml(&matched, tempdir.path())?;
    }

    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(path.file_name().expect("validated file path"));
    create_docx(tempdir.path(), &output_path)?;
    log::info!("anonymized document written to {}", output_path.display());

    Ok(output_path)
}

/// Degraded fallback for non-DOCX inputs: substitute placeholders into
/// each prediction's own text and write the lines as a flat text file.
/// Placeholder tokens are un-escaped back to literal `<CATEGORY>` form —
/// there is no XML around them to protect.
pub fn anonymize_txt(
    path: &Path,
    predictions: &[ParagraphPrediction],
    output_dir: &Path,
) -> Result<PathBuf, AnonymizeError> {
    if !path.exists() {
        return Err(AnonymizeError::FileNotFound(path.to_path_buf()));
    }

    let lines: Vec<String> = predictions
        .iter()
        .map(|prediction| {
            let merged = merge_consecutive_labels(&prediction.document, &prediction.labels);
            xml_unescape_angles(&replace_labels_in_text(&prediction.document, &merged))
        })
        .collect();

    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(path.file_name().expect("existing file has a name"));
    std::fs::write(&output_path, lines.join("\n"))?;

    Ok(output_path)
}

/// Build the full token alignment table for a DOCX without patching it.
/// Debugging aid for inspecting where the aligner placed each label.
pub fn alignment_rows_for_docx(
    path: &Path,
    predictions: &[ParagraphPrediction],
) -> Result<Vec<TokenRow>, AnonymizeError> {
    validate_docx_path(path)?;

    let tempdir = TempDir::new()?;
    unzip_document(path, tempdir.path())?;

    let source_paragraphs = index_document(tempdir.path())?;
    if source_paragraphs.is_empty() {
        return Ok(Vec::new());
    }
    let matched = match_paragraphs_with_predictions(&source_paragraphs, predictions)?;

    Ok(matched.iter().flat_map(|m| gen_alignment_table(m)).collect())
}

fn validate_docx_path(path: &Path) -> Result<(), AnonymizeError> {
    let is_docx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
    if !is_docx {
        return Err(AnonymizeError::InvalidExtension(path.to_path_buf()));
    }
    if !path.exists() {
        return Err(AnonymizeError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}
