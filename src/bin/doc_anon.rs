//! Anonymize a judicial document by replacing PII spans with category
//! tokens, preserving the document's structure outside the substituted
//! spans.
//!
//! Usage:
//!   doc-anon --input resolucion.docx --predictions preds.json \
//!     [--output-dir out] [--dump-alignment table.csv]
//!
//! Predictions are a JSON array of per-paragraph records:
//!   [{"document": "...", "labels": [{"text": "...", "start_char": 0,
//!     "end_char": 10, "attrs": {"aymurai_label": "PER"}}]}, ...]
//!
//! A `.docx` input goes through the full structural pipeline; any other
//! extension falls back to a flat anonymized text file built from the
//! prediction texts themselves.

use anyhow::{Context, Result};
use clap::Parser;
use court_redaction_toolkit::anonymize::{
    alignment_rows_for_docx, anonymize_docx, anonymize_txt,
};
use court_redaction_toolkit::entities::ParagraphPrediction;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "doc-anon", about = "Anonymize a judicial document from NER predictions")]
struct Cli {
    /// Input document (.docx for the structural pipeline, anything else
    /// for the flat-text fallback)
    #[arg(long)]
    input: PathBuf,

    /// Predictions JSON file (array of {document, labels})
    #[arg(long)]
    predictions: PathBuf,

    /// Output directory (the anonymized file keeps its original name)
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the token alignment table as CSV (DOCX inputs only)
    #[arg(long)]
    dump_alignment: Option<PathBuf>,
}

fn load_predictions(path: &Path) -> Result<Vec<ParagraphPrediction>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read predictions: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse predictions JSON: {}", path.display()))
}

/// Write the alignment table as CSV, one row per source token.
fn dump_alignment_csv(
    input: &Path,
    predictions: &[ParagraphPrediction],
    csv_path: &Path,
) -> Result<()> {
    let rows = alignment_rows_for_docx(input, predictions)?;

    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV: {}", csv_path.display()))?;
    writer.write_record([
        "xml_file",
        "paragraph_index",
        "fragment_index",
        "token_index",
        "token",
        "start_char",
        "end_char",
        "target",
    ])?;
    for row in &rows {
        writer.write_record(&[
            row.xml_file.clone(),
            row.paragraph_index.to_string(),
            row.fragment_index.to_string(),
            row.token_index.to_string(),
            row.token.clone(),
            row.start_char.to_string(),
            row.end_char.to_string(),
            row.target.clone(),
        ])?;
    }
    writer.flush()?;
    println!("Alignment table ({} rows) written to {}", rows.len(), csv_path.display());
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let predictions = load_predictions(&cli.predictions)?;
    println!(
        "Loaded {} paragraph predictions from {}",
        predictions.len(),
        cli.predictions.display()
    );

    let is_docx = cli
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));

    let output = if is_docx {
        if let Some(ref csv_path) = cli.dump_alignment {
            dump_alignment_csv(&cli.input, &predictions, csv_path)?;
        }
        anonymize_docx(&cli.input, &predictions, &cli.output_dir)?
    } else {
        if cli.dump_alignment.is_some() {
            anyhow::bail!("--dump-alignment requires a .docx input");
        }
        anonymize_txt(&cli.input, &predictions, &cli.output_dir)?
    };

    println!("Saved to: {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(&cli)
}
