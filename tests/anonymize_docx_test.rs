//! End-to-end tests for the DOCX anonymization pipeline.
//!
//! These build synthetic DOCX archives in a temp directory, run the full
//! extract → index → match → patch → repackage pipeline, and inspect the
//! rewritten parts. They exercise the same code paths as production: no
//! component is stubbed out.

use court_redaction_toolkit::anonymize::anonymize_docx;
use court_redaction_toolkit::entities::{DocLabel, EntityAttributes, ParagraphPrediction};
use court_redaction_toolkit::xml_index::index_paragraphs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const DOCUMENT_SHELL: (&str, &str) = (
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    "</w:body></w:document>",
);

/// Write a DOCX whose word/document.xml body is `body`, plus any extra
/// parts, into `dir`. Returns the archive path.
fn build_docx(dir: &Path, body: &str, extra_parts: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("resolucion.docx");
    let file = std::fs::File::create(&path).expect("create docx");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();

    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(DOCUMENT_SHELL.0.as_bytes()).unwrap();
    zip.write_all(body.as_bytes()).unwrap();
    zip.write_all(DOCUMENT_SHELL.1.as_bytes()).unwrap();

    for (name, data) in extra_parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
    path
}

fn read_part(docx: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(docx).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

fn label(text: &str, start: usize, end: usize, category: &str) -> DocLabel {
    DocLabel {
        text: text.to_string(),
        start_char: start,
        end_char: end,
        attrs: EntityAttributes {
            label: category.to_string(),
            ..Default::default()
        },
    }
}

fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

#[test]
fn anonymizes_labeled_spans_and_leaves_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "{}{}",
        paragraph("Acusado: Ramiro Marrón DNI 34.555.666."),
        paragraph("Sin información sensible.")
    );
    let docx = build_docx(dir.path(), &body, &[]);

    let predictions = vec![
        ParagraphPrediction::new(
            "Acusado: Ramiro Marrón DNI 34.555.666.",
            vec![
                label("Ramiro Marrón", 9, 22, "PER"),
                label("34.555.666", 27, 37, "DNI"),
            ],
        ),
        ParagraphPrediction::new("Sin información sensible.", vec![]),
    ];

    let out_dir = dir.path().join("out");
    let output = anonymize_docx(&docx, &predictions, &out_dir).unwrap();
    assert_eq!(output.file_name().unwrap(), "resolucion.docx");

    let document = read_part(&output, "word/document.xml");
    assert!(document.contains("Acusado: &lt;PER&gt; DNI &lt;DNI&gt;."));
    assert!(document.contains("Sin información sensible."));
    assert!(!document.contains("Ramiro"));
    assert!(!document.contains("Marrón"));
    assert!(!document.contains("34.555.666"));
    assert!(document.contains(r#"xml:space="preserve""#));
}

#[test]
fn span_split_across_two_runs_emits_one_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let body =
        "<w:p><w:r><w:t>Juan </w:t></w:r><w:r><w:t>Pérez</w:t></w:r></w:p>".to_string();
    let docx = build_docx(dir.path(), &body, &[]);

    let predictions = vec![ParagraphPrediction::new(
        "Juan Pérez",
        vec![label("Juan Pérez", 0, 10, "PER")],
    )];

    let output = anonymize_docx(&docx, &predictions, &dir.path().join("out")).unwrap();
    let document = read_part(&output, "word/document.xml");

    assert_eq!(document.matches("&lt;PER&gt;").count(), 1);
    assert!(!document.contains("Juan"));
    assert!(!document.contains("Pérez"));
}

#[test]
fn empty_label_round_trip_preserves_text() {
    let dir = tempfile::tempdir().unwrap();
    let texts = [
        "Primera   instancia en lo penal.",
        "Expediente 12345/2023,  caratulado.",
        "Vistos los autos.",
    ];
    let body: String = texts.iter().map(|t| paragraph(t)).collect();
    let docx = build_docx(dir.path(), &body, &[]);

    // Predictions over the normalized text stream, no labels anywhere
    let predictions: Vec<ParagraphPrediction> = texts
        .iter()
        .map(|t| {
            ParagraphPrediction::new(
                court_redaction_toolkit::text_norm::normalize_text(t),
                vec![],
            )
        })
        .collect();

    let output = anonymize_docx(&docx, &predictions, &dir.path().join("out")).unwrap();

    // Re-index the output with the same indexer: the normalized plain
    // text must be character-identical to the normalized source
    let extracted = dir.path().join("extracted");
    court_redaction_toolkit::docx_zip::unzip_document(&output, &extracted).unwrap();
    let paragraphs = index_paragraphs(&extracted, "word/document.xml").unwrap();

    let recovered: Vec<String> = paragraphs
        .iter()
        .map(|p| p.plain_text.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let expected: Vec<String> = texts
        .iter()
        .map(|t| {
            court_redaction_toolkit::text_norm::normalize_text(t)
                .trim()
                .to_string()
        })
        .collect();
    assert_eq!(recovered, expected);
}

#[test]
fn header_parts_are_anonymized_too() {
    let dir = tempfile::tempdir().unwrap();
    let header = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
        paragraph("Causa de Ramiro Marrón")
    );
    let body = paragraph("Vistos los autos.");
    let docx = build_docx(dir.path(), &body, &[("word/header1.xml", header.as_bytes())]);

    let predictions = vec![
        ParagraphPrediction::new("Vistos los autos.", vec![]),
        ParagraphPrediction::new(
            "Causa de Ramiro Marrón",
            vec![label("Ramiro Marrón", 9, 22, "PER")],
        ),
    ];

    let output = anonymize_docx(&docx, &predictions, &dir.path().join("out")).unwrap();
    let header_out = read_part(&output, "word/header1.xml");
    assert!(header_out.contains("Causa de &lt;PER&gt;"));
    assert!(!header_out.contains("Ramiro"));
}

#[test]
fn binary_media_parts_survive_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let fake_png: Vec<u8> = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x01];
    let body = paragraph("Ramiro firmó.");
    let docx = build_docx(dir.path(), &body, &[("word/media/image1.png", &fake_png)]);

    let predictions = vec![ParagraphPrediction::new(
        "Ramiro firmó.",
        vec![label("Ramiro", 0, 6, "PER")],
    )];

    let output = anonymize_docx(&docx, &predictions, &dir.path().join("out")).unwrap();

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
    let mut entry = archive.by_name("word/media/image1.png").unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    assert_eq!(data, fake_png);
}

#[test]
fn reordered_predictions_still_match_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "{}{}",
        paragraph("Declara Ana López."),
        paragraph("Sin más consideraciones.")
    );
    let docx = build_docx(dir.path(), &body, &[]);

    // Predictions arrive in the opposite order of the document
    let predictions = vec![
        ParagraphPrediction::new("Sin más consideraciones.", vec![]),
        ParagraphPrediction::new(
            "Declara Ana López.",
            vec![label("Ana López", 8, 17, "PER")],
        ),
    ];

    let output = anonymize_docx(&docx, &predictions, &dir.path().join("out")).unwrap();
    let document = read_part(&output, "word/document.xml");
    assert!(document.contains("Declara &lt;PER&gt;."));
    assert!(document.contains("Sin más consideraciones."));
}
