//! DOCX container I/O.
//!
//! A DOCX is a ZIP of XML parts plus binary media. Extraction and
//! repackaging preserve relative paths; media entries are stored
//! uncompressed and everything else deflated, matching the layout Word
//! produces.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Extract a DOCX archive into `output_dir` (created if missing).
pub fn unzip_document(doc_path: &Path, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let file = std::fs::File::open(doc_path)
        .with_context(|| format!("Failed to open DOCX: {}", doc_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a valid DOCX/ZIP archive: {}", doc_path.display()))?;
    archive
        .extract(output_dir)
        .with_context(|| format!("Failed to extract {}", doc_path.display()))?;
    Ok(())
}

/// Recursively collect every file under `dir`, as paths relative to
/// `root`, sorted for deterministic archive layout.
fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .expect("walk stays under root")
                .to_path_buf();
            files.push(relative);
        }
    }
    Ok(())
}

/// Repackage an extracted (and patched) directory tree as a DOCX at
/// `output_file`.
pub fn create_docx(xml_directory: &Path, output_file: &Path) -> Result<()> {
    let mut files = Vec::new();
    collect_files(xml_directory, xml_directory, &mut files)?;
    files.sort();

    let file = std::fs::File::create(output_file)
        .with_context(|| format!("Failed to create output: {}", output_file.display()))?;
    let mut docx = zip::ZipWriter::new(file);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for relative in &files {
        let name = relative
            .to_str()
            .context("non-UTF-8 path inside DOCX tree")?
            .replace('\\', "/");
        let options = if name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        let data = std::fs::read(xml_directory.join(relative))?;
        docx.start_file(name.as_str(), options)?;
        docx.write_all(&data)?;
    }

    docx.finish()?;
    Ok(())
}
