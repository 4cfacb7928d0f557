use std::path::{Path, PathBuf};

use thiserror::Error;

use paperpress_core::pages::{PageRecord, A4_HEIGHT_PT, A4_WIDTH_PT};
use parser::backend::{LopdfSource, PageSource};

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod normalize;
pub mod parser;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("PDF cannot be parsed: {0}")]
    Corrupt(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read a PDF from disk and extract one [`PageRecord`] per page.
pub fn extract_file(path: &Path) -> Result<Vec<PageRecord>, PdfError> {
    if !path.is_file() {
        return Err(PdfError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    extract_pages(&bytes)
}

/// Extract one [`PageRecord`] per page, indices `0..N` in document order.
///
/// A document with no pages yields an empty vector.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageRecord>, PdfError> {
    let source = LopdfSource::load_bytes(bytes)?;
    extract_from(&source)
}

/// Extraction over any [`PageSource`].
pub fn extract_from(source: &dyn PageSource) -> Result<Vec<PageRecord>, PdfError> {
    source
        .pages()
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let spans = parser::layout::page_spans(source, page)
                .map_err(|e| page_error(index, e))?;
            let text = normalize::normalize_text(&parser::layout::page_text(spans));
            let (width, height) = source
                .media_box(page)
                .map(|(w, h)| (f64::from(w), f64::from(h)))
                .unwrap_or_else(|| {
                    log::debug!("page {index} has no MediaBox, assuming A4");
                    (A4_WIDTH_PT, A4_HEIGHT_PT)
                });
            Ok(PageRecord::new(index, text, width, height))
        })
        .collect()
}

/// Number of pages, without extracting text.
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfError> {
    Ok(LopdfSource::load_bytes(bytes)?.page_count())
}

fn page_error(index: usize, err: PdfError) -> PdfError {
    match err {
        PdfError::Corrupt(msg) => PdfError::Corrupt(format!("page {index}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::{pdf_with, text_pdf, FixtureFont};

    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        text_pdf(pages).unwrap()
    }

    #[test]
    fn test_extract_one_record_per_page() {
        let bytes = build_pdf(&["Abstract", "Introduction", "Method"]);
        let pages = extract_pages(&bytes).unwrap();

        assert_eq!(pages.len(), 3);
        let indices: Vec<usize> = pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(pages[0].text, "Abstract");
        assert_eq!(pages[2].text, "Method");
    }

    #[test]
    fn test_extract_inherited_media_box() {
        let pages = extract_pages(&build_pdf(&["x"])).unwrap();
        assert_eq!(pages[0].width, 612.0);
        assert_eq!(pages[0].height, 792.0);
    }

    #[test]
    fn test_extract_cid_font_through_to_unicode() {
        // Glyph ids that mean nothing as UTF-16: 0x002B is '+', 0x0048 is 'H'.
        let map = [(0x002B, 'H'), (0x0048, 'e'), (0x0050, '中')];
        let shown: [u8; 6] = [0x00, 0x2B, 0x00, 0x48, 0x00, 0x50];
        let bytes = pdf_with(FixtureFont::Cid(&map), &[&shown[..]]).unwrap();
        let pages = extract_pages(&bytes).unwrap();
        assert_eq!(pages[0].text, "He中");
    }

    #[test]
    fn test_extract_win_ansi_font() {
        let shown = b"\x93quoted\x94 caf\xe9";
        let bytes = pdf_with(FixtureFont::WinAnsi, &[shown.as_slice()]).unwrap();
        let pages = extract_pages(&bytes).unwrap();
        assert_eq!(pages[0].text, "\u{201C}quoted\u{201D} café");
    }

    #[test]
    fn test_extract_zero_pages() {
        let pages = extract_pages(&build_pdf(&[])).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_extract_corrupt_document() {
        assert!(matches!(
            extract_pages(b"%PDF-1.5\nthis is not really a pdf"),
            Err(PdfError::Corrupt(_))
        ));
    }

    #[test]
    fn test_extract_file_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            extract_file(&missing),
            Err(PdfError::FileNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_extract_file_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, build_pdf(&["on disk"])).unwrap();
        let pages = extract_file(&path).unwrap();
        assert_eq!(pages[0].text, "on disk");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&build_pdf(&["a", "b"])).unwrap(), 2);
        assert!(page_count(b"garbage").is_err());
    }
}
