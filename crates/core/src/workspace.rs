//! Working-directory path conventions.
//!
//! ```text
//! <root>/
//!   papers/<name>.pdf              source PDFs
//!   extracted/<name>_pages.json    extractor output
//!   translations/<name>_p*.md      page-marked translation fragments
//!   translations/<name>.md         (or one concatenated file)
//!   <name>_annotated.md            summary source
//!   summaries/<name>.md            (alternative summary location)
//!   output/<name>_{dual,summary}.pdf
//! ```
//!
//! The root is always passed in explicitly; nothing here consults the
//! process's current directory.

use std::path::{Path, PathBuf};

use crate::job::ReportKind;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn papers_dir(&self) -> PathBuf {
        self.root.join("papers")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn translations_dir(&self) -> PathBuf {
        self.root.join("translations")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn source_pdf(&self, name: &str) -> PathBuf {
        self.papers_dir().join(format!("{name}.pdf"))
    }

    pub fn pages_json(&self, name: &str) -> PathBuf {
        self.extracted_dir().join(format!("{name}_pages.json"))
    }

    /// Summary sources in lookup order; the first existing one wins.
    pub fn summary_candidates(&self, name: &str) -> [PathBuf; 2] {
        [
            self.root.join(format!("{name}_annotated.md")),
            self.root.join("summaries").join(format!("{name}.md")),
        ]
    }

    pub fn output_pdf(&self, name: &str, kind: ReportKind) -> PathBuf {
        self.output_dir().join(format!("{name}_{kind}.pdf"))
    }
}

/// Reject names that would escape the working directory.
pub fn validate_paper_name(name: &str) -> Result<(), CoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        Err(CoreError::InvalidPaperName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Paper name for a `papers/` entry, if it is a PDF.
pub fn paper_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(".pdf")
        .filter(|stem| !stem.is_empty())
}

/// Sort key for a file in `translations/` belonging to `paper`.
///
/// `<paper>.md` sorts first, then `<paper>_p<N>…md` by the number `N`
/// (files without a number after the `_p` come last), ties by file name.
/// Returns `None` for files that belong to another paper.
pub fn translation_order(paper: &str, file_name: &str) -> Option<(u8, u64, String)> {
    let stem = file_name.strip_suffix(".md")?;
    if stem == paper {
        return Some((0, 0, file_name.to_string()));
    }
    let rest = stem.strip_prefix(paper)?.strip_prefix("_p")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let number = digits.parse().unwrap_or(u64::MAX);
    Some((1, number, file_name.to_string()))
}
