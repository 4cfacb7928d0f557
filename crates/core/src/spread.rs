//! Pairing original pages with their translations for dual reports.
//!
//! One [`Spread`] is produced per extracted page, in page order, whether or
//! not a translation exists for it. A page without one carries placeholder
//! text so the report stays page-aligned with the source PDF.

use crate::fragments::Fragments;
use crate::markdown;
use crate::pages::PageRecord;

/// `{page}` is replaced with the 1-based page number.
pub const DEFAULT_PLACEHOLDER: &str = "No translation available for page {page}.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Rendered HTML of the page's fragment.
    Html(String),
    /// Placeholder text, already filled in.
    Missing(String),
}

impl Translation {
    pub fn is_missing(&self) -> bool {
        matches!(self, Translation::Missing(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spread {
    pub page_index: usize,
    pub original_text: String,
    pub translation: Translation,
}

impl Spread {
    pub fn number(&self) -> usize {
        self.page_index + 1
    }
}

pub fn placeholder_text(template: &str, number: usize) -> String {
    template.replace("{page}", &number.to_string())
}

/// Lay out one spread per page. Fragments must already have been checked
/// against `pages.len()`; indices past the end are ignored here.
pub fn plan_spreads(pages: &[PageRecord], fragments: &Fragments, placeholder: &str) -> Vec<Spread> {
    pages
        .iter()
        .map(|page| {
            let translation = match fragments.get(page.page_index) {
                Some(md) if !md.trim().is_empty() => Translation::Html(markdown::to_html(md)),
                _ => Translation::Missing(placeholder_text(placeholder, page.number())),
            };
            Spread {
                page_index: page.page_index,
                original_text: page.text.clone(),
                translation,
            }
        })
        .collect()
}
