use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Fragments reference page indices the extractor never produced.
    #[error("page markers reference pages not in the extracted document ({page_count} pages): {}", format_indices(.missing))]
    IntegrityMismatch {
        missing: Vec<usize>,
        page_count: usize,
    },

    /// A `<!-- PAGE 0 -->` marker under one-based numbering.
    #[error("page marker 0 is invalid when markers are numbered from 1")]
    ZeroMarker,

    /// The marker number does not fit a page index.
    #[error("page marker {0:?} is not a valid page number")]
    InvalidMarker(String),

    /// Page records whose indices are not exactly `0..N`.
    #[error("extracted pages are out of sequence: expected index {expected}, found {found}")]
    PageSequence { expected: usize, found: usize },

    #[error("malformed page records: {0}")]
    PageJson(String),

    #[error("invalid paper name {0:?}")]
    InvalidPaperName(String),
}

fn format_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_mismatch_lists_indices() {
        let err = CoreError::IntegrityMismatch {
            missing: vec![3, 7],
            page_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "page markers reference pages not in the extracted document (3 pages): 3, 7"
        );
    }
}
