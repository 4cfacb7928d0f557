//! Per-page extraction records.
//!
//! The extractor writes one [`PageRecord`] per PDF page and the dual renderer
//! reads them back to pair each page with its translation. Page order is the
//! join key between the two, so a loaded sequence must be exactly `0..N`.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A4 portrait in points, used when a page declares no MediaBox.
pub const A4_WIDTH_PT: f64 = 595.28;
pub const A4_HEIGHT_PT: f64 = 841.89;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_index: usize,
    pub text: String,
    pub width: f64,
    pub height: f64,
}

impl PageRecord {
    pub fn new(page_index: usize, text: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            page_index,
            text: text.into(),
            width,
            height,
        }
    }

    /// Human-facing page number (1-based).
    pub fn number(&self) -> usize {
        self.page_index + 1
    }
}

/// Check that `pages` carry indices `0, 1, .., N-1` in that order.
pub fn validate_sequence(pages: &[PageRecord]) -> Result<(), CoreError> {
    for (expected, page) in pages.iter().enumerate() {
        if page.page_index != expected {
            return Err(CoreError::PageSequence {
                expected,
                found: page.page_index,
            });
        }
    }
    Ok(())
}

/// Serialize records the way the extractor stores them on disk.
pub fn to_json(pages: &[PageRecord]) -> Result<String, CoreError> {
    serde_json::to_string_pretty(pages).map_err(|e| CoreError::PageJson(e.to_string()))
}

/// Parse and validate a page-record file.
pub fn from_json(json: &str) -> Result<Vec<PageRecord>, CoreError> {
    let pages: Vec<PageRecord> =
        serde_json::from_str(json).map_err(|e| CoreError::PageJson(e.to_string()))?;
    validate_sequence(&pages)?;
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Vec<PageRecord> {
        (0..n)
            .map(|i| PageRecord::new(i, format!("page {i}"), A4_WIDTH_PT, A4_HEIGHT_PT))
            .collect()
    }

    #[test]
    fn test_validate_sequence_accepts_contiguous() {
        assert!(validate_sequence(&pages(4)).is_ok());
    }

    #[test]
    fn test_validate_sequence_accepts_empty() {
        assert!(validate_sequence(&[]).is_ok());
    }

    #[test]
    fn test_validate_sequence_rejects_gap() {
        let mut p = pages(3);
        p.remove(1);
        assert_eq!(
            validate_sequence(&p),
            Err(CoreError::PageSequence {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_validate_sequence_rejects_duplicate() {
        let mut p = pages(2);
        p[1].page_index = 0;
        assert!(validate_sequence(&p).is_err());
    }

    #[test]
    fn test_json_field_names() {
        let json = to_json(&[PageRecord::new(0, "Abstract", 612.0, 792.0)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["page_index"], 0);
        assert_eq!(value[0]["text"], "Abstract");
        assert_eq!(value[0]["width"], 612.0);
        assert_eq!(value[0]["height"], 792.0);
    }

    #[test]
    fn test_json_keeps_non_ascii() {
        let json = to_json(&[PageRecord::new(0, "注意力机制", 1.0, 1.0)]).unwrap();
        assert!(json.contains("注意力机制"));
    }

    #[test]
    fn test_from_json_rejects_out_of_order() {
        let json = r#"[
            {"page_index": 1, "text": "b", "width": 1, "height": 1},
            {"page_index": 0, "text": "a", "width": 1, "height": 1}
        ]"#;
        assert!(matches!(
            from_json(json),
            Err(CoreError::PageSequence { .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(from_json("{"), Err(CoreError::PageJson(_))));
    }

    #[test]
    fn test_page_number_is_one_based() {
        assert_eq!(PageRecord::new(0, "", 1.0, 1.0).number(), 1);
    }
}
