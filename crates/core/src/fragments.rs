//! Page-scoped translation fragments.
//!
//! Translations arrive as Markdown containing `<!-- PAGE N -->` comments.
//! Everything after a marker, up to the next marker or the end of the source,
//! is the translation of page `N`. Sources are parsed independently: text in
//! a source before its first marker belongs to no page. Markers inside fenced
//! code blocks are page content, not markers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::math::fenced_ranges;
use crate::CoreError;

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!--\s*PAGE\s+([0-9]+)\s*-->").expect("page marker pattern is valid")
});

/// How the `N` of a page marker maps onto a zero-based page index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerBase {
    /// `<!-- PAGE 0 -->` is the first page.
    #[default]
    Zero,
    /// `<!-- PAGE 1 -->` is the first page.
    One,
}

impl std::str::FromStr for MarkerBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" | "0" => Ok(MarkerBase::Zero),
            "one" | "1" => Ok(MarkerBase::One),
            other => Err(format!("unknown marker base {other:?} (expected zero or one)")),
        }
    }
}

impl MarkerBase {
    fn to_index(self, marker: usize) -> Result<usize, CoreError> {
        match self {
            MarkerBase::Zero => Ok(marker),
            MarkerBase::One => marker.checked_sub(1).ok_or(CoreError::ZeroMarker),
        }
    }
}

/// Translations keyed by zero-based page index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragments {
    pages: BTreeMap<usize, String>,
    /// Number of sources that had text before their first marker.
    pub unbound_preludes: usize,
}

impl Fragments {
    pub fn get(&self, page_index: usize) -> Option<&str> {
        self.pages.get(&page_index).map(String::as_str)
    }

    /// Referenced page indices in increasing order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// `Err(IntegrityMismatch)` when any referenced index is `>= page_count`.
    pub fn check_against(&self, page_count: usize) -> Result<(), CoreError> {
        let missing: Vec<usize> = self.indices().filter(|&i| i >= page_count).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::IntegrityMismatch {
                missing,
                page_count,
            })
        }
    }

    fn insert(&mut self, page_index: usize, body: &str) {
        self.pages
            .entry(page_index)
            .and_modify(|existing| {
                if !body.is_empty() {
                    if !existing.is_empty() {
                        existing.push_str("\n\n");
                    }
                    existing.push_str(body);
                }
            })
            .or_insert_with(|| body.to_string());
    }
}

/// Split every source on its page markers and merge the results in order.
///
/// A page referenced by more than one source (or twice in one source) gets
/// the bodies concatenated in the order they were seen.
pub fn parse_fragments<S: AsRef<str>>(
    sources: &[S],
    base: MarkerBase,
) -> Result<Fragments, CoreError> {
    let mut fragments = Fragments::default();

    for source in sources {
        let source = source.as_ref();
        let fenced = fenced_ranges(source);
        let markers: Vec<_> = PAGE_MARKER
            .captures_iter(source)
            .filter(|caps| {
                caps.get(0)
                    .is_some_and(|m| !fenced.iter().any(|r| r.contains(&m.start())))
            })
            .collect();

        let prelude_end = markers
            .first()
            .and_then(|caps| caps.get(0))
            .map_or(source.len(), |m| m.start());
        if !source[..prelude_end].trim().is_empty() {
            fragments.unbound_preludes += 1;
        }

        for (i, caps) in markers.iter().enumerate() {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let marker: usize = number
                .as_str()
                .parse()
                .map_err(|_| CoreError::InvalidMarker(number.as_str().to_string()))?;
            let page_index = base.to_index(marker)?;

            let body_end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(source.len(), |m| m.start());
            fragments.insert(page_index, source[whole.end()..body_end].trim());
        }
    }

    Ok(fragments)
}
