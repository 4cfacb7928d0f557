use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the user asked the renderer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Dual,
    Summary,
    All,
}

impl RenderMode {
    /// Concrete reports to produce, in the order they are attempted.
    pub fn reports(self) -> &'static [ReportKind] {
        match self {
            RenderMode::Dual => &[ReportKind::Dual],
            RenderMode::Summary => &[ReportKind::Summary],
            RenderMode::All => &[ReportKind::Dual, ReportKind::Summary],
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dual" => Ok(RenderMode::Dual),
            "summary" => Ok(RenderMode::Summary),
            "all" => Ok(RenderMode::All),
            other => Err(format!(
                "unknown mode {other:?} (expected dual, summary or all)"
            )),
        }
    }
}

/// One output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Dual,
    Summary,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Dual => "dual",
            ReportKind::Summary => "summary",
        }
    }
}

/// Paper geometry handed to the browser's print call, in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_in: f64,
}

/// 1in = 72pt.
const PT_PER_IN: f64 = 72.0;

impl PageSetup {
    /// A4 portrait with 0.4in margins; the browser paginates the flow.
    pub const SUMMARY: PageSetup = PageSetup {
        width_in: 595.28 / PT_PER_IN,
        height_in: 841.89 / PT_PER_IN,
        margin_in: 0.4,
    };

    /// Two A4 widths side by side, no margins. Each spread is one sheet.
    pub const DUAL: PageSetup = PageSetup {
        width_in: 1190.56 / PT_PER_IN,
        height_in: 841.89 / PT_PER_IN,
        margin_in: 0.0,
    };
}

impl ReportKind {
    pub fn page_setup(self) -> PageSetup {
        match self {
            ReportKind::Dual => PageSetup::DUAL,
            ReportKind::Summary => PageSetup::SUMMARY,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to lay out one report, already read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub kind: ReportKind,
    pub name: String,
    /// Markdown sources in the order they were discovered.
    pub sources: Vec<String>,
}
