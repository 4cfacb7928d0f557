use std::path::PathBuf;

use paperpress_core::job::{RenderJob, ReportKind};
use paperpress_core::pages::{self, PageRecord};
use paperpress_core::workspace::{translation_order, validate_paper_name, Workspace};

use crate::prelude::*;

/// Read the Markdown a report of `kind` is built from.
pub fn load_job(ws: &Workspace, kind: ReportKind, name: &str) -> Result<RenderJob> {
    validate_paper_name(name).map_err(Error::from)?;
    let sources = match kind {
        ReportKind::Dual => translation_sources(ws, name)?,
        ReportKind::Summary => vec![summary_source(ws, name)?],
    };
    Ok(RenderJob {
        kind,
        name: name.to_string(),
        sources,
    })
}

/// Translation files of `name`, `<name>.md` first, then `<name>_p<N>.md` by `N`.
pub fn translation_files(ws: &Workspace, name: &str) -> Result<Vec<PathBuf>> {
    let dir = ws.translations_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = std::fs::read_dir(&dir)
        .wrap_err_with(|| f!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            translation_order(name, &file_name).map(|key| (key, entry.path()))
        })
        .collect();
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn translation_sources(ws: &Workspace, name: &str) -> Result<Vec<String>> {
    let files = translation_files(ws, name)?;
    if files.is_empty() {
        return Err(Error::MissingSource {
            kind: ReportKind::Dual,
            name: name.to_string(),
            detail: f!(
                "no {name}_p*.md or {name}.md in {}",
                ws.translations_dir().display()
            ),
        }
        .into());
    }

    files
        .iter()
        .map(|path| {
            log::debug!("reading translation {}", path.display());
            std::fs::read_to_string(path)
                .map_err(Error::from)
                .wrap_err_with(|| f!("Failed to read {}", path.display()))
        })
        .collect()
}

fn summary_source(ws: &Workspace, name: &str) -> Result<String> {
    let candidates = ws.summary_candidates(name);
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        return Err(Error::MissingSource {
            kind: ReportKind::Summary,
            name: name.to_string(),
            detail: f!(
                "neither {} nor {} exists",
                candidates[0].display(),
                candidates[1].display()
            ),
        }
        .into());
    };
    log::debug!("reading summary {}", path.display());
    std::fs::read_to_string(path)
        .map_err(Error::from)
        .wrap_err_with(|| f!("Failed to read {}", path.display()))
}

/// Page records for a dual report.
///
/// The extracted JSON is preferred. Without it the source PDF is extracted
/// in memory; nothing is written back to `extracted/`.
pub fn load_pages(ws: &Workspace, name: &str) -> Result<Vec<PageRecord>> {
    let json_path = ws.pages_json(name);
    if json_path.is_file() {
        let json = std::fs::read_to_string(&json_path)
            .map_err(Error::from)
            .wrap_err_with(|| f!("Failed to read {}", json_path.display()))?;
        return pages::from_json(&json)
            .map_err(Error::from)
            .wrap_err_with(|| f!("Invalid page records in {}", json_path.display()));
    }

    let pdf_path = ws.source_pdf(name);
    if pdf_path.is_file() {
        log::info!(
            "{} not found, extracting {} directly",
            json_path.display(),
            pdf_path.display()
        );
        return pdf::extract_file(&pdf_path)
            .map_err(Error::from)
            .wrap_err_with(|| f!("Failed to extract {}", pdf_path.display()));
    }

    Err(Error::MissingSource {
        kind: ReportKind::Dual,
        name: name.to_string(),
        detail: f!(
            "neither {} nor {} exists",
            json_path.display(),
            pdf_path.display()
        ),
    }
    .into())
}
