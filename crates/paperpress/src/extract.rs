use std::path::{Path, PathBuf};

use colored::Colorize;
use paperpress_core::pages;
use paperpress_core::workspace::{paper_name_from_file, validate_paper_name, Workspace};

use crate::prelude::{eprintln, println, *};
use crate::Failure;

#[derive(Debug, clap::Parser)]
#[command(name = "extract")]
#[command(about = "Extract per-page text from papers/<name>.pdf into extracted/<name>_pages.json")]
pub struct App {
    /// Working directory holding papers/, extracted/, translations/ and output/
    working_dir: PathBuf,

    /// Paper to extract; every papers/*.pdf when omitted
    paper_name: Option<String>,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    tokio::task::spawn_blocking(move || run_blocking(app, global)).await?
}

fn run_blocking(app: App, global: crate::Global) -> Result<()> {
    let ws = Workspace::new(app.working_dir);
    let names = match app.paper_name {
        Some(name) => vec![name],
        None => discover_papers(&ws)?,
    };

    let mut failures = Vec::new();
    for name in &names {
        match extract_paper(&ws, name) {
            Ok(count) => {
                println!(
                    "{} {} {}",
                    "extracted".green().bold(),
                    name,
                    f!("({count} pages)").dimmed()
                );
                if global.verbose {
                    eprintln!("  {}", ws.pages_json(name).display());
                }
            }
            Err(report) => failures.push(Failure::new(name, "extract", report)),
        }
    }

    crate::finish(&failures, names.len())
}

/// Every `papers/*.pdf`, by name, in sorted order.
pub fn discover_papers(ws: &Workspace) -> Result<Vec<String>> {
    let dir = ws.papers_dir();
    if !dir.is_dir() {
        return Err(Error::FileNotFound(dir).into());
    }

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .wrap_err_with(|| f!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name();
            paper_name_from_file(&file_name.to_string_lossy()).map(str::to_string)
        })
        .collect();
    names.sort();
    log::debug!("discovered {} papers in {}", names.len(), dir.display());
    Ok(names)
}

/// Extract one paper and write its page JSON. Returns the page count.
pub fn extract_paper(ws: &Workspace, name: &str) -> Result<usize> {
    validate_paper_name(name).map_err(Error::from)?;
    let source = ws.source_pdf(name);
    log::info!("extracting {}", source.display());

    let records = pdf::extract_file(&source)
        .map_err(Error::from)
        .wrap_err_with(|| f!("Failed to extract {}", source.display()))?;
    let json = pages::to_json(&records).map_err(Error::from)?;

    write_json(&ws.pages_json(name), &json)?;
    Ok(records.len())
}

fn write_json(path: &Path, json: &str) -> Result<()> {
    crate::output::write_atomic(path, json.as_bytes())
        .map_err(Error::from)
        .wrap_err_with(|| f!("Failed to write {}", path.display()))
}
