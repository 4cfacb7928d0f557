use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use paperpress_core::fragments::{parse_fragments, MarkerBase};
use paperpress_core::job::{PageSetup, RenderJob, RenderMode, ReportKind};
use paperpress_core::markdown;
use paperpress_core::spread::{plan_spreads, DEFAULT_PLACEHOLDER};
use paperpress_core::template::{self, TemplateOptions, KATEX_CDN};
use paperpress_core::workspace::Workspace;

use crate::prelude::{eprintln, println, *};
use crate::Failure;

pub mod browser;
pub mod sources;

#[derive(Debug, clap::Parser)]
#[command(name = "render")]
#[command(about = "Render dual, summary or all reports into output/<name>_<kind>.pdf")]
pub struct App {
    /// Working directory holding papers/, extracted/, translations/ and output/
    working_dir: PathBuf,

    /// Which reports to produce: dual, summary or all
    mode: RenderMode,

    /// Paper to render; every papers/*.pdf when omitted
    paper_name: Option<String>,

    /// Seconds to wait for the document to finish typesetting
    #[arg(long, env = "PAPERPRESS_TIMEOUT", default_value = "30")]
    timeout: u64,

    /// Whether `<!-- PAGE N -->` counts pages from zero or one
    #[arg(long, env = "PAPERPRESS_MARKER_BASE", default_value = "zero")]
    marker_base: MarkerBase,

    /// Text for pages without a translation; `{page}` is the page number
    #[arg(long, env = "PAPERPRESS_PLACEHOLDER", default_value = DEFAULT_PLACEHOLDER)]
    placeholder: String,

    /// Base URL of the KaTeX distribution
    #[arg(long, env = "PAPERPRESS_KATEX_URL", default_value = KATEX_CDN)]
    katex_url: String,

    /// Chrome or Chromium executable, as a path or a name on PATH
    #[arg(long, env = "PAPERPRESS_CHROME")]
    chrome: Option<String>,

    /// Run the browser without its sandbox (needed in most containers)
    #[arg(long, env = "PAPERPRESS_NO_SANDBOX", default_value = "false")]
    no_sandbox: bool,
}

/// What shapes the HTML, independent of the browser.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub marker_base: MarkerBase,
    pub placeholder: String,
    pub template: TemplateOptions,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            marker_base: MarkerBase::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            template: TemplateOptions::default(),
        }
    }
}

/// Turns a complete HTML document into PDF bytes.
pub trait Printer {
    fn print(&mut self, html: &str, setup: PageSetup) -> Result<Vec<u8>>;
}

/// An HTML document ready to print.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub html: String,
    /// Printed pages a dual report should come out with.
    pub expected_pages: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Batch {
    pub written: Vec<PathBuf>,
    pub failures: Vec<Failure>,
    pub attempted: usize,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    // headless_chrome is synchronous
    tokio::task::spawn_blocking(move || run_blocking(app, global)).await?
}

fn run_blocking(app: App, global: crate::Global) -> Result<()> {
    let ws = Workspace::new(&app.working_dir);
    let names = match &app.paper_name {
        Some(name) => vec![name.clone()],
        None => crate::extract::discover_papers(&ws)?,
    };

    let config = RenderConfig {
        marker_base: app.marker_base,
        placeholder: app.placeholder.clone(),
        template: TemplateOptions {
            katex_base: app.katex_url.trim_end_matches('/').to_string(),
        },
    };
    let mut session = browser::BrowserSession::new(browser::BrowserOptions {
        chrome: resolve_chrome(app.chrome.as_deref())?,
        sandbox: !app.no_sandbox,
        timeout: Duration::from_secs(app.timeout),
    });

    let batch = render_all(&ws, app.mode, &names, &config, &mut session);
    drop(session);

    for path in &batch.written {
        println!("{} {}", "rendered".green().bold(), path.display());
    }
    if global.verbose {
        eprintln!(
            "{}",
            f!(
                "{} reports written, {} failed",
                batch.written.len(),
                batch.failures.len()
            )
            .dimmed()
        );
    }
    crate::finish(&batch.failures, batch.attempted)
}

/// Render every report `mode` asks for, for every paper, collecting failures.
pub fn render_all(
    ws: &Workspace,
    mode: RenderMode,
    names: &[String],
    config: &RenderConfig,
    printer: &mut dyn Printer,
) -> Batch {
    let mut batch = Batch::default();
    for name in names {
        for &kind in mode.reports() {
            batch.attempted += 1;
            match render_report(ws, kind, name, config, printer) {
                Ok(path) => batch.written.push(path),
                Err(report) => {
                    log::warn!("{name} [{kind}] failed: {report}");
                    batch.failures.push(Failure::new(name, kind.as_str(), report));
                }
            }
        }
    }
    batch
}

/// Build, print and atomically write one report. Returns the output path.
pub fn render_report(
    ws: &Workspace,
    kind: ReportKind,
    name: &str,
    config: &RenderConfig,
    printer: &mut dyn Printer,
) -> Result<PathBuf> {
    print_report(ws, kind, name, config, printer).wrap_err_with(|| f!("{name}: {kind} report"))
}

fn print_report(
    ws: &Workspace,
    kind: ReportKind,
    name: &str,
    config: &RenderConfig,
    printer: &mut dyn Printer,
) -> Result<PathBuf> {
    let prepared = prepare(ws, kind, name, config)?;
    let bytes = printer.print(&prepared.html, kind.page_setup())?;
    if let Some(expected) = prepared.expected_pages {
        check_page_count(name, &bytes, expected);
    }

    let path = ws.output_pdf(name, kind);
    crate::output::write_atomic(&path, &bytes)
        .map_err(Error::from)
        .wrap_err_with(|| f!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Load the sources for `kind` and build its HTML document.
pub fn prepare(
    ws: &Workspace,
    kind: ReportKind,
    name: &str,
    config: &RenderConfig,
) -> Result<Prepared> {
    let job = sources::load_job(ws, kind, name)?;
    match job.kind {
        ReportKind::Summary => Ok(Prepared {
            html: summary_html(&job, config),
            expected_pages: None,
        }),
        ReportKind::Dual => dual_html(ws, &job, config),
    }
}

fn summary_html(job: &RenderJob, config: &RenderConfig) -> String {
    let body = markdown::to_html(&job.sources.join("\n\n"));
    template::summary_document(&job.name, &body, &config.template)
}

fn dual_html(ws: &Workspace, job: &RenderJob, config: &RenderConfig) -> Result<Prepared> {
    let fragments = parse_fragments(&job.sources, config.marker_base).map_err(Error::from)?;
    if fragments.is_empty() {
        return Err(Error::MissingSource {
            kind: ReportKind::Dual,
            name: job.name.clone(),
            detail: "translation files contain no page markers".to_string(),
        }
        .into());
    }
    if fragments.unbound_preludes > 0 {
        log::warn!(
            "{}: text before the first page marker in {} file(s) was dropped",
            job.name,
            fragments.unbound_preludes
        );
    }

    let pages = sources::load_pages(ws, &job.name)?;
    fragments.check_against(pages.len()).map_err(Error::from)?;

    let spreads = plan_spreads(&pages, &fragments, &config.placeholder);
    let missing = spreads.iter().filter(|s| s.translation.is_missing()).count();
    log::info!(
        "{}: {} spreads, {} without translation",
        job.name,
        spreads.len(),
        missing
    );

    Ok(Prepared {
        html: template::dual_document(&job.name, &spreads, &config.template),
        expected_pages: Some(spreads.len()),
    })
}

fn check_page_count(name: &str, bytes: &[u8], expected: usize) {
    match pdf::page_count(bytes) {
        Ok(count) if count == expected => {
            log::debug!("{name}: dual report has {count} pages as expected")
        }
        Ok(count) => log::warn!(
            "{name}: dual report printed {count} pages for {expected} spreads; some columns may still overflow"
        ),
        Err(e) => log::warn!("{name}: could not count pages of the printed report: {e}"),
    }
}

/// A bare name is looked up on `PATH`; anything else is used as a path.
fn resolve_chrome(chrome: Option<&str>) -> Result<Option<PathBuf>> {
    let Some(chrome) = chrome.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let path = PathBuf::from(chrome);
    if path.components().count() > 1 || path.is_file() {
        return Ok(Some(path));
    }
    let found = which::which(chrome)
        .map_err(|e| Error::RenderFailed(f!("Browser {chrome:?} not found on PATH: {e}")))?;
    Ok(Some(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperpress_core::pages::{self, PageRecord};
    use std::path::Path;
    use tempfile::TempDir;

    /// Records what it was asked to print and hands back fixed bytes.
    #[derive(Default)]
    struct FakePrinter {
        calls: Vec<(String, PageSetup)>,
        fail: bool,
    }

    impl Printer for FakePrinter {
        fn print(&mut self, html: &str, setup: PageSetup) -> Result<Vec<u8>> {
            self.calls.push((html.to_string(), setup));
            if self.fail {
                return Err(Error::RenderTimeout(30).into());
            }
            Ok(b"%PDF-1.7 fake".to_vec())
        }
    }

    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    fn write(path: PathBuf, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn write_pages(ws: &Workspace, name: &str, count: usize) {
        let records: Vec<PageRecord> = (0..count)
            .map(|i| PageRecord::new(i, format!("Original page {i}"), 612.0, 792.0))
            .collect();
        write(ws.pages_json(name), &pages::to_json(&records).unwrap());
    }

    fn leftover_parts(dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
                .count(),
            Err(_) => 0,
        }
    }

    fn kind_of(failure: &Failure) -> Option<&Error> {
        failure.report.downcast_ref::<Error>()
    }

    #[test]
    fn test_dual_three_pages_two_translated() {
        let (_dir, ws) = workspace();
        write_pages(&ws, "p", 3);
        write(ws.translations_dir().join("p_p1.md"), "<!-- PAGE 0 -->\n第一页");
        write(ws.translations_dir().join("p_p2.md"), "<!-- PAGE 1 -->\n第二页");

        let mut printer = FakePrinter::default();
        let path = render_report(&ws, ReportKind::Dual, "p", &RenderConfig::default(), &mut printer)
            .unwrap();

        assert_eq!(path, ws.output_pdf("p", ReportKind::Dual));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 fake");

        let (html, setup) = &printer.calls[0];
        assert_eq!(*setup, PageSetup::DUAL);
        assert_eq!(html.matches("<section class=\"spread\"").count(), 3);
        assert!(html.contains("第一页"));
        assert!(html.contains("第二页"));
        assert!(html.contains("No translation available for page 3."));
    }

    #[test]
    fn test_dual_out_of_range_marker() {
        let (_dir, ws) = workspace();
        write_pages(&ws, "p", 3);
        write(ws.translations_dir().join("p.md"), "<!-- PAGE 0 -->a\n<!-- PAGE 3 -->d");

        let mut printer = FakePrinter::default();
        let report =
            render_report(&ws, ReportKind::Dual, "p", &RenderConfig::default(), &mut printer)
                .unwrap_err();

        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::IntegrityMismatch(_))
        ));
        assert!(printer.calls.is_empty());
        assert!(!ws.output_pdf("p", ReportKind::Dual).exists());
    }

    #[test]
    fn test_dual_without_markers_is_missing_source() {
        let (_dir, ws) = workspace();
        write_pages(&ws, "p", 2);
        write(ws.translations_dir().join("p.md"), "Just prose, no markers.");

        let mut printer = FakePrinter::default();
        let report =
            render_report(&ws, ReportKind::Dual, "p", &RenderConfig::default(), &mut printer)
                .unwrap_err();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::MissingSource { .. })
        ));
    }

    #[test]
    fn test_one_based_markers_config() {
        let (_dir, ws) = workspace();
        write_pages(&ws, "p", 2);
        write(ws.translations_dir().join("p.md"), "<!-- PAGE 2 -->second");

        let config = RenderConfig {
            marker_base: MarkerBase::One,
            ..RenderConfig::default()
        };
        let prepared = prepare(&ws, ReportKind::Dual, "p", &config).unwrap();

        assert_eq!(prepared.expected_pages, Some(2));
        assert!(prepared.html.contains("No translation available for page 1."));
        assert!(prepared.html.contains("second"));
    }

    #[test]
    fn test_summary_without_math_or_markers() {
        let (_dir, ws) = workspace();
        write(ws.root().join("p_annotated.md"), "# Summary\n\nNo math here.");

        let mut printer = FakePrinter::default();
        render_report(&ws, ReportKind::Summary, "p", &RenderConfig::default(), &mut printer)
            .unwrap();

        let (html, setup) = &printer.calls[0];
        assert_eq!(*setup, PageSetup::SUMMARY);
        assert!(html.contains("<h1>Summary</h1>"));
        assert!(ws.output_pdf("p", ReportKind::Summary).is_file());
    }

    #[test]
    fn test_all_mode_collects_failures() {
        let (_dir, ws) = workspace();
        write(ws.root().join("p_annotated.md"), "## Findings");

        let mut printer = FakePrinter::default();
        let batch = render_all(
            &ws,
            RenderMode::All,
            &["p".to_string()],
            &RenderConfig::default(),
            &mut printer,
        );

        assert_eq!(batch.attempted, 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].stage, "dual");
        assert_eq!(batch.failures[0].paper, "p");
        assert!(matches!(
            kind_of(&batch.failures[0]),
            Some(Error::MissingSource { .. })
        ));
        assert_eq!(batch.written, vec![ws.output_pdf("p", ReportKind::Summary)]);
        assert!(ws.output_pdf("p", ReportKind::Summary).is_file());
        assert!(!ws.output_pdf("p", ReportKind::Dual).exists());
        // The failed dual report never reached the browser.
        assert_eq!(printer.calls.len(), 1);
    }

    #[test]
    fn test_failure_report_names_paper_and_stage() {
        let (_dir, ws) = workspace();
        let mut printer = FakePrinter::default();
        let batch = render_all(
            &ws,
            RenderMode::Summary,
            &["2401.1".to_string()],
            &RenderConfig::default(),
            &mut printer,
        );
        let message = format!("{:#}", batch.failures[0].report);
        assert!(message.contains("2401.1: summary report"));
    }

    #[test]
    fn test_printer_failure_leaves_no_output() {
        let (_dir, ws) = workspace();
        write(ws.root().join("p_annotated.md"), "text");

        let mut printer = FakePrinter {
            fail: true,
            ..FakePrinter::default()
        };
        let report =
            render_report(&ws, ReportKind::Summary, "p", &RenderConfig::default(), &mut printer)
                .unwrap_err();

        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::RenderTimeout(30))
        ));
        assert!(!ws.output_pdf("p", ReportKind::Summary).exists());
        assert_eq!(leftover_parts(&ws.output_dir()), 0);
    }

    #[test]
    fn test_rerender_is_idempotent() {
        let (_dir, ws) = workspace();
        write_pages(&ws, "p", 2);
        write(ws.translations_dir().join("p.md"), "<!-- PAGE 0 -->$x^2$ and `code`");
        write(ws.root().join("p_annotated.md"), "Summary with $$E = mc^2$$");
        std::fs::create_dir_all(ws.output_dir()).unwrap();
        std::fs::write(ws.output_pdf("p", ReportKind::Dual), b"old").unwrap();

        let names = ["p".to_string()];
        let mut printer = FakePrinter::default();
        for _ in 0..2 {
            let batch = render_all(
                &ws,
                RenderMode::All,
                &names,
                &RenderConfig::default(),
                &mut printer,
            );
            assert!(batch.failures.is_empty());
        }

        assert_eq!(printer.calls.len(), 4);
        assert_eq!(printer.calls[0].0, printer.calls[2].0);
        assert_eq!(printer.calls[1].0, printer.calls[3].0);
        assert_eq!(
            std::fs::read(ws.output_pdf("p", ReportKind::Dual)).unwrap(),
            b"%PDF-1.7 fake"
        );
        assert_eq!(leftover_parts(&ws.output_dir()), 0);
    }

    #[test]
    fn test_katex_base_reaches_document() {
        let (_dir, ws) = workspace();
        write(ws.root().join("p_annotated.md"), "x");
        let config = RenderConfig {
            template: TemplateOptions {
                katex_base: "file:///opt/katex".to_string(),
            },
            ..RenderConfig::default()
        };
        let prepared = prepare(&ws, ReportKind::Summary, "p", &config).unwrap();
        assert!(prepared.html.contains("file:///opt/katex/katex.min.js"));
        assert_eq!(prepared.expected_pages, None);
    }

    #[test]
    fn test_resolve_chrome() {
        assert_eq!(resolve_chrome(None).unwrap(), None);
        assert_eq!(resolve_chrome(Some("  ")).unwrap(), None);
        assert_eq!(
            resolve_chrome(Some("/opt/chrome/chrome")).unwrap(),
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
        assert!(resolve_chrome(Some("definitely-not-a-browser-binary")).is_err());
    }
}
