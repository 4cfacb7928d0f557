use crate::prelude::{eprintln, *};
use clap::Parser;
use colored::Colorize;

mod error;
mod extract;
mod output;
mod prelude;
mod render;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Extract page text from papers and render translated Markdown into PDF reports"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "PAPERPRESS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract per-page text from source PDFs into JSON
    Extract(crate::extract::App),

    /// Render dual, summary or all reports to PDF with headless Chrome
    Render(crate::render::App),
}

/// One failed unit of work in a batch run.
#[derive(Debug)]
pub struct Failure {
    pub paper: String,
    pub stage: &'static str,
    pub report: color_eyre::eyre::Report,
}

impl Failure {
    pub fn new(paper: &str, stage: &'static str, report: color_eyre::eyre::Report) -> Self {
        Self {
            paper: paper.to_string(),
            stage,
            report,
        }
    }
}

/// Print every failure and turn a non-empty list into an error.
pub fn finish(failures: &[Failure], attempted: usize) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    for failure in failures {
        eprintln!(
            "{} {} [{}]: {:#}",
            "failed".red().bold(),
            failure.paper,
            failure.stage,
            failure.report
        );
    }
    Err(eyre!("{} of {} tasks failed", failures.len(), attempted))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Extract(sub_app) => crate::extract::run(sub_app, app.global).await,
        SubCommands::Render(sub_app) => crate::render::run(sub_app, app.global).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_ok_without_failures() {
        assert!(finish(&[], 3).is_ok());
    }

    #[test]
    fn test_finish_counts_failures() {
        let failures = vec![Failure::new("p", "dual", eyre!("boom"))];
        let err = finish(&failures, 2).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 tasks failed");
    }

    #[test]
    fn test_cli_parses_render() {
        let app = App::try_parse_from(["paperpress", "render", "/tmp/wd", "all", "2401.1"]).unwrap();
        assert!(matches!(app.command, SubCommands::Render(_)));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(App::try_parse_from(["paperpress", "render", "/tmp/wd", "both"]).is_err());
    }
}
