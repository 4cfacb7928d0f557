use std::path::PathBuf;
use std::time::{Duration, Instant};

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, LaunchOptions, Tab};
use paperpress_core::job::PageSetup;
use paperpress_core::template::{Completion, COMPLETION_STATUS};

use crate::prelude::*;
use crate::render::Printer;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Browser executable; auto-detected when `None`.
    pub chrome: Option<PathBuf>,
    pub sandbox: bool,
    /// Bound on the wait for the document's completion flag.
    pub timeout: Duration,
}

/// A headless Chrome launched on first use and shared by every render of the
/// invocation. Each render gets its own tab. The browser process is killed
/// when the session is dropped.
pub struct BrowserSession {
    options: BrowserOptions,
    browser: Option<Browser>,
}

impl BrowserSession {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            browser: None,
        }
    }

    fn browser(&mut self) -> Result<&Browser> {
        let browser = match self.browser.take() {
            Some(browser) => browser,
            None => launch(&self.options)?,
        };
        Ok(self.browser.insert(browser))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(browser);
            log::debug!("headless browser closed");
        }
    }
}

fn launch(options: &BrowserOptions) -> Result<Browser> {
    log::info!("launching headless browser");
    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(options.sandbox)
        .path(options.chrome.clone())
        // Renders run back to back; keep the connection alive between them.
        .idle_browser_timeout(options.timeout.max(Duration::from_secs(60)) * 4)
        .build()
        .map_err(|e| Error::RenderFailed(f!("Invalid browser options: {e}")))?;

    let browser = Browser::new(launch_options).map_err(|e| {
        Error::RenderFailed(f!(
            "Failed to launch browser: {e}. Make sure Chrome or Chromium is installed."
        ))
    })?;
    Ok(browser)
}

impl Printer for BrowserSession {
    fn print(&mut self, html: &str, setup: PageSetup) -> Result<Vec<u8>> {
        let timeout = self.options.timeout;

        // The page file lives until the tab has printed.
        let page = tempfile::Builder::new()
            .prefix("paperpress-")
            .suffix(".html")
            .tempfile()
            .map_err(Error::from)?;
        std::fs::write(page.path(), html).map_err(Error::from)?;
        let url = f!("file://{}", page.path().display());

        let tab = self
            .browser()?
            .new_tab()
            .map_err(|e| Error::RenderFailed(f!("Failed to create new tab: {e}")))?;
        tab.set_default_timeout(timeout);

        let result = print_tab(&tab, &url, setup, timeout);
        if let Err(e) = tab.close(true) {
            log::debug!("failed to close tab: {e}");
        }
        result
    }
}

fn print_tab(tab: &Tab, url: &str, setup: PageSetup, timeout: Duration) -> Result<Vec<u8>> {
    // Navigation and typesetting share one budget.
    let deadline = Instant::now() + timeout;
    tab.navigate_to(url)
        .map_err(|e| navigation_error(&*e, timeout, f!("Failed to navigate to {url}")))?
        .wait_until_navigated()
        .map_err(|e| navigation_error(&*e, timeout, "Failed to wait for navigation".into()))?;

    wait_for_completion(tab, deadline, timeout)?;

    let options = PrintToPdfOptions {
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        paper_width: Some(setup.width_in),
        paper_height: Some(setup.height_in),
        margin_top: Some(setup.margin_in),
        margin_bottom: Some(setup.margin_in),
        margin_left: Some(setup.margin_in),
        margin_right: Some(setup.margin_in),
        ..Default::default()
    };
    let bytes = tab
        .print_to_pdf(Some(options))
        .map_err(|e| Error::RenderFailed(f!("Failed to print to PDF: {e}")))?;
    Ok(bytes)
}

/// A navigation that ran out of time is a timeout; anything else is a failure.
fn navigation_error(
    err: &(dyn std::error::Error + 'static),
    timeout: Duration,
    context: String,
) -> Error {
    let timed_out = std::iter::successors(Some(err), |e| e.source()).any(|e| e.is::<Timeout>());
    if timed_out {
        Error::RenderTimeout(timeout.as_secs())
    } else {
        Error::RenderFailed(f!("{context}: {err}"))
    }
}

/// Poll the document until it reports done or failed, or `deadline` passes.
fn wait_for_completion(tab: &Tab, deadline: Instant, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        let status = tab
            .evaluate(COMPLETION_STATUS, false)
            .map_err(|e| Error::RenderFailed(f!("Failed to query document state: {e}")))?;
        match Completion::from_status(status.value.as_ref().and_then(|v| v.as_str())) {
            Completion::Done { overflowing } => {
                log::debug!("document ready after {:?}", start.elapsed());
                warn_clipped(&overflowing);
                return Ok(());
            }
            Completion::Failed(reason) => {
                return Err(Error::RenderFailed(f!("Document failed to render: {reason}")).into())
            }
            Completion::Pending => {}
        }

        if Instant::now() >= deadline {
            return Err(Error::RenderTimeout(timeout.as_secs()).into());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn warn_clipped(pages: &[usize]) {
    if pages.is_empty() {
        return;
    }
    let list = pages
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    log::warn!(
        "{} page(s) still overflow at the minimum font size and are clipped: {list}",
        pages.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("while waiting: {source}")]
    struct Wrapped {
        source: Timeout,
    }

    #[test]
    fn test_navigation_timeout_is_render_timeout() {
        let err = navigation_error(&Timeout, Duration::from_secs(30), "nav".into());
        assert!(matches!(err, Error::RenderTimeout(30)));
    }

    #[test]
    fn test_wrapped_navigation_timeout_is_render_timeout() {
        let err = navigation_error(
            &Wrapped { source: Timeout },
            Duration::from_secs(5),
            "nav".into(),
        );
        assert!(matches!(err, Error::RenderTimeout(5)));
    }

    #[test]
    fn test_other_navigation_errors_are_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "socket closed");
        match navigation_error(&io, Duration::from_secs(30), "Failed to navigate".into()) {
            Error::RenderFailed(msg) => {
                assert_eq!(msg, "Failed to navigate: socket closed")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
