//! Complete HTML documents handed to the headless browser.
//!
//! Both report kinds load KaTeX and typeset math in the page. When the
//! document is ready to print it sets `window.__paperpressDone`; if KaTeX
//! cannot be loaded it sets `window.__paperpressError` instead. The shell
//! polls [`COMPLETION_STATUS`] and interprets the result with
//! [`Completion::from_status`].

use crate::math::LITERAL_DOLLAR_CLASS;
use crate::spread::{Spread, Translation};

pub const KATEX_CDN: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.22/dist";

/// Text shown in the original column of a page the extractor found empty.
pub const EMPTY_ORIGINAL: &str = "(no extractable text on this page)";

/// Evaluated in the page; yields `"done:<pages>"`, `"pending"` or
/// `"error:<why>"`. `<pages>` lists, comma separated, the 1-based numbers of
/// spreads whose columns still overflow at the smallest font size.
pub const COMPLETION_STATUS: &str = "(function () {\
 if (window.__paperpressError) { return 'error:' + window.__paperpressError; }\
 if (window.__paperpressDone !== true) { return 'pending'; }\
 return 'done:' + (window.__paperpressOverflow || []).join(',');\
 })()";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Pending,
    /// Ready to print. `overflowing` holds the page numbers whose columns are
    /// clipped, sorted and without duplicates.
    Done { overflowing: Vec<usize> },
    Failed(String),
}

impl Completion {
    pub fn from_status(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Completion::Pending;
        };
        if let Some(reason) = value.strip_prefix("error:") {
            return Completion::Failed(reason.to_string());
        }
        match value.strip_prefix("done") {
            Some(rest) => {
                let mut overflowing: Vec<usize> = rest
                    .trim_start_matches(':')
                    .split(',')
                    .filter_map(|n| n.trim().parse().ok())
                    .collect();
                overflowing.sort_unstable();
                overflowing.dedup();
                Completion::Done { overflowing }
            }
            None => Completion::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Directory URL holding `katex.min.css`, `katex.min.js` and
    /// `contrib/auto-render.min.js`.
    pub katex_base: String,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            katex_base: KATEX_CDN.to_string(),
        }
    }
}

const BASE_CSS: &str = r#"
body {
  font-family: "Noto Sans CJK SC", "PingFang SC", "Microsoft YaHei", "Hiragino Sans GB", sans-serif;
  color: #1b1b1b;
  line-height: 1.65;
  overflow-wrap: break-word;
  margin: 0;
}
h1 { font-size: 1.55em; margin: 0.9em 0 0.45em; }
h2 { font-size: 1.33em; margin: 0.8em 0 0.4em; }
h3 { font-size: 1.15em; margin: 0.7em 0 0.35em; }
h4, h5, h6 { font-size: 1.05em; margin: 0.6em 0 0.3em; }
p { margin: 0.4em 0; }
blockquote {
  margin: 0.6em 0; padding: 0.5em 0.9em;
  border-left: 3pt solid #3a66c4; background: #eef1fa; color: #1d3666;
}
table { border-collapse: collapse; width: 100%; font-size: 0.8em; margin: 0.6em 0; }
th, td { border: 0.5pt solid #c8c8c8; padding: 0.25em 0.45em; text-align: left; }
th { background: #e1e5ef; }
tr:nth-child(even) { background: #f7f7f7; }
pre { background: #f4f4f4; padding: 0.6em 0.8em; font-size: 0.85em; line-height: 1.4; white-space: pre-wrap; word-break: break-all; }
code { font-family: "SF Mono", Menlo, "DejaVu Sans Mono", monospace; font-size: 0.9em; background: #f0f0f0; padding: 0 0.25em; }
pre code { background: none; padding: 0; }
hr { border: none; border-top: 0.5pt solid #c8c8c8; margin: 0.8em 0; }
img { max-width: 100%; }
.katex-display { margin: 0.6em 0; padding: 0.3em 0.7em; background: #f8f8f1; border-left: 2pt solid #5b9a5b; overflow-x: hidden; }
.placeholder { color: #8a8a8a; font-style: italic; }
"#;

const SUMMARY_CSS: &str = r#"
@page { size: A4; margin: 0.4in; }
body { font-size: 9pt; }
"#;

const DUAL_CSS: &str = r#"
@page { size: 1190.56pt 841.89pt; margin: 0; }
.spread {
  position: relative;
  width: 1190.56pt; height: 841pt;
  display: flex; overflow: hidden;
  break-after: page; page-break-after: always;
}
.spread:last-child { break-after: auto; page-break-after: auto; }
.column { box-sizing: border-box; width: 595.28pt; height: 815pt; padding: 26pt 26pt 0; overflow: hidden; font-size: 9pt; }
.original { border-right: 0.8pt solid #cccccc; }
.original pre.source { background: none; padding: 0; margin: 0; font-family: "Times New Roman", "Noto Serif", serif; font-size: 1em; line-height: 1.35; word-break: normal; }
.folio { position: absolute; bottom: 10pt; left: 0; width: 100%; text-align: center; font-size: 7pt; color: #808080; }
"#;

/// Shrinks `.fit` columns until they stop overflowing, records the spreads
/// that still overflow at the floor, then signals done.
const READY_SCRIPT: &str = r#"
function paperpressFit() {
  var px = 96 / 72, floor = 5 * px, step = 0.25 * px, clipped = [];
  document.querySelectorAll('.fit').forEach(function (el) {
    var size = parseFloat(getComputedStyle(el).fontSize);
    while (el.scrollHeight > el.clientHeight + 1 && size > floor) {
      size = Math.max(floor, size - step);
      el.style.fontSize = size + 'px';
    }
    if (el.scrollHeight > el.clientHeight + 1) {
      var spread = el.closest('.spread');
      clipped.push(spread ? Number(spread.dataset.page) : 0);
    }
  });
  return clipped;
}
document.addEventListener('DOMContentLoaded', function () {
  try {
    if (typeof renderMathInElement !== 'function') {
      window.__paperpressError = window.__paperpressError || 'math renderer unavailable';
      return;
    }
    renderMathInElement(document.body, {
      delimiters: [
        {left: '$$', right: '$$', display: true},
        {left: '$', right: '$', display: false}
      ],
      ignoredClasses: ['%%LITERAL%%'],
      throwOnError: false
    });
    document.fonts.ready.then(function () {
      window.__paperpressOverflow = paperpressFit();
      window.__paperpressDone = true;
    });
  } catch (e) {
    window.__paperpressError = String(e);
  }
});
"#;

fn head(title: &str, page_css: &str, opts: &TemplateOptions) -> String {
    let base = opts.katex_base.trim_end_matches('/');
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{}</title>\n",
        html_escape::encode_text(title)
    ));
    html.push_str(&format!(
        "<link rel=\"stylesheet\" href=\"{base}/katex.min.css\">\n"
    ));
    html.push_str(&format!(
        "<script defer src=\"{base}/katex.min.js\" onerror=\"window.__paperpressError='katex failed to load'\"></script>\n"
    ));
    html.push_str(&format!(
        "<script defer src=\"{base}/contrib/auto-render.min.js\" onerror=\"window.__paperpressError='katex auto-render failed to load'\"></script>\n"
    ));
    html.push_str("<script>");
    html.push_str(&READY_SCRIPT.replace("%%LITERAL%%", LITERAL_DOLLAR_CLASS));
    html.push_str("</script>\n<style>");
    html.push_str(BASE_CSS);
    html.push_str(page_css);
    html.push_str("</style>\n</head>\n");
    html
}

/// A single flowing document for the condensed analysis.
pub fn summary_document(title: &str, body_html: &str, opts: &TemplateOptions) -> String {
    let mut html = head(title, SUMMARY_CSS, opts);
    html.push_str("<body>\n");
    html.push_str(body_html);
    html.push_str("\n</body>\n</html>\n");
    html
}

/// One landscape spread per page: original text left, translation right.
pub fn dual_document(title: &str, spreads: &[Spread], opts: &TemplateOptions) -> String {
    let mut html = head(title, DUAL_CSS, opts);
    html.push_str("<body>\n");
    for spread in spreads {
        push_spread(&mut html, spread);
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn push_spread(html: &mut String, spread: &Spread) {
    html.push_str(&format!(
        "<section class=\"spread\" data-page=\"{}\">\n",
        spread.number()
    ));

    html.push_str("<div class=\"column original fit\">");
    if spread.original_text.trim().is_empty() {
        html.push_str(&format!("<p class=\"placeholder\">{EMPTY_ORIGINAL}</p>"));
    } else {
        html.push_str("<pre class=\"source\">");
        html.push_str(&html_escape::encode_text(&spread.original_text));
        html.push_str("</pre>");
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"column translation fit\">");
    match &spread.translation {
        Translation::Html(body) => html.push_str(body),
        Translation::Missing(text) => html.push_str(&format!(
            "<p class=\"placeholder\">{}</p>",
            html_escape::encode_text(text)
        )),
    }
    html.push_str("</div>\n");

    html.push_str(&format!(
        "<footer class=\"folio\">{}</footer>\n</section>\n",
        spread.number()
    ));
}
