//! Markdown to HTML conversion with LaTeX passed through untouched.

use pulldown_cmark::{html, Options, Parser};

use crate::math;

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Convert a Markdown document to an HTML fragment.
///
/// Formulas come out as their original `$…$`/`$$…$$` source (HTML-escaped)
/// for client-side typesetting.
pub fn to_html(markdown: &str) -> String {
    let shielded = math::shield(markdown);
    let mut out = String::with_capacity(shielded.text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(&shielded.text, options()));
    shielded.restore(&out)
}
