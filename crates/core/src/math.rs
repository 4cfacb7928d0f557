//! Shielding LaTeX from the Markdown converter.
//!
//! Markdown treats `_`, `*` and `\` specially, which mangles formulas like
//! `$a_i * b_i$`. Before conversion every formula is swapped for an opaque
//! token; after conversion the tokens are replaced with the original LaTeX,
//! HTML-escaped, so KaTeX can typeset it in the browser.
//!
//! Recognised delimiters:
//!
//! | source      | meaning                                  |
//! |-------------|------------------------------------------|
//! | `$$ … $$`   | display math, may span lines             |
//! | `$ … $`     | inline math, must close on the same line |
//! | `\$`        | a literal dollar sign                    |
//!
//! Fenced code blocks and inline code spans are left alone.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

/// CSS class KaTeX auto-render is told to skip; wraps literal dollars.
pub const LITERAL_DOLLAR_CLASS: &str = "literal-dollar";

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("token pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stashed {
    /// Full `$$…$$` source including delimiters.
    Display(String),
    /// Full `$…$` source including delimiters.
    Inline(String),
    /// An escaped `\$`.
    Dollar,
}

/// Markdown with formulas replaced by tokens, plus what the tokens stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shielded {
    pub text: String,
    pub stash: Vec<Stashed>,
}

impl Shielded {
    /// Put the stashed formulas back into converted HTML.
    pub fn restore(&self, html: &str) -> String {
        if self.stash.is_empty() {
            return html.to_string();
        }
        TOKEN
            .replace_all(html, |caps: &Captures| {
                let item = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.stash.get(i));
                match item {
                    Some(Stashed::Display(src)) | Some(Stashed::Inline(src)) => {
                        html_escape::encode_text(src).into_owned()
                    }
                    Some(Stashed::Dollar) => {
                        format!("<span class=\"{LITERAL_DOLLAR_CLASS}\">$</span>")
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Replace every formula in `markdown` with a token.
pub fn shield(markdown: &str) -> Shielded {
    let mut out = Shielded {
        text: String::with_capacity(markdown.len()),
        stash: Vec::new(),
    };
    let mut fence: Option<(char, usize)> = None;
    let mut prose = String::new();

    for line in markdown.split_inclusive('\n') {
        match fence {
            Some((ch, len)) => {
                out.text.push_str(line);
                if fence_marker(line).is_some_and(|(c, l)| c == ch && l >= len) {
                    fence = None;
                }
            }
            None => {
                if let Some(marker) = fence_marker(line) {
                    shield_prose(&std::mem::take(&mut prose), &mut out);
                    out.text.push_str(line);
                    fence = Some(marker);
                } else {
                    prose.push_str(line);
                }
            }
        }
    }
    shield_prose(&prose, &mut out);

    out
}

/// Byte ranges of fenced code blocks, fence lines included. An unclosed
/// fence runs to the end of `markdown`.
pub(crate) fn fenced_ranges(markdown: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, char, usize)> = None;
    let mut offset = 0;

    for line in markdown.split_inclusive('\n') {
        let end = offset + line.len();
        match open {
            Some((start, ch, len)) => {
                if fence_marker(line).is_some_and(|(c, l)| c == ch && l >= len) {
                    ranges.push(start..end);
                    open = None;
                }
            }
            None => {
                if let Some((ch, len)) = fence_marker(line) {
                    open = Some((offset, ch, len));
                }
            }
        }
        offset = end;
    }
    if let Some((start, _, _)) = open {
        ranges.push(start..markdown.len());
    }

    ranges
}

/// `Some((fence_char, run_length))` when `line` opens or closes a code fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = rest.chars().take_while(|c| *c == ch).count();
    (run >= 3).then_some((ch, run))
}

fn push_token(out: &mut Shielded, item: Stashed) {
    out.text.push(TOKEN_OPEN);
    out.text.push_str(&out.stash.len().to_string());
    out.text.push(TOKEN_CLOSE);
    out.stash.push(item);
}

fn shield_prose(prose: &str, out: &mut Shielded) {
    let chars: Vec<char> = prose.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&'$') => {
                push_token(out, Stashed::Dollar);
                i += 2;
            }
            '\\' => {
                out.text.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    out.text.push(next);
                }
                i += 2;
            }
            '`' => {
                let run = chars[i..].iter().take_while(|c| **c == '`').count();
                match find_backtick_run(&chars, i + run, run) {
                    Some(close) => {
                        out.text.extend(&chars[i..close + run]);
                        i = close + run;
                    }
                    None => {
                        out.text.extend(&chars[i..i + run]);
                        i += run;
                    }
                }
            }
            '$' if chars.get(i + 1) == Some(&'$') => match find_display_close(&chars, i + 2) {
                Some(close) => {
                    let src: String = chars[i..close + 2].iter().collect();
                    push_token(out, Stashed::Display(src));
                    i = close + 2;
                }
                None => {
                    out.text.push_str("$$");
                    i += 2;
                }
            },
            '$' => match find_inline_close(&chars, i + 1) {
                Some(close) => {
                    let src: String = chars[i..=close].iter().collect();
                    push_token(out, Stashed::Inline(src));
                    i = close + 1;
                }
                None => {
                    out.text.push('$');
                    i += 1;
                }
            },
            c => {
                out.text.push(c);
                i += 1;
            }
        }
    }
}

fn find_backtick_run(chars: &[char], from: usize, run: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        if chars[j] == '`' {
            let len = chars[j..].iter().take_while(|c| **c == '`').count();
            if len == run {
                return Some(j);
            }
            j += len;
        } else {
            j += 1;
        }
    }
    None
}

fn find_display_close(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '$' if chars[j + 1] == '$' => return (j > from).then_some(j),
            _ => j += 1,
        }
    }
    None
}

fn find_inline_close(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\n' => return None,
            '\\' => j += 2,
            '$' => return (j > from).then_some(j),
            _ => j += 1,
        }
    }
    None
}
