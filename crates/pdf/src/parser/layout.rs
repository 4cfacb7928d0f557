//! Page text in reading order.
//!
//! ```text
//! content ops  ->  Span[]  ->  Line[]  ->  String
//!                  page_spans  group_lines  join
//! ```
//!
//! Positions come from the text matrix only; glyph widths are estimated from
//! the font size since the widths arrays are not consulted.

use super::backend::{decode_bytes, FontInfo, Op, Operand, PageId, PageSource};
use crate::PdfError;

/// A run of text placed at one position.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
}

/// Spans sharing a baseline, sorted left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub y: f32,
    pub spans: Vec<Span>,
}

/// Baselines closer than this are the same line.
const Y_TOLERANCE: f32 = 1.0;

/// Estimated glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f32 = 0.5;

/// Horizontal gap (points) between spans that reads as a word break.
const MIN_WORD_GAP: f32 = 1.5;

/// TJ adjustments wider than this fraction of a glyph insert a space.
const TJ_SPACE_RATIO: f32 = 0.3;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `true` for scripts written without inter-word spaces.
pub fn is_spaceless(c: char) -> bool {
    matches!(
        c as u32,
        0x3000..=0x303F     // CJK symbols and punctuation
        | 0x3040..=0x30FF   // Hiragana, Katakana
        | 0x31F0..=0x31FF   // Katakana extensions
        | 0x3130..=0x318F   // Hangul compatibility jamo
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK compatibility ideographs
        | 0xFF00..=0xFFEF   // Fullwidth forms
        | 0x1100..=0x11FF   // Hangul jamo
        | 0x0E00..=0x0EFF   // Thai, Lao
        | 0x20000..=0x2A6DF // CJK extension B
    )
}

#[derive(Debug, Clone)]
struct TextState {
    /// Index of the current font in the page's font list.
    font: Option<usize>,
    font_size: f32,
    tm: [f32; 6],
    tlm: [f32; 6],
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            tm: IDENTITY,
            tlm: IDENTITY,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn x(&self) -> f32 {
        self.tm[4]
    }

    fn y(&self) -> f32 {
        self.tm[5] + self.rise
    }

    /// Font size scaled by the text matrix.
    fn rendered_size(&self) -> f32 {
        (self.font_size * (self.tm[1].powi(2) + self.tm[3].powi(2)).sqrt()).abs()
    }

    fn glyph_width(&self) -> f32 {
        self.font_size * CHAR_WIDTH_RATIO * self.horiz_scale
    }

    fn advance(&mut self, dx: f32) {
        self.tm[4] += dx * self.tm[0];
        self.tm[5] += dx * self.tm[1];
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm[4] += self.tlm[0] * tx + self.tlm[2] * ty;
        self.tlm[5] += self.tlm[1] * tx + self.tlm[3] * ty;
        self.tm = self.tlm;
    }

    fn set_font(&mut self, op: &Op, fonts: &[FontInfo<'_>]) {
        let Some(Operand::Name(key)) = op.operands.first() else {
            return;
        };
        self.font_size = op.number(1).unwrap_or(0.0);
        self.font = fonts.iter().position(|f| &f.key == key);
    }

    fn decode(&self, operand: &Operand, fonts: &[FontInfo<'_>]) -> String {
        let Operand::Bytes(bytes) = operand else {
            return String::new();
        };
        match self.font.and_then(|i| fonts.get(i)) {
            Some(font) => font.decode(bytes),
            None => decode_bytes(bytes, None),
        }
    }

    /// Move past `text` as if it had been painted. Returns the distance
    /// travelled in user space.
    fn advance_over(&mut self, text: &str) -> f32 {
        let dx: f32 = text
            .chars()
            .map(|c| {
                let spacing = if c == ' ' { self.word_spacing } else { 0.0 };
                self.glyph_width() + self.char_spacing + spacing
            })
            .sum();
        self.advance(dx);
        dx * self.tm[0].hypot(self.tm[1])
    }

    fn span(&self, text: String, x: f32, y: f32, width: f32) -> Span {
        Span {
            text,
            x,
            y,
            width,
            font_size: self.rendered_size(),
        }
    }
}

/// Run the text-state machine over one page and collect its spans.
pub fn page_spans(source: &dyn PageSource, page: PageId) -> Result<Vec<Span>, PdfError> {
    let ops = source.operations(page)?;
    let fonts = source.fonts(page);
    Ok(spans_from_ops(&ops, &fonts))
}

pub fn spans_from_ops(ops: &[Op], fonts: &[FontInfo<'_>]) -> Vec<Span> {
    let mut state = TextState::default();
    let mut spans = Vec::new();

    for op in ops {
        match op.operator.as_str() {
            "BT" => {
                state.tm = IDENTITY;
                state.tlm = IDENTITY;
            }
            "Tf" => state.set_font(op, fonts),
            "Tm" => {
                let m: Vec<f32> = op.operands.iter().filter_map(Operand::number).collect();
                if let [a, b, c, d, e, f] = m[..] {
                    state.tm = [a, b, c, d, e, f];
                    state.tlm = state.tm;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    state.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    state.leading = -ty;
                    state.next_line(tx, ty);
                }
            }
            "T*" => state.next_line(0.0, -state.leading),
            "TL" => state.leading = op.number(0).unwrap_or(state.leading),
            "Tc" => state.char_spacing = op.number(0).unwrap_or(state.char_spacing),
            "Tw" => state.word_spacing = op.number(0).unwrap_or(state.word_spacing),
            "Tz" => {
                if let Some(scale) = op.number(0) {
                    state.horiz_scale = scale / 100.0;
                }
            }
            "Ts" => state.rise = op.number(0).unwrap_or(state.rise),
            "Tj" => {
                if let Some(operand) = op.operands.first() {
                    show(operand, fonts, &mut state, &mut spans);
                }
            }
            "'" => {
                state.next_line(0.0, -state.leading);
                if let Some(operand) = op.operands.first() {
                    show(operand, fonts, &mut state, &mut spans);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac), Some(operand)) =
                    (op.number(0), op.number(1), op.operands.get(2))
                {
                    state.word_spacing = aw;
                    state.char_spacing = ac;
                    state.next_line(0.0, -state.leading);
                    show(operand, fonts, &mut state, &mut spans);
                }
            }
            "TJ" => {
                if let Some(Operand::Array(items)) = op.operands.first() {
                    show_array(items, fonts, &mut state, &mut spans);
                }
            }
            _ => {}
        }
    }

    spans
}

fn show(
    operand: &Operand,
    fonts: &[FontInfo<'_>],
    state: &mut TextState,
    spans: &mut Vec<Span>,
) {
    let text = state.decode(operand, fonts);
    if text.is_empty() {
        return;
    }
    let (x, y) = (state.x(), state.y());
    let width = state.advance_over(&text);
    spans.push(state.span(text, x, y, width));
}

/// `TJ` mixes strings with kerning in thousandths of a text-space unit;
/// wide negative kerning is a word gap.
fn show_array(
    items: &[Operand],
    fonts: &[FontInfo<'_>],
    state: &mut TextState,
    spans: &mut Vec<Span>,
) {
    let (x, y) = (state.x(), state.y());
    let mut buf = String::new();

    for item in items {
        match item {
            Operand::Number(adjust) => {
                let dx = -adjust / 1000.0 * state.font_size * state.horiz_scale;
                if dx > state.glyph_width() * TJ_SPACE_RATIO && !buf.is_empty() && !buf.ends_with(' ') {
                    buf.push(' ');
                }
                state.advance(dx);
            }
            other => {
                let fragment = state.decode(other, fonts);
                state.advance_over(&fragment);
                buf.push_str(&fragment);
            }
        }
    }

    let text = buf.trim_end();
    if !text.is_empty() {
        let width = (state.x() - x).hypot(state.y() - y);
        spans.push(state.span(text.to_string(), x, y, width));
    }
}

/// Bucket spans into lines, top of page first, each line left to right.
pub fn group_lines(mut spans: Vec<Span>) -> Vec<Line> {
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Line> = Vec::new();
    for span in spans {
        match lines.last_mut() {
            Some(line) if (line.y - span.y).abs() <= Y_TOLERANCE => line.spans.push(span),
            _ => lines.push(Line {
                y: span.y,
                spans: vec![span],
            }),
        }
    }
    for line in &mut lines {
        line.spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

impl Line {
    /// Join spans, adding a space where a visible gap separates them.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&Span> = None;
        for span in &self.spans {
            if let Some(p) = prev {
                if needs_space(p, span) {
                    out.push(' ');
                }
            }
            out.push_str(&span.text);
            prev = Some(span);
        }
        out
    }
}

fn needs_space(prev: &Span, next: &Span) -> bool {
    let (Some(last), Some(first)) = (prev.text.chars().next_back(), next.text.chars().next())
    else {
        return false;
    };
    if last.is_whitespace() || first.is_whitespace() {
        return false;
    }
    if is_spaceless(last) && is_spaceless(first) {
        return false;
    }
    let gap = next.x - (prev.x + prev.width);
    gap >= MIN_WORD_GAP || gap <= -prev.font_size.max(1.0)
}

/// Page text: one output line per baseline.
pub fn page_text(spans: Vec<Span>) -> String {
    group_lines(spans)
        .iter()
        .map(Line::text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Operand {
        Operand::Name(s.as_bytes().to_vec())
    }

    fn text(s: &str) -> Operand {
        Operand::Bytes(s.as_bytes().to_vec())
    }

    fn num(n: f32) -> Operand {
        Operand::Number(n)
    }

    fn tf(size: f32) -> Op {
        Op::new("Tf", vec![name("F1"), num(size)])
    }

    fn tm(x: f32, y: f32) -> Op {
        Op::new("Tm", vec![num(1.0), num(0.0), num(0.0), num(1.0), num(x), num(y)])
    }

    fn tj(s: &str) -> Op {
        Op::new("Tj", vec![text(s)])
    }

    fn extract(ops: Vec<Op>) -> String {
        page_text(spans_from_ops(&ops, &[]))
    }

    #[test]
    fn test_lines_top_to_bottom() {
        let ops = vec![
            Op::new("BT", vec![]),
            tf(10.0),
            Op::new("Td", vec![num(72.0), num(700.0)]),
            tj("Hello"),
            Op::new("Td", vec![num(0.0), num(-14.0)]),
            tj("World"),
            Op::new("ET", vec![]),
        ];
        assert_eq!(extract(ops), "Hello\nWorld");
    }

    #[test]
    fn test_stream_order_does_not_matter() {
        let ops = vec![
            Op::new("BT", vec![]),
            tf(10.0),
            tm(72.0, 600.0),
            tj("second"),
            tm(72.0, 700.0),
            tj("first"),
            Op::new("ET", vec![]),
        ];
        assert_eq!(extract(ops), "first\nsecond");
    }

    #[test]
    fn test_same_baseline_left_to_right() {
        let ops = vec![
            Op::new("BT", vec![]),
            tf(10.0),
            tm(300.0, 700.0),
            tj("Right"),
            tm(72.0, 700.4),
            tj("Left"),
            Op::new("ET", vec![]),
        ];
        assert_eq!(extract(ops), "Left Right");
    }

    #[test]
    fn test_adjacent_spans_join_without_space() {
        // "Hel" at 10pt is 15pt wide, so "lo" at x+15 touches it.
        let ops = vec![tf(10.0), tm(100.0, 500.0), tj("Hel"), tm(115.0, 500.0), tj("lo")];
        assert_eq!(extract(ops), "Hello");
    }

    #[test]
    fn test_tj_kerning_becomes_space() {
        let ops = vec![
            Op::new("BT", vec![]),
            tf(10.0),
            tm(72.0, 700.0),
            Op::new(
                "TJ",
                vec![Operand::Array(vec![
                    text("Hel"),
                    num(-20.0),
                    text("lo"),
                    num(-600.0),
                    text("there"),
                ])],
            ),
            Op::new("ET", vec![]),
        ];
        assert_eq!(extract(ops), "Hello there");
    }

    #[test]
    fn test_t_star_uses_leading() {
        let ops = vec![
            Op::new("BT", vec![]),
            tf(10.0),
            Op::new("TL", vec![num(12.0)]),
            tm(72.0, 700.0),
            tj("one"),
            Op::new("T*", vec![]),
            tj("two"),
            Op::new("'", vec![text("three")]),
        ];
        assert_eq!(extract(ops), "one\ntwo\nthree");
    }

    #[test]
    fn test_td_sets_leading() {
        let ops = vec![
            tf(10.0),
            Op::new("TD", vec![num(72.0), num(700.0)]),
            tj("a"),
            Op::new("TD", vec![num(0.0), num(-12.0)]),
            tj("b"),
            Op::new("T*", vec![]),
            tj("c"),
        ];
        let spans = spans_from_ops(&ops, &[]);
        assert_eq!(spans[1].y, 688.0);
        assert_eq!(spans[2].y, 676.0);
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let fonts = vec![FontInfo {
            key: b"F1".to_vec(),
            base_font: Some("SimSun".to_string()),
            encoding: Some("Identity-H".to_string()),
            decoder: None,
        }];
        let ops = vec![
            tf(10.0),
            tm(72.0, 700.0),
            Op::new("Tj", vec![Operand::Bytes(vec![0x4E, 0x2D, 0x65, 0x87])]),
            tm(90.0, 700.0),
            Op::new("Tj", vec![Operand::Bytes(vec![0x5B, 0x57, 0x7B, 0x26])]),
        ];
        assert_eq!(page_text(spans_from_ops(&ops, &fonts)), "中文字符");
    }

    #[test]
    fn test_scaled_matrix_span_width() {
        // 1pt font under a 10x matrix: "Hel" covers 15pt, so "lo" lands flush.
        let ops = vec![
            Op::new("BT", vec![]),
            tf(1.0),
            Op::new("Tm", vec![num(10.0), num(0.0), num(0.0), num(10.0), num(72.0), num(700.0)]),
            tj("Hel"),
            tj("lo"),
            Op::new("ET", vec![]),
        ];
        let spans = spans_from_ops(&ops, &[]);
        assert_eq!(spans[0].width, 15.0);
        assert_eq!(page_text(spans), "Hello");
    }

    #[test]
    fn test_scaled_matrix_tj_width() {
        let ops = vec![
            tf(1.0),
            Op::new("Tm", vec![num(10.0), num(0.0), num(0.0), num(10.0), num(72.0), num(700.0)]),
            Op::new("TJ", vec![Operand::Array(vec![text("Hel"), num(-100.0), text("lo")])]),
            tj("!"),
        ];
        let spans = spans_from_ops(&ops, &[]);
        assert!((spans[0].width - 26.0).abs() < 1e-3);
        assert_eq!(page_text(spans), "Hello!");
    }

    #[test]
    fn test_text_rise_and_scaled_matrix() {
        let ops = vec![
            tf(1.0),
            Op::new("Tm", vec![num(12.0), num(0.0), num(0.0), num(12.0), num(50.0), num(400.0)]),
            Op::new("Ts", vec![num(3.0)]),
            tj("x"),
        ];
        let spans = spans_from_ops(&ops, &[]);
        assert_eq!(spans[0].font_size, 12.0);
        assert_eq!(spans[0].y, 403.0);
    }

    #[test]
    fn test_non_text_operators_ignored() {
        let ops = vec![
            Op::new("re", vec![num(0.0), num(0.0), num(10.0), num(10.0)]),
            Op::new("f", vec![]),
        ];
        assert_eq!(extract(ops), "");
    }

    #[test]
    fn test_is_spaceless() {
        assert!(is_spaceless('中'));
        assert!(is_spaceless('か'));
        assert!(is_spaceless('한'));
        assert!(!is_spaceless('a'));
        assert!(!is_spaceless('é'));
    }
}
