use unicode_normalization::UnicodeNormalization;

const LIGATURES: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Character-level cleanup of extracted page text.
///
/// NFC normalization, ligature expansion, removal of U+FFFD and NUL, and
/// trailing-space trimming per line. Line structure is left as extracted.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfc() {
        match c {
            '\u{FFFD}' | '\0' => {}
            c => match LIGATURES.iter().find(|(lig, _)| *lig == c) {
                Some((_, expanded)) => out.push_str(expanded),
                None => out.push(c),
            },
        }
    }

    out.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}
