use lopdf::content::Content;

use crate::PdfError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// Font resource as seen from a page.
#[derive(Debug)]
pub struct FontInfo<'a> {
    /// Resource key used by `Tf`, e.g. `b"F1"`.
    pub key: Vec<u8>,
    pub base_font: Option<String>,
    /// Encoding name when declared as a name (`WinAnsiEncoding`, `Identity-H`).
    pub encoding: Option<String>,
    /// lopdf's decoder for this font: the ToUnicode CMap or a standard
    /// one-byte table. `None` when lopdf cannot build one.
    pub decoder: Option<lopdf::Encoding<'a>>,
}

impl FontInfo<'_> {
    /// Text for the bytes of a string operand shown with this font.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(decoder) = &self.decoder {
            match lopdf::Document::decode_text(decoder, bytes) {
                Ok(text) => return text,
                Err(e) => log::debug!("font decoder failed, guessing the encoding: {e}"),
            }
        }
        decode_bytes(bytes, self.encoding.as_deref())
    }
}

/// Content-stream operand reduced to what text extraction looks at.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f32),
    Bytes(Vec<u8>),
    Name(Vec<u8>),
    Array(Vec<Operand>),
    Other,
}

impl Operand {
    pub fn number(&self) -> Option<f32> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn from_object(obj: &lopdf::Object) -> Self {
        match obj {
            lopdf::Object::Integer(i) => Operand::Number(*i as f32),
            lopdf::Object::Real(f) => Operand::Number(*f),
            lopdf::Object::String(bytes, _) => Operand::Bytes(bytes.clone()),
            lopdf::Object::Name(name) => Operand::Name(name.clone()),
            lopdf::Object::Array(items) => {
                Operand::Array(items.iter().map(Operand::from_object).collect())
            }
            _ => Operand::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub operator: String,
    pub operands: Vec<Operand>,
}

impl Op {
    pub fn new(operator: &str, operands: Vec<Operand>) -> Self {
        Self {
            operator: operator.to_string(),
            operands,
        }
    }

    pub fn number(&self, i: usize) -> Option<f32> {
        self.operands.get(i).and_then(Operand::number)
    }
}

/// What the text extractor needs from a parsed PDF.
///
/// Kept as a trait so the layout code can be exercised against hand-built
/// content streams.
pub trait PageSource {
    /// Pages in document order.
    fn pages(&self) -> Vec<PageId>;

    fn fonts(&self, page: PageId) -> Vec<FontInfo<'_>>;

    /// Decoded content-stream operations of a page.
    fn operations(&self, page: PageId) -> Result<Vec<Op>, PdfError>;

    /// `(width, height)` in points, when a MediaBox is reachable.
    fn media_box(&self, page: PageId) -> Option<(f32, f32)>;
}

/// [`PageSource`] backed by [`lopdf::Document`].
pub struct LopdfSource {
    doc: lopdf::Document,
}

impl LopdfSource {
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc =
            lopdf::Document::load_mem(data).map_err(|e| PdfError::Corrupt(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }
        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Object> {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// MediaBox is inheritable, so walk up through `Parent` until one is found.
    fn find_media_box(&self, dict: &lopdf::Dictionary, depth: usize) -> Option<[f32; 4]> {
        if let Some(arr) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|o| self.resolve(o))
            .and_then(|o| o.as_array().ok())
        {
            let nums: Vec<f32> = arr
                .iter()
                .filter_map(|o| match self.resolve(o)? {
                    lopdf::Object::Integer(i) => Some(*i as f32),
                    lopdf::Object::Real(f) => Some(*f),
                    _ => None,
                })
                .collect();
            if let [llx, lly, urx, ury] = nums[..] {
                return Some([llx, lly, urx, ury]);
            }
        }

        // Guard against cyclic page trees.
        if depth > 32 {
            return None;
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        self.find_media_box(parent, depth + 1)
    }
}

impl PageSource for LopdfSource {
    fn pages(&self) -> Vec<PageId> {
        // BTreeMap keyed by 1-based page number, so values come out in order.
        self.doc.get_pages().into_values().collect()
    }

    fn fonts(&self, page: PageId) -> Vec<FontInfo<'_>> {
        let Ok(fonts) = self.doc.get_page_fonts(page) else {
            return Vec::new();
        };
        fonts
            .into_iter()
            .map(|(key, dict)| {
                let name_of = |field: &[u8]| {
                    dict.get(field)
                        .ok()
                        .and_then(|o| o.as_name().ok())
                        .map(|n| String::from_utf8_lossy(n).into_owned())
                };
                let decoder = match dict.get_font_encoding(&self.doc) {
                    Ok(decoder) => Some(decoder),
                    Err(e) => {
                        log::debug!(
                            "no decoder for font {}: {e}",
                            String::from_utf8_lossy(&key)
                        );
                        None
                    }
                };
                FontInfo {
                    base_font: name_of(b"BaseFont"),
                    encoding: name_of(b"Encoding"),
                    decoder,
                    key,
                }
            })
            .collect()
    }

    fn operations(&self, page: PageId) -> Result<Vec<Op>, PdfError> {
        let raw = self
            .doc
            .get_page_content(page)
            .map_err(|e| PdfError::Corrupt(format!("cannot read page content: {e}")))?;
        let content = Content::decode(&raw)
            .map_err(|e| PdfError::Corrupt(format!("cannot decode content stream: {e}")))?;
        Ok(content
            .operations
            .iter()
            .map(|op| Op {
                operator: op.operator.clone(),
                operands: op.operands.iter().map(Operand::from_object).collect(),
            })
            .collect())
    }

    fn media_box(&self, page: PageId) -> Option<(f32, f32)> {
        let dict = self.doc.get_object(page).ok()?.as_dict().ok()?;
        let [llx, lly, urx, ury] = self.find_media_box(dict, 0)?;
        Some(((urx - llx).abs(), (ury - lly).abs()))
    }
}

/// Best-effort decoding for fonts lopdf has no decoder for.
///
/// `Identity-*` encodings carry 2-byte codes, tried as UTF-16BE. Otherwise a
/// BOM selects UTF-16BE, valid UTF-8 is taken as is, and anything else is
/// read as Latin-1.
pub fn decode_bytes(bytes: &[u8], encoding: Option<&str>) -> String {
    let identity = encoding.is_some_and(|e| e.starts_with("Identity"));
    if identity && !bytes.is_empty() && bytes.len() % 2 == 0 {
        let decoded = utf16be(bytes);
        if decoded.chars().any(|c| c != '\u{FFFD}' && c != '\0') {
            return decoded;
        }
    }

    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16be(payload);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
