//! Small in-memory PDFs for tests, one text line per page.
//!
//! Enabled for this crate's tests and, through the `test-support` feature,
//! for dependents' tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::PdfError;

/// Font placed under the `F1` resource key on every page.
#[derive(Debug, Clone, Copy)]
pub enum FixtureFont<'a> {
    /// Type1 Helvetica, no `Encoding` entry.
    Helvetica,
    /// Type1 Helvetica with `WinAnsiEncoding`.
    WinAnsi,
    /// Type0 `Identity-H` font with a ToUnicode CMap built from
    /// `(code, char)` pairs. Page text is written as hex strings.
    Cid(&'a [(u16, char)]),
}

/// Single-font PDF whose pages show the given raw string bytes. The page
/// tree carries a 612x792 MediaBox inherited by every page.
pub fn pdf_with(font: FixtureFont<'_>, pages: &[&[u8]]) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_dict = match font {
        FixtureFont::Helvetica => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        },
        FixtureFont::WinAnsi => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        },
        FixtureFont::Cid(map) => {
            let cmap_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(map)));
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "Ryumin-Light",
                "Encoding" => "Identity-H",
                "ToUnicode" => cmap_id,
            }
        }
    };
    let format = match font {
        FixtureFont::Cid(_) => StringFormat::Hexadecimal,
        _ => StringFormat::Literal,
    };
    let font_id = doc.add_object(font_dict);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for bytes in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::String(bytes.to_vec(), format)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| PdfError::Corrupt(format!("cannot encode content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

/// Helvetica PDF with one line of ASCII text per page.
pub fn text_pdf(pages: &[&str]) -> Result<Vec<u8>, PdfError> {
    let pages: Vec<&[u8]> = pages.iter().map(|p| p.as_bytes()).collect();
    pdf_with(FixtureFont::Helvetica, &pages)
}

fn to_unicode_cmap(map: &[(u16, char)]) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo\n\
         << /Registry (Adobe)\n\
         /Ordering (UCS)\n\
         /Supplement 0\n\
         >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    cmap.push_str(&format!("{} beginbfchar\n", map.len()));
    for (code, c) in map {
        let mut units = [0u16; 2];
        let target: String = c
            .encode_utf16(&mut units)
            .iter()
            .map(|u| format!("{u:04X}"))
            .collect();
        cmap.push_str(&format!("<{code:04X}> <{target}>\n"));
    }
    cmap.push_str(
        "endbfchar\n\
         endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap.into_bytes()
}
