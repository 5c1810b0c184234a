//! PDF rendering with lopdf.
//!
//! Each page gets its own content stream; every row is a single `Tj` at a
//! fixed baseline. Text is encoded as WinAnsi; characters the encoding has no
//! code for are replaced with `?`. Long lines are not wrapped.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::layout::{paginate, PageLayout};

/// Resource name of the single font
const FONT_KEY: &str = "F1";

/// Spaces a tab expands to
const TAB_WIDTH: usize = 4;

/// Rendered PDF bytes with the page count
pub(crate) struct Rendered {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

pub(crate) fn render(lines: &[String], layout: &PageLayout) -> Result<Rendered, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(layout.font.clone().into_bytes()),
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_KEY => font_id,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::new();
    for rows in paginate(lines, layout) {
        let content = page_content(rows, layout);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let (width, height) = layout.page_size_pt();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        "Count" => Object::Integer(page_ids.len() as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::from(width), Object::from(height)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(format!("blogsmith {}", crate::VERSION)),
        "CreationDate" => Object::string_literal(
            chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string(),
        ),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    Ok(Rendered {
        bytes,
        pages: page_ids.len(),
    })
}

fn page_content(rows: &[String], layout: &PageLayout) -> Content {
    let mut operations = Vec::with_capacity(rows.len() * 5);
    let left = layout.left_pt();

    for (index, row) in rows.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![FONT_KEY.into(), Object::from(layout.font_size)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::from(left), Object::from(layout.baseline_pt(index))],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(row))],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    Content { operations }
}

/// Encode a row for a WinAnsi Type1 font
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => bytes.extend(std::iter::repeat(b' ').take(TAB_WIDTH)),
            c => bytes.push(win_ansi_byte(c).unwrap_or(b'?')),
        }
    }
    bytes
}

/// WinAnsi code for `c`. Latin-1 maps to itself except the C1 control range,
/// where WinAnsi places typographic punctuation instead.
fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{80}'..='\u{9f}' => return None,
        '\0'..='\u{ff}' => c as u32 as u8,
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(byte)
}
