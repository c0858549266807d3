//! Small PDF writer over `lopdf` shared by the text and raster exports.
//!
//! Pages are A4 portrait. Fonts are the non-embedded base-14 Type1 fonts with
//! WinAnsiEncoding, so text stays selectable and extractable without shipping font files.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::export::font_metrics::{A4_HEIGHT_PT, A4_WIDTH_PT};
use crate::export::ExportError;

pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    fonts: Dictionary,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            fonts: Dictionary::new(),
        }
    }

    /// Registers a base-14 font under `resource` (e.g. `F1`) for every page.
    pub fn add_font(&mut self, resource: &str, base_font: &str) {
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.set(resource, font_id);
    }

    /// Adds a baseline JPEG as an image XObject.
    pub fn add_jpeg(&mut self, jpeg: Vec<u8>, width: u32, height: u32) -> ObjectId {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        self.doc.add_object(image)
    }

    /// Appends an A4 page drawing `operations`, with `images` available by resource name.
    pub fn add_page(&mut self, operations: Vec<Operation>, images: &[(&str, ObjectId)]) -> Result<(), ExportError> {
        let content = Content { operations }
            .encode()
            .map_err(|e| ExportError::Pdf(e.into()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let mut resources = Dictionary::new();
        if !self.fonts.is_empty() {
            resources.set("Font", self.fonts.clone());
        }
        if !images.is_empty() {
            let mut xobjects = Dictionary::new();
            for (name, id) in images {
                xobjects.set(*name, *id);
            }
            resources.set("XObject", xobjects);
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH_PT.into(), A4_HEIGHT_PT.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Writes the page tree, catalog and document info and serialises the file.
    pub fn finish(mut self, title: &str) -> Result<Vec<u8>, ExportError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
            "Producer" => Object::string_literal(concat!("cv-builder-api ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| ExportError::Pdf(e.into()))?;
        Ok(out)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content helpers
// ────────────────────────────────────────────────────────────────────────────

/// Text operand in WinAnsi bytes.
pub fn text_operand(text: &str) -> Object {
    Object::String(encode_win_ansi(text), StringFormat::Literal)
}

/// Non-stroking fill color from 0..=255 components.
pub fn fill_rgb(rgb: [u8; 3]) -> Operation {
    Operation::new(
        "rg",
        rgb.iter().map(|c| (f32::from(*c) / 255.0).into()).collect(),
    )
}

pub fn stroke_rgb(rgb: [u8; 3]) -> Operation {
    Operation::new(
        "RG",
        rgb.iter().map(|c| (f32::from(*c) / 255.0).into()).collect(),
    )
}

/// Encodes `text` as WinAnsi (CP-1252). Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

/// Number of characters in `text` that [`encode_win_ansi`] replaces with `?`.
pub fn win_ansi_replacements(text: &str) -> usize {
    text.chars().filter(|c| win_ansi_byte(*c).is_none()).count()
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => win_ansi_special(c),
    }
}

fn win_ansi_special(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        '\t' => b' ',
        _ => return None,
    };
    Some(byte)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_win_ansi_maps_latin1_and_punctuation() {
        assert_eq!(encode_win_ansi("Año"), vec![b'A', 0xF1, b'o']);
        assert_eq!(encode_win_ansi("\u{2022} \u{2013} \u{20AC}"), vec![0x95, b' ', 0x96, b' ', 0x80]);
        assert_eq!(encode_win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn test_win_ansi_replacements_counts_unmappable_only() {
        assert_eq!(win_ansi_replacements("Año \u{2022} ?"), 0);
        assert_eq!(win_ansi_replacements("Иван 漢"), 5);
    }

    #[test]
    fn test_writer_produces_a_loadable_document() {
        let mut writer = PdfWriter::new();
        writer.add_font("F1", "Helvetica");
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![text_operand("Hello")]),
            Operation::new("ET", vec![]),
        ];
        writer.add_page(ops.clone(), &[]).unwrap();
        writer.add_page(ops, &[]).unwrap();
        assert_eq!(writer.page_count(), 2);

        let bytes = writer.finish("Test").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
