//! Fonts for generated text
//!
//! Text is written with a single-byte WinAnsiEncoding font: either the
//! standard Helvetica font (nothing embedded) or a TrueType file embedded
//! whole, with glyph widths measured through rustybuzz.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// First and last character codes covered by the widths table
const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// Width used for codes a font has no glyph for, in 1/1000 em
const MISSING_WIDTH: u16 = 500;

/// Helvetica glyph widths for WinAnsiEncoding codes 32-255, 1/1000 em
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 224] = [
    // 32-47:  space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 48-63:  0-9 : ; < = > ?
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    // 64-79:  @ A-O
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    // 80-95:  P-Z [ \ ] ^ _
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    // 96-111: ` a-o
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    // 112-127: p-z { | } ~ DEL
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    // 128-143: Euro, quotes, ellipsis, daggers, per mille, S caron, OE, Z caron
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    // 144-159: curly quotes, bullet, dashes, tilde, trademark, s caron, oe, z caron, Y dieresis
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    // 160-175: Latin-1 punctuation and symbols
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    // 176-191
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    // 192-207: accented capitals
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    // 208-223
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    // 224-239: accented lower case
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    // 240-255
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// WinAnsiEncoding codes 128-159 that differ from Latin-1
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (128, '€'), (130, '‚'), (131, 'ƒ'), (132, '„'), (133, '…'), (134, '†'),
    (135, '‡'), (136, 'ˆ'), (137, '‰'), (138, 'Š'), (139, '‹'), (140, 'Œ'),
    (142, 'Ž'), (145, '‘'), (146, '’'), (147, '“'), (148, '”'), (149, '•'),
    (150, '–'), (151, '—'), (152, '˜'), (153, '™'), (154, 'š'), (155, '›'),
    (156, 'œ'), (158, 'ž'), (159, 'Ÿ'),
];

/// Encode one character in WinAnsiEncoding
fn encode_char(c: char) -> Option<u8> {
    let code = c as u32;
    if (32..=126).contains(&code) || (160..=255).contains(&code) {
        return Some(code as u8);
    }
    WIN_ANSI_HIGH
        .iter()
        .find(|(_, ch)| *ch == c)
        .map(|(code, _)| *code)
}

/// The character a WinAnsiEncoding code stands for
fn decode_code(code: u8) -> Option<char> {
    match code {
        32..=126 | 160..=255 => Some(code as char),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ch)| *ch),
    }
}

/// Encode text for a WinAnsiEncoding font; unmappable characters become `?`
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => b' ',
            _ => encode_char(c).unwrap_or(b'?'),
        })
        .collect()
}

/// Write encoded bytes as a PDF literal string, `(...)` included
///
/// Bytes outside printable ASCII are written as octal escapes so the
/// content stream stays plain ASCII.
pub fn pdf_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('(');
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            32..=126 => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out.push(')');
    out
}

/// Metrics copied from a TrueType file for its FontDescriptor
#[derive(Debug, Clone)]
struct Descriptor {
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
}

#[derive(Debug, Clone)]
enum FontKind {
    /// One of the standard 14 fonts, referenced by name only
    Standard,
    /// A TrueType program embedded as FontFile2
    TrueType { data: Vec<u8>, descriptor: Descriptor },
}

/// A font usable for overlay, TOC and divider text
#[derive(Debug, Clone)]
pub struct Font {
    base_font: String,
    /// Advance widths for codes 32-255, in 1/1000 em
    widths: Vec<u16>,
    kind: FontKind,
}

impl Font {
    /// The standard Helvetica font
    pub fn helvetica() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            widths: HELVETICA_WIDTHS.to_vec(),
            kind: FontKind::Standard,
        }
    }

    /// Load a TrueType (or OpenType with TrueType outlines) font for embedding
    pub fn load_truetype(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::Font(format!("cannot read {}: {}", path.display(), e)))?;

        let face = rustybuzz::Face::from_slice(&data, 0)
            .ok_or_else(|| Error::Font(format!("{} is not a usable font file", path.display())))?;

        let upem = face.units_per_em().max(1) as f32;
        let to_pdf_units = |v: f32| (v * 1000.0 / upem).round();

        let missing = face
            .glyph_hor_advance(rustybuzz::ttf_parser::GlyphId(0))
            .map(|a| to_pdf_units(f32::from(a)) as u16)
            .unwrap_or(MISSING_WIDTH);

        let widths = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                decode_code(code)
                    .and_then(|c| face.glyph_index(c))
                    .and_then(|g| face.glyph_hor_advance(g))
                    .map(|a| to_pdf_units(f32::from(a)) as u16)
                    .unwrap_or(missing)
            })
            .collect();

        let bbox = face.global_bounding_box();
        let ascent = to_pdf_units(f32::from(face.ascender())) as i64;
        let descriptor = Descriptor {
            ascent,
            descent: to_pdf_units(f32::from(face.descender())) as i64,
            cap_height: face
                .capital_height()
                .map(|h| to_pdf_units(f32::from(h)) as i64)
                .unwrap_or(ascent),
            bbox: [
                to_pdf_units(f32::from(bbox.x_min)) as i64,
                to_pdf_units(f32::from(bbox.y_min)) as i64,
                to_pdf_units(f32::from(bbox.x_max)) as i64,
                to_pdf_units(f32::from(bbox.y_max)) as i64,
            ],
        };

        let base_font: String = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let base_font = if base_font.is_empty() {
            "EmbeddedFont".to_string()
        } else {
            base_font
        };

        drop(face);
        Ok(Self {
            base_font,
            widths,
            kind: FontKind::TrueType { data, descriptor },
        })
    }

    /// PostScript name written as BaseFont
    pub fn name(&self) -> &str {
        &self.base_font
    }

    fn code_width(&self, code: u8) -> u16 {
        code.checked_sub(FIRST_CHAR)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(MISSING_WIDTH)
    }

    /// Width of `text` set at `font_size`, in points
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = encode(text)
            .into_iter()
            .map(|b| u32::from(self.code_width(b)))
            .sum();
        units as f32 * font_size / 1000.0
    }

    /// Shorten `text` with a trailing `...` so it fits in `max_width`
    pub fn truncate_to_width(&self, text: &str, font_size: f32, max_width: f32) -> String {
        if self.text_width(text, font_size) <= max_width {
            return text.to_string();
        }

        let ellipsis = "...";
        let budget = max_width - self.text_width(ellipsis, font_size);
        let mut kept = String::new();
        for c in text.chars() {
            kept.push(c);
            if self.text_width(&kept, font_size) > budget {
                kept.pop();
                break;
            }
        }
        let kept = kept.trim_end();
        if kept.is_empty() {
            String::new()
        } else {
            format!("{}{}", kept, ellipsis)
        }
    }

    /// Add the font to `doc` and return its font dictionary ID
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("BaseFont", Object::Name(self.base_font.as_bytes().to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

        match &self.kind {
            FontKind::Standard => {
                font.set("Subtype", Object::Name(b"Type1".to_vec()));
            }
            FontKind::TrueType { data, descriptor } => {
                let mut font_stream_dict = Dictionary::new();
                font_stream_dict.set("Length1", Object::Integer(data.len() as i64));
                let font_stream_id = doc.add_object(Stream::new(font_stream_dict, data.clone()));

                let mut font_descriptor = Dictionary::new();
                font_descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
                font_descriptor.set("FontName", Object::Name(self.base_font.as_bytes().to_vec()));
                font_descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
                font_descriptor.set(
                    "FontBBox",
                    Object::Array(descriptor.bbox.iter().map(|&v| Object::Integer(v)).collect()),
                );
                font_descriptor.set("ItalicAngle", Object::Integer(0));
                font_descriptor.set("Ascent", Object::Integer(descriptor.ascent));
                font_descriptor.set("Descent", Object::Integer(descriptor.descent));
                font_descriptor.set("CapHeight", Object::Integer(descriptor.cap_height));
                font_descriptor.set("StemV", Object::Integer(80));
                font_descriptor.set("FontFile2", Object::Reference(font_stream_id));
                let font_descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

                font.set("Subtype", Object::Name(b"TrueType".to_vec()));
                font.set("FontDescriptor", Object::Reference(font_descriptor_id));
                font.set("FirstChar", Object::Integer(i64::from(FIRST_CHAR)));
                font.set("LastChar", Object::Integer(i64::from(LAST_CHAR)));
                font.set(
                    "Widths",
                    Object::Array(
                        self.widths
                            .iter()
                            .map(|&w| Object::Integer(i64::from(w)))
                            .collect(),
                    ),
                );
            }
        }

        Ok(doc.add_object(Object::Dictionary(font)))
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::helvetica()
    }
}
