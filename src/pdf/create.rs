//! Generated pages: dividers, blank pages and the shared text resources
//!
//! Generated content draws text with the font `/F1` and sets fill opacity
//! through the graphics state `/GS1`; both come from the dictionary built by
//! `text_resources`.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::Result;
use crate::layout::PageSize;
use crate::pdf::fonts::{encode, pdf_literal, Font};

/// Resource name of the text font in generated content
pub const FONT_NAME: &str = "F1";
/// Resource name of the overlay graphics state
pub const GSTATE_NAME: &str = "GS1";

/// A content stream drawn on a page of a known size
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub size: PageSize,
    pub ops: String,
}

impl PageContent {
    pub fn new(size: PageSize) -> Self {
        Self {
            size,
            ops: String::new(),
        }
    }

    /// Draw `text` with its baseline starting at (`x`, `y`)
    pub fn text(&mut self, x: f32, y: f32, font_size: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.push_str(&format!(
            "BT /{} {} Tf {} {} Td {} Tj ET\n",
            FONT_NAME,
            fmt_num(font_size),
            fmt_num(x),
            fmt_num(y),
            pdf_literal(&encode(text))
        ));
    }

    /// Draw `text` horizontally centred on the page
    pub fn centered_text(&mut self, font: &Font, y: f32, font_size: f32, text: &str) {
        let width = font.text_width(text, font_size);
        self.text((self.size.width - width) / 2.0, y, font_size, text);
    }

    /// Draw `text` so that it ends at `right`
    pub fn right_aligned_text(
        &mut self,
        font: &Font,
        right: f32,
        y: f32,
        font_size: f32,
        text: &str,
    ) {
        let width = font.text_width(text, font_size);
        self.text(right - width, y, font_size, text);
    }

    pub fn push(&mut self, op: &str) {
        self.ops.push_str(op);
        self.ops.push('\n');
    }
}

/// Format a coordinate for a content stream: at most two decimals, no
/// trailing zeros
pub fn fmt_num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.2}", rounded);
        s.trim_end_matches('0').to_string()
    }
}

/// Resources for generated content: `/F1` text font and `/GS1` fill opacity
pub fn text_resources(font_id: ObjectId, gstate_id: ObjectId) -> Dictionary {
    let mut fonts = Dictionary::new();
    fonts.set(FONT_NAME, Object::Reference(font_id));

    let mut gstates = Dictionary::new();
    gstates.set(GSTATE_NAME, Object::Reference(gstate_id));

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources.set("ExtGState", Object::Dictionary(gstates));
    resources
}

/// Graphics state with the given fill opacity
pub fn opacity_gstate(doc: &mut Document, opacity: f32) -> ObjectId {
    let mut gs = Dictionary::new();
    gs.set("Type", Object::Name(b"ExtGState".to_vec()));
    gs.set("ca", Object::Real(opacity));
    gs.set("CA", Object::Real(1.0));
    doc.add_object(Object::Dictionary(gs))
}

/// Divider page: the title centred, one line per `/`-separated part
pub fn divider_page(title: &str, canvas: PageSize, font: &Font, font_size: f32) -> PageContent {
    let lines: Vec<&str> = title
        .split('/')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut page = PageContent::new(canvas);
    let leading = font_size * 1.4;
    // Centre the block of lines vertically
    let block = leading * lines.len().saturating_sub(1) as f32;
    let first_baseline = (canvas.height + block) / 2.0;
    let max_width = canvas.width * 0.9;

    for (i, line) in lines.iter().enumerate() {
        let line = font.truncate_to_width(line, font_size, max_width);
        page.centered_text(font, first_baseline - leading * i as f32, font_size, &line);
    }
    page
}

/// A page with nothing on it
pub fn blank_page(canvas: PageSize) -> PageContent {
    PageContent::new(canvas)
}

/// Add a generated page to `doc` under `parent` and return its ID
pub fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    content: &PageContent,
    resources: &Dictionary,
) -> Result<ObjectId> {
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.ops.clone().into_bytes(),
    ));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(parent));
    page.set(
        "MediaBox",
        Object::Array(vec![
            0.into(),
            0.into(),
            Object::Real(content.size.width),
            Object::Real(content.size.height),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources.clone()));
    page.set("Contents", Object::Reference(content_id));

    Ok(doc.add_object(Object::Dictionary(page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(1.256), "1.26");
        assert_eq!(fmt_num(-3.1), "-3.1");
    }

    #[test]
    fn test_divider_splits_lines() {
        let page = divider_page("Part one / Foundations", PageSize::a4(), &Font::helvetica(), 24.0);

        assert_eq!(page.ops.matches("Tj").count(), 2);
        assert!(page.ops.contains("(Part one)"));
        assert!(page.ops.contains("(Foundations)"));
        assert!(page.ops.contains("/F1 24 Tf"));
    }

    #[test]
    fn test_divider_single_line_is_centred() {
        let canvas = PageSize::new(200.0, 100.0);
        let font = Font::helvetica();
        let page = divider_page("AA", canvas, &font, 10.0);

        // "AA" is 13.34pt wide at 10pt
        let x = (200.0 - font.text_width("AA", 10.0)) / 2.0;
        assert!(page.ops.contains(&format!("{} 50 Td", fmt_num(x))));
    }

    #[test]
    fn test_blank_page_is_empty() {
        assert!(blank_page(PageSize::letter()).ops.is_empty());
    }

    #[test]
    fn test_add_page_sets_box_and_resources() {
        let mut doc = Document::with_version("1.5");
        let parent = doc.new_object_id();
        let font_id = Font::helvetica().embed(&mut doc).unwrap();
        let gs_id = opacity_gstate(&mut doc, 0.5);
        let resources = text_resources(font_id, gs_id);

        let blank = blank_page(PageSize::new(300.0, 400.0));
        let id = add_page(&mut doc, parent, &blank, &resources).unwrap();
        let page = doc.get_dictionary(id).unwrap();

        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media[3].as_float().unwrap(), 400.0);
        assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), parent);
        assert!(page.get(b"Resources").unwrap().as_dict().unwrap().has(b"ExtGState"));
    }
}
