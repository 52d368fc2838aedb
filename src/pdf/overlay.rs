//! Page compositing: fitting source pages onto the canvas and stamping the
//! overlay bar on top
//!
//! Source content streams are never rewritten. Fitting wraps the existing
//! streams between a prepended `q <matrix> cm <clip>` stream and an appended
//! `Q`; the overlay is a Form XObject drawn by one more appended stream.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::config::{OverlayPosition, OverlayStyle};
use crate::error::Result;
use crate::layout::{PageSize, Transform};
use crate::paginate::GlobalPageRecord;
use crate::pdf::create::{fmt_num, PageContent, GSTATE_NAME};
use crate::pdf::fonts::Font;
use crate::pdf::source::{PageBox, SourcePage};

/// Resource name of the overlay Form XObject on every numbered page
pub const OVERLAY_NAME: &str = "CollateOverlay";

/// Page boxes that stop meaning anything once a page is refitted
const STALE_BOXES: [&[u8]; 5] = [b"CropBox", b"BleedBox", b"TrimBox", b"ArtBox", b"Rotate"];

/// A PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    /// Map a source page's user space onto the canvas
    ///
    /// The visible box is moved to the origin, turned by the page's display
    /// rotation, then scaled and offset by `transform`.
    pub fn for_page(page: &SourcePage, transform: &Transform) -> Self {
        let (w, h) = (page.visible.width(), page.visible.height());
        // Rotation about the visible box, in coordinates relative to its corner
        let (a, b, c, d, e, f) = match page.rotation {
            90 => (0.0, -1.0, 1.0, 0.0, 0.0, w),
            180 => (-1.0, 0.0, 0.0, -1.0, w, h),
            270 => (0.0, 1.0, -1.0, 0.0, h, 0.0),
            _ => (1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
        };
        let (x0, y0) = (page.visible.x0, page.visible.y0);
        let s = transform.scale;

        Self {
            a: s * a,
            b: s * b,
            c: s * c,
            d: s * d,
            e: s * (e - a * x0 - c * y0) + transform.x_offset,
            f: s * (f - b * x0 - d * y0) + transform.y_offset,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of a transformed rectangle
    pub fn apply_box(&self, rect: &PageBox) -> PageBox {
        let corners = [
            self.apply(rect.x0, rect.y0),
            self.apply(rect.x1, rect.y0),
            self.apply(rect.x0, rect.y1),
            self.apply(rect.x1, rect.y1),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        PageBox {
            x0: xs.clone().fold(f32::INFINITY, f32::min),
            y0: ys.clone().fold(f32::INFINITY, f32::min),
            x1: xs.fold(f32::NEG_INFINITY, f32::max),
            y1: ys.fold(f32::NEG_INFINITY, f32::max),
        }
    }

    /// Check if this is (approximately) the identity matrix
    pub fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < 0.001
            && self.b.abs() < 0.001
            && self.c.abs() < 0.001
            && (self.d - 1.0).abs() < 0.001
            && self.e.abs() < 0.001
            && self.f.abs() < 0.001
    }

    /// The matrix as a `cm` operator
    fn cm(&self) -> String {
        format!(
            "{} {} {} {} {} {} cm",
            fmt_num_precise(self.a),
            fmt_num_precise(self.b),
            fmt_num_precise(self.c),
            fmt_num_precise(self.d),
            fmt_num(self.e),
            fmt_num(self.f)
        )
    }
}

/// Scale factors need more precision than coordinates
fn fmt_num_precise(v: f32) -> String {
    let s = format!("{:.5}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn box_array(b: &PageBox) -> Object {
    Object::Array(vec![
        Object::Real(b.x0),
        Object::Real(b.y0),
        Object::Real(b.x1),
        Object::Real(b.y1),
    ])
}

/// Draw the overlay bar for one numbered page
///
/// The bar spans the canvas between the side margins at the top or bottom
/// edge. The source label is written on the left, cut short if needed, and
/// `X / Y` on the right.
pub fn render_overlay(
    record: &GlobalPageRecord,
    canvas: PageSize,
    style: &OverlayStyle,
    font: &Font,
) -> PageContent {
    let mut content = PageContent::new(canvas);

    let side = if canvas.width > 4.0 * style.side_margin { style.side_margin } else { 0.0 };
    let x = side;
    let width = canvas.width - 2.0 * side;
    let y = match style.position {
        OverlayPosition::Bottom => style.edge_margin,
        OverlayPosition::Top => canvas.height - style.edge_margin - style.bar_height,
    };

    let (r, g, b) = style.background;
    content.push(&format!(
        "q /{} gs {} {} {} rg 1 1 1 RG 0.5 w {} {} {} {} re B Q",
        GSTATE_NAME,
        fmt_num(r),
        fmt_num(g),
        fmt_num(b),
        fmt_num(x),
        fmt_num(y),
        fmt_num(width),
        fmt_num(style.bar_height)
    ));

    let size = style.font_size;
    let pad = size * 0.5;
    // Centre capitals vertically in the bar
    let baseline = y + (style.bar_height - size * 0.7) / 2.0;
    let number = record.number_text();
    let number_width = font.text_width(&number, size);
    let label = font.truncate_to_width(
        &record.source_label,
        size,
        (width - 3.0 * pad - number_width).max(0.0),
    );

    let (r, g, b) = style.text_color;
    content.push(&format!("q {} {} {} rg", fmt_num(r), fmt_num(g), fmt_num(b)));
    content.text(x + pad, baseline, size, &label);
    content.right_aligned_text(font, x + width - pad, baseline, size, &number);
    content.push("Q");

    content
}

/// Fit a page onto the canvas without touching its content streams
///
/// The page's existing content runs inside `q ... Q` with the page matrix
/// and a clip to its visible box, the page boxes are replaced by the canvas,
/// and annotation rectangles are moved with the content.
pub fn fit_to_canvas(
    doc: &mut Document,
    page_id: ObjectId,
    page: &SourcePage,
    transform: &Transform,
    canvas: PageSize,
) -> Result<()> {
    let matrix = Matrix::for_page(page, transform);
    let visible = page.visible;

    let mut prefix = String::from("q\n");
    if !matrix.is_identity() {
        prefix.push_str(&matrix.cm());
        prefix.push('\n');
    }
    prefix.push_str(&format!(
        "{} {} {} {} re W n\n",
        fmt_num(visible.x0),
        fmt_num(visible.y0),
        fmt_num(visible.width()),
        fmt_num(visible.height())
    ));

    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), prefix.into_bytes()));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    prepend_content_to_page(doc, page_id, prefix_id)?;
    append_content_to_page(doc, page_id, suffix_id)?;

    copy_annotations(doc, page_id, &matrix)?;

    let page_dict = doc.get_dictionary_mut(page_id)?;
    page_dict.set(
        "MediaBox",
        box_array(&PageBox { x0: 0.0, y0: 0.0, x1: canvas.width, y1: canvas.height }),
    );
    for key in STALE_BOXES {
        page_dict.remove(key);
    }

    Ok(())
}

/// Stamp an overlay on top of a page's existing content
///
/// The overlay becomes a Form XObject with its own resources, so the page's
/// own fonts and graphics states are never renamed or replaced.
pub fn merge_onto(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: &PageContent,
    resources: &Dictionary,
) -> Result<()> {
    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set(
        "BBox",
        box_array(&PageBox { x0: 0.0, y0: 0.0, x1: overlay.size.width, y1: overlay.size.height }),
    );
    xobject_dict.set(
        "Matrix",
        Object::Array(vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()]),
    );
    xobject_dict.set("Resources", Object::Dictionary(resources.clone()));

    let xobject_id = doc.add_object(Stream::new(xobject_dict, overlay.ops.clone().into_bytes()));
    add_xobject_to_page_resources(doc, page_id, OVERLAY_NAME, xobject_id)?;

    let invoke = format!("\nq /{} Do Q\n", OVERLAY_NAME);
    let invoke_id = doc.add_object(Stream::new(Dictionary::new(), invoke.into_bytes()));
    append_content_to_page(doc, page_id, invoke_id)
}

/// Give a page its own copies of its annotations, moved by `matrix`
///
/// The source annotations may be shared by another use of the same page, so
/// they are never edited in place. Each copy's `/P` points at `page_id`, and
/// `/Popup` and `/Parent` links between annotations of this page are
/// redirected to the matching copies.
fn copy_annotations(doc: &mut Document, page_id: ObjectId, matrix: &Matrix) -> Result<()> {
    let annots = {
        let page_dict = doc.get_dictionary(page_id)?;
        match page_dict.get(b"Annots") {
            Ok(Object::Array(a)) => a.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(a)) => a.clone(),
                _ => return Ok(()),
            },
            _ => return Ok(()),
        }
    };

    let mut copies = Vec::with_capacity(annots.len());
    let mut renamed = BTreeMap::new();
    for annot in annots {
        let dict = match &annot {
            Object::Reference(id) => doc.get_dictionary(*id).ok().cloned().map(|d| (Some(*id), d)),
            Object::Dictionary(d) => Some((None, d.clone())),
            _ => None,
        };
        match dict {
            Some((old_id, dict)) => {
                let new_id = doc.new_object_id();
                if let Some(old_id) = old_id {
                    renamed.insert(old_id, new_id);
                }
                copies.push(Ok((new_id, dict)));
            }
            None => copies.push(Err(annot)),
        }
    }

    let mut annots = Vec::with_capacity(copies.len());
    for copy in copies {
        let (new_id, mut dict) = match copy {
            Ok(copy) => copy,
            Err(other) => {
                annots.push(other);
                continue;
            }
        };

        if !matrix.is_identity() {
            let rect = dict
                .get(b"Rect")
                .and_then(|r| r.as_array())
                .ok()
                .and_then(|r| PageBox::from_array(r));
            if let Some(rect) = rect {
                dict.set("Rect", box_array(&matrix.apply_box(&rect)));
            }
        }
        if dict.has(b"P") {
            dict.set("P", Object::Reference(page_id));
        }
        for key in ["Popup", "Parent"] {
            let target = dict.get(key.as_bytes()).and_then(|o| o.as_reference()).ok();
            if let Some(&copy_id) = target.and_then(|id| renamed.get(&id)) {
                dict.set(key, Object::Reference(copy_id));
            }
        }

        doc.objects.insert(new_id, Object::Dictionary(dict));
        annots.push(Object::Reference(new_id));
    }

    doc.get_dictionary_mut(page_id)?.set("Annots", Object::Array(annots));
    Ok(())
}

/// The page's content streams as an array of references
fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_dictionary(page_id)?;
    Ok(match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    })
}

/// Prepend a content stream to a page's Contents
fn prepend_content_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    new_content_id: ObjectId,
) -> Result<()> {
    let mut contents = page_contents(doc, page_id)?;
    contents.insert(0, Object::Reference(new_content_id));
    doc.get_dictionary_mut(page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Append a content stream to a page's Contents, so it draws on top
fn append_content_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    new_content_id: ObjectId,
) -> Result<()> {
    let mut contents = page_contents(doc, page_id)?;
    contents.push(Object::Reference(new_content_id));
    doc.get_dictionary_mut(page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Add an XObject to the page's Resources dictionary under `name`
///
/// Shared (indirect) resource dictionaries are copied onto the page first,
/// so other pages using them are unaffected.
fn add_xobject_to_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<()> {
    let mut resources = {
        let page_dict = doc.get_dictionary(page_id)?;
        match page_dict.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(res_id)) => {
                doc.get_dictionary(*res_id).cloned().unwrap_or_default()
            }
            _ => Dictionary::new(),
        }
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(xo)) => xo.clone(),
        Ok(Object::Reference(xo_id)) => doc.get_dictionary(*xo_id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };
    xobjects.set(name, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_dictionary_mut(page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}
