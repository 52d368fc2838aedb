//! Table of contents pages
//!
//! Rows are split into fixed-size chunks, one chunk per page, so the page
//! count is known before anything is drawn. `TocPages` is a cheap, cloneable
//! iterator; cloning restarts it without re-reading the plan.

use std::slice::Chunks;

use log::warn;

use crate::index::EntryKind;
use crate::layout::{Margins, PageSize};
use crate::paginate::TocEntry;
use crate::pdf::create::PageContent;
use crate::pdf::fonts::Font;

/// Spacing between rows as a multiple of the font size
const ROW_LEADING: f32 = 1.5;
/// Indent for documents that follow a divider, as a multiple of the font size
const INDENT_EMS: f32 = 1.5;

/// How TOC pages are laid out
#[derive(Debug, Clone)]
pub struct TocLayout {
    pub canvas: PageSize,
    pub title: String,
    pub font_size: f32,
    pub rows_per_page: usize,
    pub margins: Margins,
}

/// The rows shown on one TOC page
#[derive(Debug, Clone, Copy)]
pub struct TocPage<'a> {
    /// 0-based TOC page index
    pub index: usize,
    pub rows: &'a [TocEntry],
    /// Position of the first divider in the whole TOC
    first_divider: Option<usize>,
    /// Position of `rows[0]` in the whole TOC
    offset: usize,
}

impl TocPage<'_> {
    /// Whether row `i` of this page is a document listed under a divider
    fn indented(&self, i: usize) -> bool {
        self.rows[i].kind == EntryKind::Document
            && self.first_divider.is_some_and(|d| self.offset + i > d)
    }
}

/// Iterator over the TOC split into pages
#[derive(Debug, Clone)]
pub struct TocPages<'a> {
    chunks: Chunks<'a, TocEntry>,
    first_divider: Option<usize>,
    rows_per_page: usize,
    index: usize,
}

impl<'a> Iterator for TocPages<'a> {
    type Item = TocPage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.chunks.next()?;
        let page = TocPage {
            index: self.index,
            rows,
            first_divider: self.first_divider,
            offset: self.index * self.rows_per_page,
        };
        self.index += 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for TocPages<'_> {}

/// Split `entries` into pages of at most `rows_per_page` rows
pub fn toc_pages(entries: &[TocEntry], rows_per_page: usize) -> TocPages<'_> {
    let rows_per_page = rows_per_page.max(1);
    TocPages {
        chunks: entries.chunks(rows_per_page),
        first_divider: entries.iter().position(|e| e.kind == EntryKind::Divider),
        rows_per_page,
        index: 0,
    }
}

/// A clickable TOC row and the numbered page it points to
#[derive(Debug, Clone, PartialEq)]
pub struct TocLink {
    /// `[llx lly urx ury]` on the TOC page
    pub rect: [f32; 4],
    pub target_page: usize,
}

/// Draw one TOC page
///
/// Titles sit on the left, starting page numbers are right aligned, and the
/// gap between them is filled with dot leaders. Titles too long for the row
/// are cut short with `...`.
pub fn render_toc_page(
    page: &TocPage,
    layout: &TocLayout,
    font: &Font,
) -> (PageContent, Vec<TocLink>) {
    let mut content = PageContent::new(layout.canvas);
    let size = layout.font_size;
    let heading_size = size * 1.5;
    let left = layout.margins.left;
    let right = left + layout.margins.inner_width(layout.canvas);

    let heading = if page.index == 0 {
        layout.title.clone()
    } else {
        format!("{} (continued)", layout.title)
    };
    let mut y = layout.canvas.height - layout.margins.top - heading_size;
    content.text(left, y, heading_size, &heading);
    y -= heading_size * ROW_LEADING;

    let available = y - layout.margins.bottom;
    let rows = layout.rows_per_page.max(1) as f32;
    let leading = (size * ROW_LEADING).min(available / rows);
    if leading < size && page.index == 0 {
        warn!(
            "{} TOC rows per page do not fit on a {} page; rows will overlap",
            layout.rows_per_page, layout.canvas
        );
    }

    let leader = ". ";
    let leader_width = font.text_width(leader, size);
    let mut links = Vec::with_capacity(page.rows.len());

    for (i, row) in page.rows.iter().enumerate() {
        let x = if page.indented(i) { left + size * INDENT_EMS } else { left };
        let number = row.starting_page_number.to_string();
        let number_width = font.text_width(&number, size);

        // Keep room for the number and at least two leader dots
        let title_room = right - x - number_width - 2.0 * leader_width;
        let title = font.truncate_to_width(&row.title, size, title_room.max(0.0));
        let title_width = font.text_width(&title, size);

        content.text(x, y, size, &title);
        content.right_aligned_text(font, right, y, size, &number);

        let gap = right - number_width - (x + title_width) - leader_width / 2.0;
        let dots = (gap / leader_width).floor().max(0.0) as usize;
        if dots > 0 {
            let dotted = leader.repeat(dots);
            let dotted = dotted.trim_end();
            let dots_right = right - number_width - leader_width / 2.0;
            content.right_aligned_text(font, dots_right, y, size, dotted);
        }

        links.push(TocLink {
            rect: [left, y - size * 0.3, right, y + size],
            target_page: row.starting_page_number,
        });
        y -= leading;
    }

    (content, links)
}
