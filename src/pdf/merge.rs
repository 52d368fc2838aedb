//! Assembling the collated PDF using lopdf
//!
//! Output order is fixed: cover pages unchanged, then the TOC pages, then
//! every numbered body page in plan order. Each source file is imported
//! into the output once; every use of one of its pages gets its own copy
//! of the page dictionary, so a file listed twice is composited twice
//! without the two uses interfering.

use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use lopdf::{dictionary, Document, Object, ObjectId};

use crate::atomic::write_atomically;
use crate::config::CollateOptions;
use crate::error::{Error, Result};
use crate::index::{read_index, PlanEntry};
use crate::layout::{normalize, Margins, PageSize, TargetGeometry};
use crate::paginate::{paginate, PageSource, Pagination};
use crate::pdf::create::{add_page, blank_page, divider_page, opacity_gstate, text_resources};
use crate::pdf::fonts::Font;
use crate::pdf::outline::{add_outline, add_toc_links, text_string};
use crate::pdf::overlay::{fit_to_canvas, merge_onto, render_overlay};
use crate::pdf::source::{self, inherited, SourceSet};
use crate::pdf::toc::{render_toc_page, toc_pages, TocLayout};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// One `makepdf` run
#[derive(Debug, Clone)]
pub struct CollateJob {
    /// Index file to collate
    pub index_path: PathBuf,
    /// Optional PDF placed unchanged in front of the TOC
    pub cover_path: Option<PathBuf>,
    /// Output PDF file path
    pub output_path: PathBuf,
    /// Base settings, before the index file's `# set` directives
    pub options: CollateOptions,
    /// `key = value` settings applied after the index file's directives
    pub overrides: Vec<(String, String)>,
}

impl CollateJob {
    pub fn new(index_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            cover_path: None,
            output_path: output_path.into(),
            options: CollateOptions::default(),
            overrides: Vec::new(),
        }
    }
}

/// Everything decided before a single output object is written
#[derive(Debug, Clone)]
pub struct CollationPlan {
    pub entries: Vec<PlanEntry>,
    pub options: CollateOptions,
    pub geometry: TargetGeometry,
    pub pagination: Pagination,
}

/// Page counts of a finished output
#[derive(Debug, Clone, PartialEq)]
pub struct CollateSummary {
    pub cover_pages: usize,
    pub toc_pages: usize,
    /// Numbered pages, duplex padding included
    pub body_pages: usize,
    /// Unnumbered and numbered padding pages added for duplex printing
    pub padding_pages: usize,
    /// Physical pages in the output
    pub total_pages: usize,
    pub canvas: PageSize,
}

/// Read the index, open its sources and work out geometry and numbering
///
/// Settings are layered: `job.options`, then the index file's
/// directives, then `job.overrides`.
pub fn prepare(job: &CollateJob) -> Result<(CollationPlan, SourceSet)> {
    let index = read_index(&job.index_path)?;

    let mut options = job.options.clone();
    index.apply_settings(&mut options)?;
    for (key, value) in &job.overrides {
        options
            .set(key, value)
            .map_err(Error::InvalidOption)?;
    }

    let (entries, sources) = SourceSet::open(&index, options.verify_sources)?;

    let sizes = sources.body_page_sizes(&entries);
    let geometry = normalize(&sizes, options.size_policy, options.page_size)?;
    info!(
        "Canvas {} ({:?} policy over {} source pages)",
        geometry.canvas,
        options.size_policy,
        sizes.len()
    );

    let pagination = paginate(&entries, options.toc_rows_per_page, options.duplex);
    info!(
        "{} numbered pages, {} TOC rows on {} page(s)",
        pagination.total_pages,
        pagination.toc.len(),
        pagination.toc_pages
    );

    Ok((
        CollationPlan {
            entries,
            options,
            geometry,
            pagination,
        },
        sources,
    ))
}

/// Run a whole `makepdf` job
///
/// # Example
///
/// ```no_run
/// use pdf_collate::pdf::{collate, CollateJob};
///
/// let mut job = CollateJob::new("reading.idx", "reading-pack.pdf");
/// job.cover_path = Some("cover.pdf".into());
///
/// let summary = collate(&job).expect("Failed to collate");
/// println!("{} pages", summary.total_pages);
/// ```
pub fn collate(job: &CollateJob) -> Result<CollateSummary> {
    let (plan, mut sources) = prepare(job)?;

    let cover = job.cover_path.as_deref().map(source::load).transpose()?;
    let font = match &plan.options.font {
        Some(path) => Font::load_truetype(path)?,
        None => Font::helvetica(),
    };
    info!("Text font: {}", font.name());

    assemble(&plan, &mut sources, cover, &font, &job.output_path)
}

/// Build the output document and move it into place at `output`
///
/// Any failure is reported as `Error::Assembly` wrapping its cause, and
/// leaves `output` untouched.
pub fn assemble(
    plan: &CollationPlan,
    sources: &mut SourceSet,
    cover: Option<Document>,
    font: &Font,
    output: &Path,
) -> Result<CollateSummary> {
    let wrap = |e: Error| Error::Assembly {
        output: output.to_path_buf(),
        source: Box::new(e),
    };

    let (mut doc, summary) = build_document(plan, sources, cover, font).map_err(wrap)?;
    write_document(&mut doc, output).map_err(wrap)?;

    info!("Wrote {} ({} pages)", output.display(), summary.total_pages);
    Ok(summary)
}

fn build_document(
    plan: &CollationPlan,
    sources: &mut SourceSet,
    cover: Option<Document>,
    font: &Font,
) -> Result<(Document, CollateSummary)> {
    let options = &plan.options;
    let canvas = plan.geometry.canvas;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = font.embed(&mut doc)?;
    let gstate_id = opacity_gstate(&mut doc, options.overlay.opacity);
    let resources = text_resources(font_id, gstate_id);

    let mut kids: Vec<ObjectId> = Vec::new();
    let mut padding_pages = 0;
    let mut pad_to_even = |doc: &mut Document, kids: &mut Vec<ObjectId>| -> Result<()> {
        if options.duplex && kids.len() % 2 == 1 {
            kids.push(add_page(doc, pages_id, &blank_page(canvas), &resources)?);
            padding_pages += 1;
        }
        Ok(())
    };

    // Cover: copied as is, no resizing, no overlay
    let mut cover_pages = 0;
    if let Some(cover) = cover {
        for page_id in import_document(&mut doc, cover) {
            kids.push(detach_page(&mut doc, page_id, pages_id)?);
            cover_pages += 1;
        }
        pad_to_even(&mut doc, &mut kids)?;
    }

    // TOC: generated at canvas size, unnumbered
    let layout = TocLayout {
        canvas,
        title: options.toc_title.clone(),
        font_size: options.toc_font_size,
        rows_per_page: options.toc_rows_per_page,
        margins: Margins::standard(),
    };
    let mut toc_links = Vec::with_capacity(plan.pagination.toc_pages);
    for page in toc_pages(&plan.pagination.toc, options.toc_rows_per_page) {
        let (content, links) = render_toc_page(&page, &layout, font);
        let page_id = add_page(&mut doc, pages_id, &content, &resources)?;
        kids.push(page_id);
        toc_links.push((page_id, links));
    }
    let toc_count = toc_links.len();
    pad_to_even(&mut doc, &mut kids)?;

    // Body: every numbered page, overlaid
    let mut imported: HashMap<PathBuf, Vec<ObjectId>> = HashMap::new();
    let mut body_ids = Vec::with_capacity(plan.pagination.records.len());
    let mut geometry_index = 0;

    for record in &plan.pagination.records {
        let page_id = match record.source {
            PageSource::Document { entry, page_index } => {
                let path = plan.entries[entry]
                    .path
                    .as_deref()
                    .ok_or_else(|| Error::General(format!("entry {} has no source path", entry)))?;
                let source = sources
                    .get_mut(path)
                    .ok_or_else(|| Error::unreadable(path, "source was never opened"))?;
                let source_page = *source
                    .pages
                    .get(page_index)
                    .ok_or_else(|| Error::unreadable(path, format!("no page {}", page_index + 1)))?;

                if !imported.contains_key(path) {
                    let source_doc = std::mem::replace(&mut source.doc, Document::new());
                    imported.insert(path.to_path_buf(), import_document(&mut doc, source_doc));
                }
                let original = imported
                    .get(path)
                    .and_then(|ids| ids.get(page_index))
                    .copied()
                    .ok_or_else(|| Error::unreadable(path, format!("no page {}", page_index + 1)))?;

                let transform = plan
                    .geometry
                    .transform(geometry_index)
                    .ok_or_else(|| {
                        Error::General(format!("no geometry for body page {}", record.page_number))
                    })?;
                geometry_index += 1;

                let page_id = detach_page(&mut doc, original, pages_id)?;
                fit_to_canvas(&mut doc, page_id, &source_page, &transform, canvas)?;
                debug!(
                    "Page {}: {} page {} at scale {:.3}",
                    record.page_number,
                    path.display(),
                    page_index + 1,
                    transform.scale
                );
                page_id
            }
            PageSource::Divider { entry } => {
                let title = &plan.entries[entry].title;
                let content = divider_page(title, canvas, font, options.divider_font_size);
                debug!("Page {}: divider {:?}", record.page_number, title);
                add_page(&mut doc, pages_id, &content, &resources)?
            }
            PageSource::Blank { entry } => {
                if entry.is_none() {
                    padding_pages += 1;
                }
                debug!("Page {}: blank", record.page_number);
                add_page(&mut doc, pages_id, &blank_page(canvas), &resources)?
            }
        };

        let overlay = render_overlay(record, canvas, &options.overlay, font);
        merge_onto(&mut doc, page_id, &overlay, &resources)?;
        kids.push(page_id);
        body_ids.push(page_id);
    }

    for (toc_page, links) in &toc_links {
        add_toc_links(&mut doc, *toc_page, links, &body_ids)?;
    }
    let outline = if options.bookmarks {
        add_outline(&mut doc, &plan.pagination.toc, &body_ids)?
    } else {
        None
    };

    let total_pages = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => total_pages as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outline_id) = outline {
        catalog.set("Outlines", outline_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(&options.toc_title),
        "Producer" => text_string(concat!("pdf-collate ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Info", info_id);

    // Drop whatever the imported files carried that no output page uses
    doc.prune_objects();
    doc.compress();

    let summary = CollateSummary {
        cover_pages,
        toc_pages: toc_count,
        body_pages: body_ids.len(),
        padding_pages,
        total_pages,
        canvas,
    };
    Ok((doc, summary))
}

/// Move all objects of `source` into `doc`; returns its page IDs in order
fn import_document(doc: &mut Document, mut source: Document) -> Vec<ObjectId> {
    // Renumber objects in this document to avoid conflicts
    source.renumber_objects_with(doc.max_id + 1);
    let page_ids = source.get_pages().into_values().collect();

    doc.max_id = doc.max_id.max(source.max_id);
    doc.objects.extend(source.objects);
    page_ids
}

/// Copy a page dictionary under a new parent
///
/// Inherited attributes are written onto the copy, since the copy no
/// longer sits under the ancestors it inherited them from.
fn detach_page(doc: &mut Document, page_id: ObjectId, parent: ObjectId) -> Result<ObjectId> {
    let mut page = doc.get_dictionary(page_id)?.clone();

    for key in INHERITABLE {
        if !page.has(key) {
            if let Some(value) = inherited(doc, page_id, key) {
                page.set(key, value.clone());
            }
        }
    }
    page.set("Parent", Object::Reference(parent));

    Ok(doc.add_object(Object::Dictionary(page)))
}

/// Save `doc` to `output` via a temporary file
fn write_document(doc: &mut Document, output: &Path) -> Result<()> {
    write_atomically(output, |file| {
        let mut writer = BufWriter::new(file);
        doc.save_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    })
}
