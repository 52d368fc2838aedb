//! Reading source PDFs: page counts, visible page boxes, and checking the
//! index against the files on disk

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use lopdf::{Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::index::{title_for, IndexFile, IndexItem, PlanEntry};
use crate::layout::PageSize;

/// Guard against cyclic `Parent` chains in broken page trees
const MAX_TREE_DEPTH: usize = 64;

/// Open a PDF read-only and make sure it has at least one page
pub fn load(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::unreadable(path, "file not found"));
    }

    let doc = Document::load(path).map_err(|e| Error::unreadable(path, e))?;

    if doc.get_pages().is_empty() {
        return Err(Error::unreadable(path, "document has no pages"));
    }

    Ok(doc)
}

/// Count the number of pages in a PDF file
///
/// Counts the pages reachable through the page tree, which are the pages
/// that can actually be copied into the output.
pub fn count_pages(path: &Path) -> Result<usize> {
    Ok(load(path)?.get_pages().len())
}

/// Look up a page attribute, following `Parent` links for inheritable keys
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        let parent = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }

    None
}

/// Follow one level of indirection
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Extract numeric value from a PDF object
pub fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// A rectangle in a page's default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    /// Normalise a `[llx lly urx ury]` array; corners may come in any order
    pub fn from_array(array: &[Object]) -> Option<Self> {
        if array.len() != 4 {
            return None;
        }
        let n: Vec<f32> = array.iter().filter_map(extract_number).collect();
        if n.len() != 4 {
            return None;
        }
        Some(Self {
            x0: n[0].min(n[2]),
            y0: n[1].min(n[3]),
            x1: n[0].max(n[2]),
            y1: n[1].max(n[3]),
        })
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn intersect(&self, other: &PageBox) -> PageBox {
        PageBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

/// The visible area of a source page and how it is rotated for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePage {
    /// CropBox clipped to MediaBox, or MediaBox alone
    pub visible: PageBox,
    /// Clockwise display rotation: 0, 90, 180 or 270
    pub rotation: i64,
}

impl SourcePage {
    /// Size as displayed, after rotation
    pub fn display_size(&self) -> PageSize {
        let (w, h) = (self.visible.width(), self.visible.height());
        if self.rotation % 180 == 0 {
            PageSize::new(w, h)
        } else {
            PageSize::new(h, w)
        }
    }
}

/// Read the visible box and rotation of a page
pub fn read_page(doc: &Document, page_id: ObjectId) -> Result<SourcePage> {
    let media = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|a| PageBox::from_array(a))
        .ok_or_else(|| Error::General(format!("page {:?} has no usable MediaBox", page_id)))?;

    let visible = inherited(doc, page_id, b"CropBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|a| PageBox::from_array(a))
        .map(|crop| crop.intersect(&media))
        .filter(|b| b.width() > 0.0 && b.height() > 0.0)
        .unwrap_or(media);

    let raw_rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    let rotation = raw_rotation.rem_euclid(360);
    let rotation = if rotation % 90 == 0 {
        rotation
    } else {
        warn!("Ignoring page rotation of {} degrees", raw_rotation);
        0
    };

    Ok(SourcePage { visible, rotation })
}

/// One opened source file
#[derive(Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub doc: Document,
    /// Page object IDs in page order
    pub page_ids: Vec<ObjectId>,
    pub pages: Vec<SourcePage>,
}

impl SourceDocument {
    fn open(path: &Path) -> Result<Self> {
        let doc = load(path)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let pages = page_ids
            .iter()
            .map(|&id| read_page(&doc, id))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::unreadable(path, e))?;

        if let Some(bad) = pages.iter().find(|p| !p.display_size().is_valid()) {
            return Err(Error::unreadable(
                path,
                format!("page has an empty box ({})", bad.display_size()),
            ));
        }

        debug!("Opened {} ({} pages)", path.display(), page_ids.len());
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            page_ids,
            pages,
        })
    }
}

/// Every source file named by a plan, each opened once
#[derive(Debug, Default)]
pub struct SourceSet {
    documents: Vec<SourceDocument>,
    by_path: HashMap<PathBuf, usize>,
}

impl SourceSet {
    /// Open the sources of an index and turn its lines into plan entries
    ///
    /// A cached page count that disagrees with the file is a
    /// `SourceMismatch` when `strict`, otherwise a warning and the file's
    /// count wins.
    pub fn open(index: &IndexFile, strict: bool) -> Result<(Vec<PlanEntry>, SourceSet)> {
        let mut set = SourceSet::default();
        let mut entries = Vec::with_capacity(index.lines.len());

        for line in &index.lines {
            let entry = match &line.item {
                IndexItem::Document { path, pages, title } => {
                    let actual = set.get_or_open(path)?.page_ids.len();
                    if let Some(recorded) = *pages {
                        if recorded != actual {
                            if strict {
                                return Err(Error::SourceMismatch {
                                    path: index.path.clone(),
                                    line: line.line,
                                    recorded,
                                    actual,
                                });
                            }
                            warn!(
                                "{}:{}: {} has {} page(s), index says {}",
                                index.path.display(),
                                line.line,
                                path.display(),
                                actual,
                                recorded
                            );
                        }
                    }
                    let title = title.clone().unwrap_or_else(|| title_for(path));
                    PlanEntry::document(path, title, actual)
                }
                IndexItem::Divider { title } => PlanEntry::divider(title),
                IndexItem::Blank => PlanEntry::blank(),
            };
            entries.push(entry.at_line(line.line));
        }

        info!(
            "Opened {} source file(s) for {} document entries",
            set.documents.len(),
            index.document_count()
        );
        Ok((entries, set))
    }

    fn get_or_open(&mut self, path: &Path) -> Result<&SourceDocument> {
        let idx = match self.by_path.get(path) {
            Some(&idx) => idx,
            None => {
                let document = SourceDocument::open(path)?;
                self.documents.push(document);
                self.by_path.insert(path.to_path_buf(), self.documents.len() - 1);
                self.documents.len() - 1
            }
        };
        Ok(&self.documents[idx])
    }

    pub fn get(&self, path: &Path) -> Option<&SourceDocument> {
        self.by_path.get(path).map(|&i| &self.documents[i])
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut SourceDocument> {
        match self.by_path.get(path) {
            Some(&i) => Some(&mut self.documents[i]),
            None => None,
        }
    }

    /// Displayed size of every document page, in plan order
    pub fn body_page_sizes(&self, entries: &[PlanEntry]) -> Vec<PageSize> {
        entries
            .iter()
            .filter_map(|e| e.path.as_deref())
            .filter_map(|p| self.get(p))
            .flat_map(|d| d.pages.iter().map(SourcePage::display_size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary};

    fn page_tree_doc() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "CropBox" => vec![10.into(), 20.into(), 110.into(), 220.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 300.into()],
                "Rotate" => 90,
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::UnreadableSource { .. }));
    }

    #[test]
    fn test_inherited_attributes() {
        let (doc, page_id) = page_tree_doc();
        let media = inherited(&doc, page_id, b"MediaBox").unwrap();
        assert_eq!(media.as_array().unwrap().len(), 4);
        assert!(inherited(&doc, page_id, b"Resources").is_none());
    }

    #[test]
    fn test_read_page_uses_crop_box_and_rotation() {
        let (doc, page_id) = page_tree_doc();
        let page = read_page(&doc, page_id).unwrap();

        assert_eq!(page.visible, PageBox { x0: 10.0, y0: 20.0, x1: 110.0, y1: 220.0 });
        assert_eq!(page.rotation, 90);
        // 100 wide, 200 tall, turned on its side
        assert_eq!(page.display_size(), PageSize::new(200.0, 100.0));
    }

    #[test]
    fn test_page_box_normalises_corners() {
        let array = vec![Object::Real(612.0), 792.into(), 0.into(), 0.into()];
        let b = PageBox::from_array(&array).unwrap();
        assert_eq!((b.x0, b.y0, b.width(), b.height()), (0.0, 0.0, 612.0, 792.0));
        assert!(PageBox::from_array(&[Object::Null]).is_none());
    }

    #[test]
    fn test_read_page_without_media_box_fails() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(Dictionary::new());
        assert!(read_page(&doc, page_id).is_err());
    }
}
