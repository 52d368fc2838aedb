//! Navigation: PDF bookmarks mirroring the TOC, and clickable TOC rows
//!
//! Dividers become top-level bookmarks with the documents that follow them
//! as children; documents before the first divider sit at the top level.

use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::{Error, Result};
use crate::index::EntryKind;
use crate::paginate::TocEntry;
use crate::pdf::toc::TocLink;

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Destination showing the top of a page
fn page_top(page_id: ObjectId) -> Object {
    Object::Array(vec![Object::Reference(page_id), "Fit".into()])
}

/// Object ID of numbered page `number` (1-based)
fn numbered_page(page_ids: &[ObjectId], number: usize) -> Result<ObjectId> {
    number
        .checked_sub(1)
        .and_then(|i| page_ids.get(i))
        .copied()
        .ok_or_else(|| Error::General(format!("no numbered page {}", number)))
}

struct OutlineNode<'a> {
    id: ObjectId,
    entry: &'a TocEntry,
    children: Vec<OutlineNode<'a>>,
}

/// Add an outline for `toc` and return the `Outlines` dictionary ID
///
/// `page_ids` holds the object ID of each numbered page, in order.
pub fn add_outline(
    doc: &mut Document,
    toc: &[TocEntry],
    page_ids: &[ObjectId],
) -> Result<Option<ObjectId>> {
    if toc.is_empty() {
        return Ok(None);
    }

    let mut roots: Vec<OutlineNode> = Vec::new();
    let mut in_section = false;
    for entry in toc {
        let node = OutlineNode {
            id: doc.new_object_id(),
            entry,
            children: Vec::new(),
        };
        let section = if entry.kind == EntryKind::Divider {
            in_section = true;
            None
        } else if in_section {
            roots.last_mut()
        } else {
            None
        };
        match section {
            Some(section) => section.children.push(node),
            None => roots.push(node),
        }
    }

    let outline_id = doc.new_object_id();
    write_level(doc, &roots, outline_id, page_ids)?;

    let (first, last) = match (roots.first(), roots.last()) {
        (Some(first), Some(last)) => (first.id, last.id),
        _ => return Ok(None),
    };
    doc.objects.insert(
        outline_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => first,
            "Last" => last,
            "Count" => roots.len() as i64,
        }),
    );

    Ok(Some(outline_id))
}

fn write_level(
    doc: &mut Document,
    items: &[OutlineNode],
    parent: ObjectId,
    page_ids: &[ObjectId],
) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        let target = numbered_page(page_ids, item.entry.starting_page_number)?;
        let mut dict = dictionary! {
            "Title" => text_string(&item.entry.title),
            "Parent" => parent,
            "Dest" => page_top(target),
        };
        if i > 0 {
            dict.set("Prev", items[i - 1].id);
        }
        if let Some(next) = items.get(i + 1) {
            dict.set("Next", next.id);
        }
        if let (Some(first), Some(last)) = (item.children.first(), item.children.last()) {
            dict.set("First", first.id);
            dict.set("Last", last.id);
            // Sections start collapsed
            dict.set("Count", -(item.children.len() as i64));
            write_level(doc, &item.children, item.id, page_ids)?;
        }
        doc.objects.insert(item.id, Object::Dictionary(dict));
    }
    Ok(())
}

/// Make each TOC row on `toc_page` a link to the page it lists
pub fn add_toc_links(
    doc: &mut Document,
    toc_page: ObjectId,
    links: &[TocLink],
    page_ids: &[ObjectId],
) -> Result<()> {
    let mut annots = Vec::with_capacity(links.len());
    for link in links {
        let target = numbered_page(page_ids, link.target_page)?;
        let rect: Vec<Object> = link.rect.iter().map(|&v| Object::Real(v)).collect();
        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => rect,
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "Dest" => page_top(target),
        };
        annots.push(Object::Reference(doc.add_object(annot)));
    }

    if !annots.is_empty() {
        doc.get_dictionary_mut(toc_page)?.set("Annots", annots);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, start: usize, kind: EntryKind) -> TocEntry {
        TocEntry {
            title: title.to_string(),
            starting_page_number: start,
            kind,
            entry: 0,
        }
    }

    fn pages(doc: &mut Document, n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| doc.add_object(dictionary! { "Type" => "Page" })).collect()
    }

    fn title_of(doc: &Document, id: ObjectId) -> Vec<u8> {
        doc.get_dictionary(id).unwrap().get(b"Title").unwrap().as_str().unwrap().to_vec()
    }

    #[test]
    fn test_text_string_encoding() {
        assert!(matches!(
            text_string("Intro"),
            Object::String(ref b, StringFormat::Literal) if b == b"Intro"
        ));
        match text_string("é") {
            Object::String(bytes, _) => assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9]),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn test_outline_nests_documents_under_dividers() {
        let mut doc = Document::with_version("1.5");
        let page_ids = pages(&mut doc, 4);
        let toc = vec![
            entry("Preface", 1, EntryKind::Document),
            entry("Part one", 2, EntryKind::Divider),
            entry("Chapter 1", 3, EntryKind::Document),
            entry("Chapter 2", 4, EntryKind::Document),
        ];

        let outline_id = add_outline(&mut doc, &toc, &page_ids).unwrap().unwrap();
        let outline = doc.get_dictionary(outline_id).unwrap();
        assert_eq!(outline.get(b"Count").unwrap().as_i64().unwrap(), 2);

        let first = outline.get(b"First").unwrap().as_reference().unwrap();
        let last = outline.get(b"Last").unwrap().as_reference().unwrap();
        assert_eq!(title_of(&doc, first), b"Preface");
        assert_eq!(title_of(&doc, last), b"Part one");

        let section = doc.get_dictionary(last).unwrap();
        assert_eq!(section.get(b"Count").unwrap().as_i64().unwrap(), -2);
        let child = section.get(b"First").unwrap().as_reference().unwrap();
        assert_eq!(title_of(&doc, child), b"Chapter 1");
        let dest = doc
            .get_dictionary(child)
            .unwrap()
            .get(b"Dest")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(dest[0].as_reference().unwrap(), page_ids[2]);
    }

    #[test]
    fn test_empty_toc_has_no_outline() {
        let mut doc = Document::with_version("1.5");
        assert!(add_outline(&mut doc, &[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_toc_links_point_at_pages() {
        let mut doc = Document::with_version("1.5");
        let page_ids = pages(&mut doc, 2);
        let toc_page = doc.add_object(dictionary! { "Type" => "Page" });
        let links = vec![
            TocLink { rect: [72.0, 700.0, 520.0, 712.0], target_page: 1 },
            TocLink { rect: [72.0, 682.0, 520.0, 694.0], target_page: 2 },
        ];

        add_toc_links(&mut doc, toc_page, &links, &page_ids).unwrap();

        let annots = doc
            .get_dictionary(toc_page)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(annots.len(), 2);
        let second = doc.get_dictionary(annots[1].as_reference().unwrap()).unwrap();
        let dest = second.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), page_ids[1]);
    }

    #[test]
    fn test_link_to_missing_page_fails() {
        let mut doc = Document::with_version("1.5");
        let toc_page = doc.add_object(dictionary! { "Type" => "Page" });
        let links = vec![TocLink { rect: [0.0; 4], target_page: 5 }];
        assert!(add_toc_links(&mut doc, toc_page, &links, &[]).is_err());
    }
}
