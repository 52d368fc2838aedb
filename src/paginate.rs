//! Global page numbering and TOC sizing
//!
//! Numbering covers the body only (dividers, documents, blank pages); the
//! cover and the TOC are unnumbered. The TOC page count depends only on how
//! many rows it lists, never on the numbers printed in those rows, so both
//! are computed directly with no fixed-point iteration.

use crate::index::{EntryKind, PlanEntry};

/// Where a numbered page comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// Page `page_index` (0-based) of the document at plan index `entry`
    Document { entry: usize, page_index: usize },
    /// The generated page of the divider at plan index `entry`
    Divider { entry: usize },
    /// An empty page; `None` for duplex padding
    Blank { entry: Option<usize> },
}

/// One numbered page of the output, in final order
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalPageRecord {
    /// 1-based, contiguous over the numbered region
    pub page_number: usize,
    /// Document title or divider title shown in the overlay; empty for blanks
    pub source_label: String,
    pub total_pages: usize,
    pub source: PageSource,
}

impl GlobalPageRecord {
    /// The `X / Y` text shown in the overlay
    pub fn number_text(&self) -> String {
        format!("{} / {}", self.page_number, self.total_pages)
    }
}

/// One TOC row
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub starting_page_number: usize,
    pub kind: EntryKind,
    /// Index of the plan entry this row lists
    pub entry: usize,
}

/// Numbering of a whole plan
#[derive(Debug, Clone)]
pub struct Pagination {
    pub records: Vec<GlobalPageRecord>,
    pub toc: Vec<TocEntry>,
    pub toc_pages: usize,
    pub total_pages: usize,
}

impl Pagination {
    /// Record for global page `number`, if it exists
    pub fn record(&self, number: usize) -> Option<&GlobalPageRecord> {
        number.checked_sub(1).and_then(|i| self.records.get(i))
    }
}

/// Pages needed to list `rows` TOC rows at `rows_per_page` per page
pub fn toc_page_count(rows: usize, rows_per_page: usize) -> usize {
    rows.div_ceil(rows_per_page.max(1))
}

/// Number every body page of `entries`
///
/// With `duplex`, a padding page is numbered in before any divider that
/// would otherwise start on an even (left-hand) page. The front matter is
/// padded to an even length separately, so body page parity is physical
/// page parity.
pub fn paginate(entries: &[PlanEntry], rows_per_page: usize, duplex: bool) -> Pagination {
    // Pass 1: start of every entry, and where padding goes
    let mut starts = Vec::with_capacity(entries.len());
    let mut padded = vec![false; entries.len()];
    let mut next = 1;
    for (i, entry) in entries.iter().enumerate() {
        if duplex && entry.kind == EntryKind::Divider && next % 2 == 0 {
            padded[i] = true;
            next += 1;
        }
        starts.push(next);
        next += entry.page_count;
    }
    let total_pages = next - 1;

    // Pass 2: one record per physical numbered page
    let mut records = Vec::with_capacity(total_pages);
    let mut toc = Vec::new();
    let push = |records: &mut Vec<GlobalPageRecord>, label: &str, source: PageSource| {
        records.push(GlobalPageRecord {
            page_number: records.len() + 1,
            source_label: label.to_string(),
            total_pages,
            source,
        });
    };

    for (i, entry) in entries.iter().enumerate() {
        if padded[i] {
            push(&mut records, "", PageSource::Blank { entry: None });
        }
        debug_assert_eq!(records.len() + 1, starts[i]);

        if entry.is_listed() {
            toc.push(TocEntry {
                title: entry.title.clone(),
                starting_page_number: starts[i],
                kind: entry.kind,
                entry: i,
            });
        }

        match entry.kind {
            EntryKind::Document => {
                for page_index in 0..entry.page_count {
                    push(&mut records, &entry.title, PageSource::Document { entry: i, page_index });
                }
            }
            EntryKind::Divider => {
                push(&mut records, &entry.title, PageSource::Divider { entry: i })
            }
            EntryKind::Blank => push(&mut records, "", PageSource::Blank { entry: Some(i) }),
        }
    }

    let toc_pages = toc_page_count(toc.len(), rows_per_page);

    Pagination {
        records,
        toc,
        toc_pages,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(counts: &[usize]) -> Vec<PlanEntry> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &n)| PlanEntry::document(format!("doc{i}.pdf"), format!("doc{i}"), n))
            .collect()
    }

    #[test]
    fn test_three_single_page_documents() {
        let p = paginate(&docs(&[1, 1, 1]), 36, false);

        assert_eq!(p.total_pages, 3);
        assert_eq!(p.toc_pages, 1);
        let numbers: Vec<_> = p.records.iter().map(|r| r.number_text()).collect();
        assert_eq!(numbers, vec!["1 / 3", "2 / 3", "3 / 3"]);
        let starts: Vec<_> = p.toc.iter().map(|t| t.starting_page_number).collect();
        assert_eq!(starts, vec![1, 2, 3]);
    }

    #[test]
    fn test_divider_shifts_following_entries() {
        let mut entries = docs(&[1, 1, 1]);
        entries.insert(1, PlanEntry::divider("Part two"));
        let p = paginate(&entries, 36, false);

        assert_eq!(p.total_pages, 4);
        assert_eq!(p.toc.len(), 4);
        assert_eq!(p.toc[1].title, "Part two");
        assert_eq!(p.toc[1].starting_page_number, 2);
        assert_eq!(p.toc[2].starting_page_number, 3);
        assert_eq!(p.records[1].source, PageSource::Divider { entry: 1 });
        assert_eq!(p.records[1].source_label, "Part two");
    }

    #[test]
    fn test_totals_and_starts_over_many_plans() {
        let shapes: &[&[usize]] = &[&[1], &[5, 2, 9], &[3, 3, 3, 3, 3, 3, 3], &[40, 1, 12]];
        for counts in shapes {
            for dividers in 0..3 {
                let mut entries = docs(counts);
                for d in 0..dividers {
                    entries.insert(d * 2, PlanEntry::divider(format!("div{d}")));
                }
                let p = paginate(&entries, 4, false);

                let d: usize = counts.iter().sum();
                assert_eq!(p.total_pages, d + dividers);
                assert_eq!(p.records.len(), p.total_pages);
                assert_eq!(p.toc_pages, (counts.len() + dividers).div_ceil(4));

                for (i, r) in p.records.iter().enumerate() {
                    assert_eq!(r.page_number, i + 1);
                    assert_eq!(r.total_pages, p.total_pages);
                }
                for pair in p.toc.windows(2) {
                    let size = entries[pair[0].entry].page_count;
                    assert_eq!(pair[1].starting_page_number, pair[0].starting_page_number + size);
                }
            }
        }
    }

    #[test]
    fn test_toc_page_count_depends_only_on_rows() {
        assert_eq!(toc_page_count(0, 10), 0);
        assert_eq!(toc_page_count(10, 10), 1);
        assert_eq!(toc_page_count(11, 10), 2);

        // Same row count, wildly different page totals
        let small = paginate(&docs(&[1, 1, 1, 1, 1]), 2, false);
        let large = paginate(&docs(&[900, 900, 900, 900, 900]), 2, false);
        assert_eq!(small.toc_pages, 3);
        assert_eq!(large.toc_pages, small.toc_pages);
    }

    #[test]
    fn test_blank_pages_are_numbered_but_not_listed() {
        let mut entries = docs(&[2, 1]);
        entries.insert(1, PlanEntry::blank());
        let p = paginate(&entries, 36, false);

        assert_eq!(p.total_pages, 4);
        assert_eq!(p.toc.len(), 2);
        assert_eq!(p.toc[1].starting_page_number, 4);
        assert_eq!(p.records[2].source, PageSource::Blank { entry: Some(1) });
        assert_eq!(p.records[2].source_label, "");
    }

    #[test]
    fn test_duplex_pads_dividers_onto_odd_pages() {
        let entries = vec![
            PlanEntry::document("a.pdf", "a", 1),
            PlanEntry::divider("Part two"),
            PlanEntry::document("b.pdf", "b", 2),
            PlanEntry::divider("Part three"),
        ];
        let p = paginate(&entries, 36, true);

        // a=1, pad=2, divider=3, b=4..5, divider=6 would be even, pad=6, divider=7
        let starts: Vec<_> = p.toc.iter().map(|t| t.starting_page_number).collect();
        assert_eq!(starts, vec![1, 3, 4, 7]);
        assert_eq!(p.total_pages, 7);
        assert_eq!(p.records[1].source, PageSource::Blank { entry: None });
        assert_eq!(p.records[5].source, PageSource::Blank { entry: None });
        assert!(p
            .toc
            .iter()
            .filter(|t| t.kind == EntryKind::Divider)
            .all(|t| t.starting_page_number % 2 == 1));
    }

    #[test]
    fn test_record_lookup() {
        let p = paginate(&docs(&[2]), 36, false);
        assert_eq!(p.record(2).unwrap().source, PageSource::Document { entry: 0, page_index: 1 });
        assert!(p.record(0).is_none());
        assert!(p.record(3).is_none());
    }
}
